//! 解決済みのサービス情報

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// タスク向けに解決済みの、1サービスのエンドポイントと認証情報
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub endpoint: Url,
    #[serde(skip_serializing)]
    pub credential: Option<String>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, endpoint: Url, credential: Option<String>) -> Self {
        Self {
            name: name.into(),
            endpoint,
            credential,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

// Keep credentials out of logs.
impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
