//! Transport port - タスクが行う唯一のネットワーク呼び出し
//!
//! 実装は POST を1回だけ送り、生のステータスと本文を返す。
//! ステータスコードの解釈はしない（`app::status_policy` の担当）。

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::domain::{NimError, RequestPayload};

/// リクエスト1回に必要なすべて
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub endpoint: Url,
    pub credential: Option<String>,
    pub payload: RequestPayload,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns `NimError::Transport` for connection failures and timeouts.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NimError>;
}
