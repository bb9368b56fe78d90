//! 専用 variant を持たないサービス向けのフォールバック

use serde_json::{Map, Value};

use super::ServiceContract;
use crate::domain::params::SERVICE_KEY;
use crate::domain::{RequestPayload, Result, TaskParameters};

/// Forwards every parameter except the one naming the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generic {
    name: String,
}

impl Generic {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ServiceContract for Generic {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload> {
        let fields: Map<String, Value> = params
            .iter()
            .filter(|(key, _)| key.as_str() != SERVICE_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(RequestPayload::new(fields))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &[]
    }
}
