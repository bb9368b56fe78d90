//! ReqwestTransport - 本番用 transport
//!
//! タスクごとに JSON POST を1回。ステータスに関係なく本文をテキストで読むので、
//! エラー本文も診断ファイルに残る。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use crate::app::config::DEFAULT_TIMEOUT_SECS;
use crate::domain::NimError;
use crate::ports::{HttpRequest, HttpResponse, Transport};

const JSON: &str = "application/json";

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Client with a ceiling of [`DEFAULT_TIMEOUT_SECS`]; each request also
    /// carries its own timeout.
    pub fn new() -> Result<Self, NimError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| NimError::Transport(format!("cannot create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NimError> {
        let mut req = self
            .client
            .post(request.endpoint.clone())
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .timeout(request.timeout)
            .body(request.payload.to_bytes());
        if let Some(token) = &request.credential {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                NimError::Transport(format!(
                    "request to {} timed out after {}s",
                    request.endpoint,
                    request.timeout.as_secs()
                ))
            } else {
                NimError::Transport(format!("request to {} failed: {e}", request.endpoint))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NimError::Transport(format!("cannot read response body: {e}")))?;
        debug!(endpoint = %request.endpoint, status, bytes = body.len(), "response received");
        Ok(HttpResponse::new(status, body))
    }
}
