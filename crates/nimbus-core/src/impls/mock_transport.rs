//! MockTransport - テスト・ドライラン用の固定応答 transport
//!
//! どのリクエストにも同じ応答を返し、送られた内容を記録する。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::NimError;
use crate::ports::{HttpRequest, HttpResponse, Transport};

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    reply: Reply,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn respond(status: u16, body: impl Into<String>) -> Self {
        Self::with_reply(Reply::Response(HttpResponse::new(status, body)))
    }

    /// Every request fails with `NimError::Transport(message)`.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::with_reply(Reply::Error(message.into()))
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Hold every reply for `delay`, simulating a slow service.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NimError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Reply::Response(response) => Ok(response.clone()),
            Reply::Error(message) => Err(NimError::Transport(message.clone())),
        }
    }
}
