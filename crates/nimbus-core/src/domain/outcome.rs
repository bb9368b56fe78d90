//! Outcome - 1回のタスク実行が生んだもの
//!
//! worker が処理を進めながら `Outcome` を組み立てる。終了ステータスと
//! work dir に残るファイルはここから決まる。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::{EXIT_FAILURE, EXIT_SUCCESS};

/// Serialized as SUCCESS / DEGRADED / FAILURE.
///
/// `Degraded` still counts as success for the scheduler: the call round-tripped
/// but the primary artifact is a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Degraded,
    Failure,
}

/// タスクの work dir に書かれたファイル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path")]
pub enum Artifact {
    /// Main output extracted from the response (or its placeholder).
    Primary(PathBuf),

    /// Verbatim response body.
    RawResponse(PathBuf),

    /// Whole parsed response when no known output field was found.
    Debug(PathBuf),

    /// Plain-text detail of a fatal error.
    ErrorDetail(PathBuf),
}

impl Artifact {
    pub fn path(&self) -> &PathBuf {
        match self {
            Artifact::Primary(p)
            | Artifact::RawResponse(p)
            | Artifact::Debug(p)
            | Artifact::ErrorDetail(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    /// HTTP status of the response, when one was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            http_status: None,
            artifacts: Vec::new(),
            reason: None,
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Degraded,
            reason: Some(reason.into()),
            ..Self::success()
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            reason: Some(reason.into()),
            ..Self::success()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn exit_status(&self) -> i32 {
        match self.kind {
            OutcomeKind::Success | OutcomeKind::Degraded => EXIT_SUCCESS,
            OutcomeKind::Failure => EXIT_FAILURE,
        }
    }

    pub fn primary(&self) -> Option<&PathBuf> {
        self.artifacts.iter().find_map(|a| match a {
            Artifact::Primary(p) => Some(p),
            _ => None,
        })
    }
}
