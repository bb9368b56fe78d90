//! エラー分類（リモートタスク実行）

use thiserror::Error;

/// エラーの運用上の分類
///
/// 非致命的なのは `ResponseParse` だけ（placeholder に劣化し、タスクは成功のまま）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Service,
    ResponseParse,
    Io,
    Lifecycle,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::ResponseParse)
    }
}

#[derive(Debug, Error)]
pub enum NimError {
    /// エンドポイント・認証情報・必須パラメータの欠落。ネットワーク呼び出し前に検出。
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 送信中の接続失敗・タイムアウト・クライアントエラー
    #[error("transport error: {0}")]
    Transport(String),

    /// リモートサービスが受け入れられないステータスを返した
    #[error("service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("could not parse response: {0}")]
    ResponseParse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("task {0} was already submitted")]
    AlreadySubmitted(String),
}

impl NimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NimError::Configuration(_) => ErrorKind::Configuration,
            NimError::Transport(_) => ErrorKind::Transport,
            NimError::Service { .. } => ErrorKind::Service,
            NimError::ResponseParse(_) => ErrorKind::ResponseParse,
            NimError::Io(_) => ErrorKind::Io,
            NimError::AlreadySubmitted(_) => ErrorKind::Lifecycle,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    /// `Service` エラーを作る（ログとエラーファイル用に本文を切り詰める）
    pub fn service(status: u16, body: &str) -> Self {
        NimError::Service {
            status,
            body: truncate(body, MAX_ERROR_BODY),
        }
    }
}

/// エラーメッセージ中の本文はこの長さで切る
pub const MAX_ERROR_BODY: usize = 512;

/// 文字境界で切り詰め、切ったときは省略記号を付ける
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub type Result<T, E = NimError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_parse_errors_are_non_fatal() {
        assert!(!NimError::ResponseParse("bad".into()).is_fatal());
        assert!(NimError::Configuration("x".into()).is_fatal());
        assert!(NimError::Transport("x".into()).is_fatal());
        assert!(NimError::service(500, "boom").is_fatal());
    }

    #[test]
    fn service_error_truncates_long_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY + 100);
        let NimError::Service { status, body } = NimError::service(503, &body) else {
            panic!("expected service error");
        };
        assert_eq!(status, 503);
        assert_eq!(body.chars().count(), MAX_ERROR_BODY + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }
}
