//! プロセス全体のログ設定とタスクごとの span

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::TaskId;

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    #[default]
    Pretty,
}

/// Install the global subscriber. `RUST_LOG` controls levels (default
/// `info`). Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// 各 worker が中で走る span
#[must_use]
pub fn task_span(task_id: &TaskId, service: &str) -> Span {
    tracing::info_span!("nim_task", task_id = %task_id, service = service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn task_span_can_be_entered() {
        let span = task_span(&TaskId::from_ulid(Ulid::nil()), "esmfold");
        let _guard = span.enter();
        tracing::info!("inside task span");
    }
}
