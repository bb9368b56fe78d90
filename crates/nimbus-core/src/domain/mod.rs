//! Domain - ドメインモデル（ids, タスク入力, ペイロード, 状態, 結果, エラー）

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod params;
pub mod payload;
pub mod service;
pub mod spec;
pub mod state;

pub use errors::{ErrorKind, NimError, Result};
pub use ids::TaskId;
pub use outcome::{Artifact, Outcome, OutcomeKind};
pub use params::TaskParameters;
pub use payload::RequestPayload;
pub use service::ServiceDescriptor;
pub use spec::TaskSpec;
pub use state::{
    AtomicTaskState, Completion, EXIT_FAILURE, EXIT_KILLED, EXIT_SUCCESS, TaskState, TaskStatus,
};
