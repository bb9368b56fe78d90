//! 1タスク分の入力仕様

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::params::TaskParameters;

/// 呼び出し元が executor に渡すもの。サービスは `service` パラメータで指定する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Human-readable name, used in logs and `${task_name}`.
    #[serde(default)]
    pub name: Option<String>,

    pub params: TaskParameters,

    /// Directory owned by this task; created on first write.
    pub work_dir: PathBuf,

    /// Primary output template. The `output_file` parameter wins over it.
    #[serde(default)]
    pub output_file: Option<String>,
}

impl TaskSpec {
    pub fn new(params: TaskParameters, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            params,
            work_dir: work_dir.into(),
            output_file: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_output_file(mut self, template: impl Into<String>) -> Self {
        self.output_file = Some(template.into());
        self
    }
}
