//! 設定スナップショット
//!
//! `NimConfig` はただのデータ（serde）。`ConfigSnapshot` は起動時に一度だけ
//! 読んだ環境変数と組にするので、エンドポイントと認証情報の解決は
//! スナップショットの純粋関数になる。

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{NimError, Result};

/// Environment variable consulted last for credentials.
pub const API_KEY_ENV: &str = "NVIDIA_API_KEY";

/// Remote inference is slow; ten minutes per call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// サービスごとの上書き設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Fail pre-flight when no credential resolves.
    pub require_credential: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NimConfig {
    /// Global credential, used when a service has none of its own.
    pub api_key: Option<String>,

    pub services: BTreeMap<String, ServiceConfig>,

    pub timeout_secs: u64,

    /// Treat HTTP 422 as a completed task. On by default to match the
    /// historical behavior; turn it off for production pipelines.
    pub lenient_unprocessable: bool,

    /// Abort the in-flight request on `kill` instead of letting it finish.
    pub abort_on_kill: bool,

    /// Primary output file name; `${task_id}`, `${task_name}` and `${service}`
    /// are substituted.
    pub output_file: Option<String>,
}

impl Default for NimConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            services: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            lenient_unprocessable: true,
            abort_on_kill: false,
            output_file: None,
        }
    }
}

impl NimConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| NimError::Configuration(format!("invalid configuration: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            NimError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Service entries are keyed case-insensitively.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, cfg)| cfg)
    }

    pub fn with_service(mut self, name: impl Into<String>, service: ServiceConfig) -> Self {
        self.services.insert(name.into(), service);
        self
    }
}

/// 設定 + 取得済みの環境変数
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub config: NimConfig,
    pub env_api_key: Option<String>,
}

impl ConfigSnapshot {
    pub fn new(config: NimConfig, env_api_key: Option<String>) -> Self {
        Self {
            config,
            env_api_key: env_api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Read [`API_KEY_ENV`] from the process environment.
    pub fn capture(config: NimConfig) -> Self {
        Self::new(config, std::env::var(API_KEY_ENV).ok())
    }
}
