//! ServiceRegistry - エンドポイントと認証情報の解決
//!
//! 認証情報（先に見つかったものを使う）:
//! 1. `services.<name>.api_key`
//! 2. グローバルの `api_key`
//! 3. `NVIDIA_API_KEY`（スナップショットに保存済み）
//!
//! エンドポイント: `services.<name>.endpoint`、なければ組み込みのデフォルト表。

use url::Url;

use super::config::ConfigSnapshot;
use crate::domain::{NimError, Result, ServiceDescriptor};
use crate::services::{AlphaFold2, EsmFold, OpenFold2, RfDiffusion};

/// ホスト型 NIM サービスのデフォルトエンドポイント
pub const DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    (
        RfDiffusion::NAME,
        "https://health.api.nvidia.com/v1/biology/ipd/rfdiffusion/generate",
    ),
    (
        OpenFold2::NAME,
        "https://health.api.nvidia.com/v1/biology/openfold/openfold2/predict-structure-from-msa-and-template",
    ),
    (
        AlphaFold2::NAME,
        "https://health.api.nvidia.com/v1/biology/deepmind/alphafold2",
    ),
    (
        EsmFold::NAME,
        "https://health.api.nvidia.com/v1/biology/nvidia/esmfold",
    ),
];

pub fn default_endpoint(service: &str) -> Option<&'static str> {
    DEFAULT_ENDPOINTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(service))
        .map(|(_, url)| *url)
}

/// Credential precedence over an explicit snapshot.
pub fn resolve_credential(snapshot: &ConfigSnapshot, service: &str) -> Option<String> {
    let non_blank = |s: &&String| !s.trim().is_empty();
    snapshot
        .config
        .service(service)
        .and_then(|svc| svc.api_key.as_ref())
        .filter(non_blank)
        .or_else(|| snapshot.config.api_key.as_ref().filter(non_blank))
        .or(snapshot.env_api_key.as_ref())
        .cloned()
}

/// Endpoint precedence over an explicit snapshot.
pub fn resolve_endpoint(snapshot: &ConfigSnapshot, service: &str) -> Result<Url> {
    let configured = snapshot
        .config
        .service(service)
        .and_then(|svc| svc.endpoint.as_deref())
        .filter(|s| !s.trim().is_empty());

    let raw = configured.or_else(|| default_endpoint(service)).ok_or_else(|| {
        NimError::Configuration(format!("no endpoint configured for service '{service}'"))
    })?;

    Url::parse(raw).map_err(|e| {
        NimError::Configuration(format!("invalid endpoint '{raw}' for service '{service}': {e}"))
    })
}

/// 生成後は読み取り専用。`Arc` 越しにタスク間で共有する。
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    snapshot: ConfigSnapshot,
}

impl ServiceRegistry {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    pub fn resolve_endpoint(&self, service: &str) -> Result<Url> {
        resolve_endpoint(&self.snapshot, service)
    }

    pub fn resolve_credential(&self, service: &str) -> Option<String> {
        resolve_credential(&self.snapshot, service)
    }

    /// Resolve both, failing when the service demands a credential that is
    /// nowhere to be found.
    pub fn resolve(&self, service: &str) -> Result<ServiceDescriptor> {
        let endpoint = self.resolve_endpoint(service)?;
        let credential = self.resolve_credential(service);
        let required = self
            .snapshot
            .config
            .service(service)
            .is_some_and(|svc| svc.require_credential);
        if required && credential.is_none() {
            return Err(NimError::Configuration(format!(
                "no credential configured for service '{service}'"
            )));
        }
        Ok(ServiceDescriptor::new(service, endpoint, credential))
    }
}
