//! Services - 対応 NIM サービスごとの variant
//!
//! 各 variant は [`ServiceContract`] を実装する:
//! - タスクパラメータ → リクエストペイロード
//! - レスポンス内の主成果物の場所
//!
//! 未知の名前は [`Generic`] にフォールバックし、パラメータをそのまま転送する。
//! ビルダーは純粋関数（I/O なし、同じパラメータなら同じバイト列）。

pub mod folding;
pub mod generic;
pub mod rfdiffusion;

use std::fmt;

use serde_json::{Map, Value};

use crate::domain::{NimError, RequestPayload, Result, TaskParameters};

pub use self::folding::{AlphaFold2, EsmFold, OpenFold2};
pub use self::generic::Generic;
pub use self::rfdiffusion::RfDiffusion;

/// 全サービス variant が共有する能力
pub trait ServiceContract {
    fn name(&self) -> &str;

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload>;

    /// Response fields that may hold the primary artifact, most specific first.
    /// Empty means "use the generic scan".
    fn output_fields(&self) -> &'static [&'static str];
}

/// 既知サービスの閉じた集合 + 汎用フォールバック
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    RfDiffusion(RfDiffusion),
    OpenFold2(OpenFold2),
    AlphaFold2(AlphaFold2),
    EsmFold(EsmFold),
    Generic(Generic),
}

impl Service {
    /// Names with a dedicated variant.
    pub const KNOWN: [&'static str; 4] = [
        RfDiffusion::NAME,
        OpenFold2::NAME,
        AlphaFold2::NAME,
        EsmFold::NAME,
    ];

    /// Case-insensitive lookup; unknown names become `Generic`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            RfDiffusion::NAME => Service::RfDiffusion(RfDiffusion),
            OpenFold2::NAME => Service::OpenFold2(OpenFold2),
            AlphaFold2::NAME => Service::AlphaFold2(AlphaFold2),
            EsmFold::NAME => Service::EsmFold(EsmFold),
            _ => Service::Generic(Generic::new(name.trim())),
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Service::Generic(_))
    }

    fn contract(&self) -> &dyn ServiceContract {
        match self {
            Service::RfDiffusion(s) => s,
            Service::OpenFold2(s) => s,
            Service::AlphaFold2(s) => s,
            Service::EsmFold(s) => s,
            Service::Generic(s) => s,
        }
    }
}

impl ServiceContract for Service {
    fn name(&self) -> &str {
        self.contract().name()
    }

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload> {
        self.contract().build_request(params)
    }

    fn output_fields(&self) -> &'static [&'static str] {
        self.contract().output_fields()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ========================================
// Field helpers shared by the builders
// ========================================

fn required_str(params: &TaskParameters, service: &str, key: &str) -> Result<String> {
    match params.str(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        _ => Err(NimError::Configuration(format!(
            "service '{service}' requires a non-empty '{key}' parameter"
        ))),
    }
}

/// Take `key` from params when present, otherwise the default.
fn or_default(params: &TaskParameters, key: &str, default: impl FnOnce() -> Value) -> Value {
    match params.get(key) {
        Some(Value::Null) | None => default(),
        Some(value) => value.clone(),
    }
}

fn payload(fields: impl IntoIterator<Item = (&'static str, Value)>) -> RequestPayload {
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    RequestPayload::new(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("rfdiffusion", "rfdiffusion")]
    #[case("RFdiffusion", "rfdiffusion")]
    #[case("openfold2", "openfold2")]
    #[case("alphafold2", "alphafold2")]
    #[case(" esmfold ", "esmfold")]
    #[case("proteinmpnn", "proteinmpnn")]
    fn from_name_resolves_variant(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Service::from_name(input).name(), expected);
    }

    #[test]
    fn unknown_names_are_generic() {
        assert!(Service::from_name("diffdock").is_generic());
        for name in Service::KNOWN {
            assert!(!Service::from_name(name).is_generic());
        }
    }

    fn full_params(service: &str) -> TaskParameters {
        TaskParameters::from_value(json!({
            "service": service,
            "input_pdb": "ATOM      1  N   MET A   1",
            "sequence": "MKTAYIAKQRQISFVKSHFSRQ",
            "contigs": "A10-40/0 20-30",
            "extra": {"nested": [3, 2, 1]},
        }))
        .unwrap()
    }

    #[rstest]
    #[case("rfdiffusion")]
    #[case("openfold2")]
    #[case("alphafold2")]
    #[case("esmfold")]
    #[case("diffdock")]
    fn builders_are_deterministic(#[case] service: &str) {
        let svc = Service::from_name(service);
        let a = svc.build_request(&full_params(service)).unwrap();
        let b = svc.build_request(&full_params(service)).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a, b);
    }

    #[rstest]
    #[case("openfold2")]
    #[case("alphafold2")]
    #[case("esmfold")]
    fn folding_services_require_a_sequence(#[case] service: &str) {
        let params = TaskParameters::new().with("service", service);
        let err = Service::from_name(service).build_request(&params).unwrap_err();
        assert!(matches!(err, NimError::Configuration(msg) if msg.contains("sequence")));
    }
}
