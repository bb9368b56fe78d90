//! ResponseProcessor - レスポンス本文 → 成果物
//!
//! # 抽出順
//! 1. サービス固有の出力フィールド
//! 2. `error` / `detail` オブジェクト（エラー文を載せた placeholder）
//! 3. よくあるフィールド名の汎用スキャン
//! 4. 該当なし: パース結果を debug ファイルに書き、主成果物は placeholder
//!
//! 処理がタスクを失敗させることはない。パース不能な本文や書き込めないファイルは
//! ログに残し、劣化として報告する。

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::errors::truncate;
use crate::domain::{Artifact, NimError};
use crate::services::{Service, ServiceContract};

/// サービス固有フィールドがないときにスキャンするフィールド
pub const GENERIC_OUTPUT_FIELDS: &[&str] = &[
    "output_pdb",
    "pdb",
    "pdbs",
    "structure",
    "structures",
    "output",
    "result",
    "prediction",
];

const ERROR_FIELDS: &[&str] = &["error", "detail"];
const METADATA_FIELDS: &[&str] = &["runtime", "timing", "model_version"];

/// 本文を調べた結果（書き込み前）
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Primary content found under `field`.
    Field { field: String, content: String },
    /// The service reported an error.
    ErrorObject { message: String },
    /// Valid JSON without any recognized field.
    Unrecognized { response: Value },
    /// Not JSON at all.
    Unparseable { reason: String },
}

/// 1レスポンス分の書き込み結果
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedResponse {
    pub artifacts: Vec<Artifact>,
    /// Set when the primary artifact is a placeholder or could not be written.
    pub degraded: Option<String>,
}

/// レスポンス本文の純粋な検査
pub fn extract(service: &Service, body: &str) -> Extraction {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            return Extraction::Unparseable {
                reason: e.to_string(),
            };
        }
    };

    log_metadata(service, &parsed);

    if let Some(found) = find_field(&parsed, service.output_fields()) {
        return found;
    }
    if let Some(message) = error_message(&parsed) {
        return Extraction::ErrorObject { message };
    }
    if let Some(found) = find_field(&parsed, GENERIC_OUTPUT_FIELDS) {
        return found;
    }
    Extraction::Unrecognized { response: parsed }
}

fn find_field(response: &Value, fields: &[&str]) -> Option<Extraction> {
    fields.iter().find_map(|field| {
        let content = response.get(*field).and_then(artifact_text)?;
        Some(Extraction::Field {
            field: (*field).to_string(),
            content,
        })
    })
}

/// Strings are taken verbatim; arrays yield their first usable element;
/// objects their `structure` or `pdb` member.
fn artifact_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(artifact_text),
        Value::Object(map) => ["structure", "pdb"]
            .iter()
            .find_map(|key| map.get(*key).and_then(artifact_text)),
        _ => None,
    }
}

fn error_message(response: &Value) -> Option<String> {
    ERROR_FIELDS.iter().find_map(|field| match response.get(*field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => Some(message.clone()),
            _ => Some(Value::Object(map.clone()).to_string()),
        },
        other => Some(other.to_string()),
    })
}

fn log_metadata(service: &Service, response: &Value) {
    for field in METADATA_FIELDS {
        if let Some(value) = response.get(*field) {
            debug!(service = %service, field = *field, value = %value, "response metadata");
        }
    }
}

/// 構造がないときに代わりに書く placeholder。常に空でなく、
/// PDB の REMARK 行の形なので構造リーダーは読み飛ばせる。
pub fn placeholder(service: &str, reason: &str) -> String {
    let mut text = format!("REMARK   1 NIMBUS PLACEHOLDER: no structure returned by {service}\n");
    for line in reason.lines().filter(|l| !l.trim().is_empty()) {
        text.push_str("REMARK   1 ");
        text.push_str(line);
        text.push('\n');
    }
    text.push_str("END\n");
    text
}

/// 主成果物の隣に置く debug ダンプのパス
pub fn debug_path(primary: &Path) -> PathBuf {
    let mut name = primary
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".debug.json");
    primary.with_file_name(name)
}

/// 成果物を書く（親ディレクトリがなければ先に作る）。
/// 出力テンプレートは work dir のサブディレクトリを指してよい。
pub async fn write_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await
}

/// 主成果物を書く（必要なら debug ダンプも）
pub async fn process(service: &Service, body: &str, primary: &Path) -> ProcessedResponse {
    let mut artifacts = Vec::new();

    let (content, degraded) = match extract(service, body) {
        Extraction::Field { field, content } => {
            debug!(service = %service, field = %field, bytes = content.len(), "extracted primary artifact");
            (content, None)
        }
        Extraction::ErrorObject { message } => {
            warn!(service = %service, error = %truncate(&message, 200), "service returned an error object");
            let reason = format!("service error: {message}");
            (placeholder(service.name(), &reason), Some(reason))
        }
        Extraction::Unrecognized { response } => {
            let debug_file = debug_path(primary);
            let pretty = serde_json::to_string_pretty(&response).unwrap_or_else(|_| body.to_string());
            match write_artifact(&debug_file, &pretty).await {
                Ok(()) => artifacts.push(Artifact::Debug(debug_file.clone())),
                Err(e) => warn!(path = %debug_file.display(), error = %e, "could not write debug response"),
            }
            warn!(service = %service, "no recognized output field in response");
            let reason = format!(
                "no recognized output field; full response written to {}",
                debug_file.display()
            );
            (placeholder(service.name(), &reason), Some(reason))
        }
        Extraction::Unparseable { reason } => {
            let err = NimError::ResponseParse(reason);
            warn!(service = %service, kind = ?err.kind(), fatal = err.is_fatal(), error = %err, "response body is not valid JSON");
            let reason = err.to_string();
            (placeholder(service.name(), &reason), Some(reason))
        }
    };

    match write_artifact(primary, &content).await {
        Ok(()) => {
            artifacts.insert(0, Artifact::Primary(primary.to_path_buf()));
            ProcessedResponse { artifacts, degraded }
        }
        Err(e) => {
            warn!(path = %primary.display(), error = %e, "could not write primary artifact");
            ProcessedResponse {
                artifacts,
                degraded: Some(format!("could not write {}: {e}", primary.display())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rfdiffusion() -> Service {
        Service::from_name("rfdiffusion")
    }

    #[test]
    fn generation_field_is_taken_verbatim() {
        let pdb = "ATOM      1  N   GLY A   1      0.000   0.000   0.000\nEND\n";
        let body = json!({"output_pdb": pdb, "runtime": 12.5}).to_string();
        assert_eq!(
            extract(&rfdiffusion(), &body),
            Extraction::Field {
                field: "output_pdb".into(),
                content: pdb.into()
            }
        );
    }

    #[test]
    fn folding_tries_candidates_in_order() {
        let esm = Service::from_name("esmfold");
        let body = json!({"pdb": "B", "pdbs": ["A", "C"]}).to_string();
        assert!(matches!(extract(&esm, &body), Extraction::Field { field, content } if field == "pdbs" && content == "A"));

        let openfold = Service::from_name("openfold2");
        let body = json!({
            "structures_in_ranked_order": [{"format": "pdb", "structure": "RANK1", "confidence": 91.2}]
        })
        .to_string();
        assert!(matches!(extract(&openfold, &body), Extraction::Field { content, .. } if content == "RANK1"));
    }

    #[test]
    fn error_object_is_detected() {
        let body = json!({"detail": [{"loc": ["body", "contigs"], "msg": "field required"}]}).to_string();
        assert!(matches!(
            extract(&rfdiffusion(), &body),
            Extraction::ErrorObject { message } if message.contains("field required")
        ));

        let body = json!({"error": {"message": "quota exceeded", "code": 429}}).to_string();
        assert_eq!(
            extract(&rfdiffusion(), &body),
            Extraction::ErrorObject {
                message: "quota exceeded".into()
            }
        );
    }

    #[test]
    fn null_error_fields_are_ignored() {
        let body = json!({"detail": null, "output_pdb": "X"}).to_string();
        assert!(matches!(extract(&rfdiffusion(), &body), Extraction::Field { .. }));
    }

    #[test]
    fn generic_scan_applies_to_unknown_services() {
        let svc = Service::from_name("diffdock");
        let body = json!({"result": "POSES"}).to_string();
        assert!(matches!(extract(&svc, &body), Extraction::Field { field, .. } if field == "result"));
    }

    #[test]
    fn unknown_shapes_are_unrecognized() {
        let body = json!({"foo": 1}).to_string();
        assert!(matches!(extract(&rfdiffusion(), &body), Extraction::Unrecognized { .. }));
        assert!(matches!(extract(&rfdiffusion(), "<html>"), Extraction::Unparseable { .. }));
    }

    #[test]
    fn placeholder_is_never_empty() {
        let text = placeholder("rfdiffusion", "");
        assert!(text.starts_with("REMARK"));
        assert!(text.ends_with("END\n"));
    }

    #[test]
    fn debug_path_sits_next_to_primary() {
        assert_eq!(
            debug_path(Path::new("/work/out.pdb")),
            PathBuf::from("/work/out.pdb.debug.json")
        );
    }

    #[tokio::test]
    async fn writes_primary_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("output.pdb");
        let body = json!({"output_pdb": "ATOM\nEND\n"}).to_string();

        let processed = process(&rfdiffusion(), &body, &primary).await;

        assert_eq!(processed.degraded, None);
        assert_eq!(processed.artifacts, vec![Artifact::Primary(primary.clone())]);
        assert_eq!(std::fs::read_to_string(&primary).unwrap(), "ATOM\nEND\n");
    }

    #[tokio::test]
    async fn missing_fields_give_placeholder_and_debug_dump() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("output.pdb");
        let body = json!({"unexpected": {"shape": true}}).to_string();

        let processed = process(&rfdiffusion(), &body, &primary).await;

        assert!(processed.degraded.is_some());
        let written = std::fs::read_to_string(&primary).unwrap();
        assert!(!written.is_empty());
        assert!(written.contains("PLACEHOLDER"));

        let dump = std::fs::read_to_string(debug_path(&primary)).unwrap();
        let dumped: Value = serde_json::from_str(&dump).unwrap();
        assert_eq!(dumped["unexpected"]["shape"], true);
    }

    #[tokio::test]
    async fn primary_in_a_subdirectory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("results").join("design_1.pdb");
        let body = json!({"output_pdb": "ATOM\nEND\n"}).to_string();

        let processed = process(&rfdiffusion(), &body, &primary).await;

        assert_eq!(processed.degraded, None);
        assert_eq!(std::fs::read_to_string(&primary).unwrap(), "ATOM\nEND\n");
    }

    #[tokio::test]
    async fn unparseable_body_degrades_as_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("output.pdb");

        let processed = process(&rfdiffusion(), "<html>502 Bad Gateway</html>", &primary).await;

        let reason = processed.degraded.unwrap();
        assert!(reason.starts_with("could not parse response"));
        assert!(std::fs::read_to_string(&primary).unwrap().contains("could not parse response"));
    }

    #[tokio::test]
    async fn unwritable_primary_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let primary = blocker.join("output.pdb");

        let processed = process(&rfdiffusion(), "{}", &primary).await;

        assert!(processed.degraded.is_some());
        assert!(processed.artifacts.iter().all(|a| !matches!(a, Artifact::Primary(_))));
    }
}
