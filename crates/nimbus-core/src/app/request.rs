//! リクエスト構築（入力のステージング, ペイロード生成, コマンド echo）
//!
//! `build` は純粋な部分。ファイルシステムに触るのは `prepare_inputs` だけで、
//! worker が `build` の前に実行する。

use std::path::Path;

use serde_json::Value;

use crate::domain::params::INPUT_PDB_FILE_KEY;
use crate::domain::{NimError, RequestPayload, Result, ServiceDescriptor, TaskParameters};
use crate::services::{Service, ServiceContract};

/// Structure records kept when embedding a PDB file.
pub const STRUCTURE_RECORD: &str = "ATOM";
pub const MAX_STRUCTURE_LINES: usize = 400;

/// `params` から `service` 向けのペイロードを作る
pub fn build(service: &str, params: &TaskParameters) -> Result<RequestPayload> {
    Service::from_name(service).build_request(params)
}

/// Keep only `ATOM` records, at most [`MAX_STRUCTURE_LINES`] of them.
pub fn reduce_structure(pdb: &str) -> String {
    pdb.lines()
        .filter(|line| line.starts_with(STRUCTURE_RECORD))
        .take(MAX_STRUCTURE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace `input_pdb_file` with the reduced file content under `input_pdb`.
/// Relative paths resolve against `work_dir`.
pub async fn prepare_inputs(params: &TaskParameters, work_dir: &Path) -> Result<TaskParameters> {
    let Some(file) = params.get(INPUT_PDB_FILE_KEY) else {
        return Ok(params.clone());
    };
    let Some(file) = file.as_str() else {
        return Err(NimError::Configuration(format!(
            "'{INPUT_PDB_FILE_KEY}' must be a path string"
        )));
    };

    let path = work_dir.join(file);
    let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
        NimError::Configuration(format!("cannot read input structure {}: {e}", path.display()))
    })?;

    let mut map = params.as_map().clone();
    map.remove(INPUT_PDB_FILE_KEY);
    map.insert("input_pdb".to_string(), Value::String(reduce_structure(&text)));
    Ok(TaskParameters::from_map(map))
}

/// `.command.sh` に書くリクエストのシェル表現。認証情報は含めない。
pub fn command_echo(
    task: &str,
    descriptor: &ServiceDescriptor,
    payload: &RequestPayload,
    timeout_secs: u64,
) -> String {
    let auth = if descriptor.has_credential() {
        "  -H 'Authorization: Bearer ***' \\\n"
    } else {
        ""
    };
    format!(
        "#!/bin/bash\n\
         # nimbus task {task}\n\
         # service: {service}\n\
         curl -sS -X POST '{endpoint}' \\\n\
         \x20 -H 'Content-Type: application/json' \\\n\
         \x20 -H 'Accept: application/json' \\\n\
         {auth}\
         \x20 --max-time {timeout_secs} \\\n\
         \x20 -d @- <<'NIMBUS_PAYLOAD'\n\
         {body}\n\
         NIMBUS_PAYLOAD\n",
        service = descriptor.name,
        endpoint = descriptor.endpoint,
        body = payload.to_pretty_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    const PDB: &str = "HEADER    DNA BINDING PROTEIN\n\
                       ATOM      1  N   GLU A  20\n\
                       HETATM  900  O   HOH A 301\n\
                       ATOM      2  CA  GLU A  20\n\
                       TER\n\
                       END";

    #[test]
    fn reduce_keeps_only_atom_records() {
        assert_eq!(
            reduce_structure(PDB),
            "ATOM      1  N   GLU A  20\nATOM      2  CA  GLU A  20"
        );
    }

    #[test]
    fn reduce_caps_line_count() {
        let big: String = (0..1000).map(|i| format!("ATOM  {i:5}\n")).collect();
        let reduced = reduce_structure(&big);
        assert_eq!(reduced.lines().count(), MAX_STRUCTURE_LINES);
        assert!(reduced.ends_with("ATOM    399"));
    }

    #[test]
    fn build_dispatches_by_name() {
        let params = TaskParameters::new().with("input_pdb", "ATOM");
        let payload = build("rfdiffusion", &params).unwrap();
        assert_eq!(payload.get("diffusion_steps"), Some(&json!(15)));

        let generic = build("unknown", &params).unwrap();
        assert_eq!(generic.get("diffusion_steps"), None);
    }

    #[tokio::test]
    async fn prepare_inputs_embeds_reduced_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1R42.pdb"), PDB).unwrap();
        let params = TaskParameters::new()
            .with("service", "rfdiffusion")
            .with(INPUT_PDB_FILE_KEY, "1R42.pdb");

        let prepared = prepare_inputs(&params, dir.path()).await.unwrap();

        assert!(!prepared.contains(INPUT_PDB_FILE_KEY));
        assert_eq!(prepared.str("input_pdb").unwrap().lines().count(), 2);
        assert_eq!(prepared.service(), Some("rfdiffusion"));
    }

    #[tokio::test]
    async fn prepare_inputs_without_file_is_identity() {
        let params = TaskParameters::new().with("sequence", "MKT");
        let prepared = prepare_inputs(&params, Path::new("/nonexistent")).await.unwrap();
        assert_eq!(prepared, params);
    }

    #[tokio::test]
    async fn missing_input_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let params = TaskParameters::new().with(INPUT_PDB_FILE_KEY, "absent.pdb");
        let err = prepare_inputs(&params, dir.path()).await.unwrap_err();
        assert!(matches!(err, NimError::Configuration(msg) if msg.contains("absent.pdb")));
    }

    #[test]
    fn command_echo_redacts_credential() {
        let descriptor = ServiceDescriptor::new(
            "esmfold",
            Url::parse("https://health.api.nvidia.com/v1/biology/nvidia/esmfold").unwrap(),
            Some("nvapi-secret".into()),
        );
        let payload = build("esmfold", &TaskParameters::new().with("sequence", "MKT")).unwrap();
        let script = command_echo("task-1", &descriptor, &payload, 600);

        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("curl -sS -X POST 'https://health.api.nvidia.com/v1/biology/nvidia/esmfold'"));
        assert!(script.contains("Bearer ***"));
        assert!(!script.contains("nvapi-secret"));
        assert!(script.contains("\"sequence\": \"MKT\""));
    }
}
