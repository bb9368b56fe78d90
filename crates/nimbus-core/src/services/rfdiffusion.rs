//! RFdiffusion による構造生成

use serde_json::{Value, json};

use super::{ServiceContract, or_default, payload, required_str};
use crate::domain::{RequestPayload, Result, TaskParameters};

pub const DEFAULT_CONTIGS: &str = "A20-60/0 50-100";
pub const DEFAULT_HOTSPOTS: [&str; 5] = ["A50", "A51", "A52", "A53", "A54"];
pub const DEFAULT_DIFFUSION_STEPS: u64 = 15;

/// Generates a structure from an input PDB, contig map and hotspot residues.
///
/// Payload:
/// - `input_pdb`: required, PDB text (already reduced to ATOM records)
/// - `contigs`: defaults to [`DEFAULT_CONTIGS`]
/// - `hotspot_res`: defaults to [`DEFAULT_HOTSPOTS`]
/// - `diffusion_steps`: defaults to [`DEFAULT_DIFFUSION_STEPS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RfDiffusion;

impl RfDiffusion {
    pub const NAME: &'static str = "rfdiffusion";
}

impl ServiceContract for RfDiffusion {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload> {
        let input_pdb = required_str(params, Self::NAME, "input_pdb")?;
        Ok(payload([
            ("input_pdb", Value::String(input_pdb)),
            ("contigs", or_default(params, "contigs", || json!(DEFAULT_CONTIGS))),
            (
                "hotspot_res",
                or_default(params, "hotspot_res", || json!(DEFAULT_HOTSPOTS)),
            ),
            (
                "diffusion_steps",
                or_default(params, "diffusion_steps", || json!(DEFAULT_DIFFUSION_STEPS)),
            ),
        ]))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        &["output_pdb"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NimError;

    fn params() -> TaskParameters {
        TaskParameters::new()
            .with("service", "rfdiffusion")
            .with("input_pdb", "ATOM      1  N   ALA A  20")
    }

    #[test]
    fn defaults_are_applied() {
        let payload = RfDiffusion.build_request(&params()).unwrap();
        assert_eq!(payload.get("diffusion_steps"), Some(&json!(15)));
        assert_eq!(
            payload.get("hotspot_res"),
            Some(&json!(["A50", "A51", "A52", "A53", "A54"]))
        );
        assert_eq!(payload.get("contigs"), Some(&json!("A20-60/0 50-100")));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let p = params()
            .with("diffusion_steps", 50)
            .with("hotspot_res", json!(["B10"]))
            .with("contigs", "B1-30");
        let payload = RfDiffusion.build_request(&p).unwrap();
        assert_eq!(payload.get("diffusion_steps"), Some(&json!(50)));
        assert_eq!(payload.get("hotspot_res"), Some(&json!(["B10"])));
        assert_eq!(payload.get("contigs"), Some(&json!("B1-30")));
    }

    #[test]
    fn only_wire_fields_are_sent() {
        let payload = RfDiffusion.build_request(&params().with("output_file", "x.pdb")).unwrap();
        let keys: Vec<&String> = payload.fields().keys().collect();
        assert_eq!(keys, ["contigs", "diffusion_steps", "hotspot_res", "input_pdb"]);
    }

    #[test]
    fn missing_input_pdb_is_a_configuration_error() {
        let err = RfDiffusion
            .build_request(&TaskParameters::new().with("input_pdb", "  "))
            .unwrap_err();
        assert!(matches!(err, NimError::Configuration(_)));
    }
}
