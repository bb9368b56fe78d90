//! 構造予測サービス（配列 → 構造）
//!
//! レスポンス内の構造の置き場所はプロバイダごとに違うので、
//! 全サービスで1つの順序付き候補リストを共有する。

use serde_json::{Value, json};

use super::{ServiceContract, or_default, payload, required_str};
use crate::domain::{RequestPayload, Result, TaskParameters};

const FOLDING_OUTPUT_FIELDS: &[&str] = &[
    "pdbs",
    "pdb",
    "structures_in_ranked_order",
    "structure",
    "output_pdb",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFold2;

impl OpenFold2 {
    pub const NAME: &'static str = "openfold2";
}

impl ServiceContract for OpenFold2 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload> {
        let sequence = required_str(params, Self::NAME, "sequence")?;
        Ok(payload([
            ("sequence", Value::String(sequence)),
            (
                "selected_models",
                or_default(params, "selected_models", || json!([1, 2])),
            ),
            (
                "relax_prediction",
                or_default(params, "relax_prediction", || json!(false)),
            ),
        ]))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        FOLDING_OUTPUT_FIELDS
    }
}

/// MSA-based prediction; `algorithm` selects the MSA search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlphaFold2;

impl AlphaFold2 {
    pub const NAME: &'static str = "alphafold2";
}

impl ServiceContract for AlphaFold2 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload> {
        let sequence = required_str(params, Self::NAME, "sequence")?;
        Ok(payload([
            ("sequence", Value::String(sequence)),
            ("algorithm", or_default(params, "algorithm", || json!("mmseqs2"))),
            ("e_value", or_default(params, "e_value", || json!(0.0001))),
            ("iterations", or_default(params, "iterations", || json!(1))),
            (
                "databases",
                or_default(params, "databases", || json!(["small_bfd"])),
            ),
            (
                "relax_prediction",
                or_default(params, "relax_prediction", || json!(false)),
            ),
        ]))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        FOLDING_OUTPUT_FIELDS
    }
}

/// Single-sequence language-model folding; takes nothing but the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EsmFold;

impl EsmFold {
    pub const NAME: &'static str = "esmfold";
}

impl ServiceContract for EsmFold {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_request(&self, params: &TaskParameters) -> Result<RequestPayload> {
        let sequence = required_str(params, Self::NAME, "sequence")?;
        Ok(payload([("sequence", Value::String(sequence))]))
    }

    fn output_fields(&self) -> &'static [&'static str] {
        FOLDING_OUTPUT_FIELDS
    }
}
