//! スケジューラが渡すタスクごとのパラメータ

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key naming the target service.
pub const SERVICE_KEY: &str = "service";
/// Key overriding the primary output file name.
pub const OUTPUT_FILE_KEY: &str = "output_file";
/// Key pointing at a structure file to embed as `input_pdb`.
pub const INPUT_PDB_FILE_KEY: &str = "input_pdb_file";

/// 既知のキー + サービス固有オプション
///
/// The core only reads from it. Getters return `None` on missing keys or
/// mismatched JSON types instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskParameters(Map<String, Value>);

impl TaskParameters {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Accepts only JSON objects; anything else yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// String array; `None` if any element is not a string.
    pub fn str_list(&self, key: &str) -> Option<Vec<String>> {
        self.0
            .get(key)?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    pub fn service(&self) -> Option<&str> {
        self.str(SERVICE_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn getters_ignore_mismatched_types() {
        let params = TaskParameters::from_value(json!({
            "service": "rfdiffusion",
            "diffusion_steps": "many",
            "hotspot_res": ["A1", 2],
        }))
        .unwrap();

        assert_eq!(params.service(), Some("rfdiffusion"));
        assert_eq!(params.u64("diffusion_steps"), None);
        assert_eq!(params.str_list("hotspot_res"), None);
        assert_eq!(params.str("missing"), None);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(TaskParameters::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn builder_style_insert() {
        let params = TaskParameters::new()
            .with("sequence", "MKT")
            .with("iterations", 2);
        assert_eq!(params.str("sequence"), Some("MKT"));
        assert_eq!(params.u64("iterations"), Some(2));
        assert!(params.contains("sequence"));
    }
}
