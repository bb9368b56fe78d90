//! 正規化されたリクエストペイロード

use serde::Serialize;
use serde_json::{Map, Value};

/// サービスに送る JSON ドキュメント。実行ごとに1回作り、変更しない。
///
/// `serde_json::Map` keeps keys sorted, so two payloads built from the same
/// parameters render to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestPayload(Map<String, Value>);

impl RequestPayload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // A map of JSON values cannot fail to serialize.
        serde_json::to_vec(&self.0).unwrap_or_default()
    }

    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }
}
