use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One transaction as a loose field-to-value mapping, exactly as it arrives
/// from the source API. Canonical field names only exist after normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_object(obj: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            data: obj.into_iter().collect(),
        }
    }

    /// A field counts as missing when absent or explicitly null.
    pub fn is_null(&self, key: &str) -> bool {
        match self.data.get(key) {
            None => true,
            Some(serde_json::Value::Null) => true,
            Some(_) => false,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(|v| v.as_bool())
    }

    pub fn insert(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }
}

/// Output of the transform stage handed to the load stage.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub records: Vec<Record>,
    /// Sorted column union across all records; the stable schema for CSV and
    /// SQLite output.
    pub columns: Vec<String>,
    /// True when the transformation failed and the records are the original,
    /// untransformed input.
    pub degraded: bool,
}
