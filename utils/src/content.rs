use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Where a document lives in cold storage and the exact bytes stored there.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentAddress {
    pub cid: String,
    pub json: String,
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        _ => value.clone(),
    }
}

/// Compact JSON with object keys sorted at every level, so equal documents
/// always produce the same string.
pub fn canonical_json(value: &Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string(&sort_keys(value))?)
}

pub fn content_identifier(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    format!("sha256-{:x}", digest)
}

impl ContentAddress {
    pub fn from_value(value: &Value) -> anyhow::Result<Self> {
        let json = canonical_json(value)?;
        let cid = content_identifier(&json);
        Ok(ContentAddress { cid, json })
    }
}
