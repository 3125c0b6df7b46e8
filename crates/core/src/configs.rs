//! YAML document models
//!
//! Dependency files, predefined-task files and the task definitions they share.

pub mod dependencies;
pub mod predefined;
pub mod tasks;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Render a YAML scalar the way it would be written in a shell variable
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Deserialize a `key: scalar` mapping, normalising every scalar to a string
pub(crate) fn string_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut values = IndexMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let value = scalar_to_string(&value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "configuration value for '{}' must be a scalar",
                key
            ))
        })?;
        values.insert(key, value);
    }
    Ok(values)
}
