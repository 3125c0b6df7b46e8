//! Configuration sources and per-task key resolution
//!
//! Values come from three places, merged once at startup into a
//! [`GlobalConfiguration`]: the `--config` command-line list, the configuration
//! document of the dependency file, and a `key=value` configuration file.
//! Tasks then pull only the keys they declare through [`resolve_keys`], where a
//! dependency's own `configuration` overrides win over the global values.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};

use crate::configs::dependencies::Dependency;
use crate::configs::tasks::Task;
use crate::types::{WdmError, WdmResult};

/// Process-wide configuration values, immutable once loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfiguration {
    values: IndexMap<String, String>,
}

impl GlobalConfiguration {
    /// Hidden key recording which document provided the configuration
    pub const NAME_KEY: &'static str = "__name__";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build from layered sources, highest precedence first
    pub fn from_layers<'a>(layers: impl IntoIterator<Item = &'a IndexMap<String, String>>) -> Self {
        let mut values = IndexMap::new();
        for layer in layers {
            for (key, value) in layer {
                if !values.contains_key(key) {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        Self { values }
    }

    pub fn with_provenance(mut self, name: Option<&str>) -> Self {
        if let Some(name) = name {
            self.values
                .insert(Self::NAME_KEY.to_string(), name.to_string());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve every configuration key `task` (and its dependency) declares.
///
/// Keys are looked up in the dependency's own overrides first, then in the
/// global configuration. A key missing from both is fatal.
pub fn resolve_keys(
    global: &GlobalConfiguration,
    dependency: &Dependency,
    task: Option<&Task>,
) -> WdmResult<IndexMap<String, String>> {
    let task_keys = task.map(Task::configuration).unwrap_or_default();
    let keys: IndexSet<&str> = dependency
        .spec
        .configuration
        .iter()
        .chain(task_keys)
        .map(String::as_str)
        .collect();

    let mut resolved = IndexMap::new();
    for key in keys {
        let value = dependency
            .configuration
            .get(key)
            .map(String::as_str)
            .or_else(|| global.get(key));

        match value {
            Some(value) => {
                resolved.insert(key.to_string(), value.to_string());
            }
            None => {
                let available = available_keys(global, dependency);
                return Err(WdmError::Config(format!(
                    "could not find a value for the configuration key '{}' (available: {})",
                    key,
                    available.join(", ")
                )));
            }
        }
    }

    Ok(resolved)
}

fn available_keys<'a>(global: &'a GlobalConfiguration, dependency: &'a Dependency) -> Vec<&'a str> {
    let keys: IndexSet<&str> = dependency
        .configuration
        .keys()
        .map(String::as_str)
        .chain(global.keys())
        .collect();
    keys.into_iter().collect()
}

/// Parse a comma-separated `key=value` list as given to `--config`
pub fn parse_cli_configuration(arg: &str) -> WdmResult<IndexMap<String, String>> {
    let mut values = IndexMap::new();
    for entry in arg.split(',').filter(|e| !e.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(WdmError::Config(format!(
                "invalid configuration entry in the command-line: {}",
                entry
            )));
        };
        values.insert(key.to_string(), value.to_string());
    }
    Ok(values)
}

/// Parse `key=value` lines. Duplicated keys keep their first value.
pub fn parse_kv_str(content: &str, source: &str) -> IndexMap<String, String> {
    let mut values = IndexMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::warn!("Invalid line in {}: {}", source, line);
            continue;
        };
        if values.contains_key(key) {
            tracing::warn!(
                "Duplicated entry in {}: {}. Keeping only the first entry.",
                source,
                key
            );
            continue;
        }
        values.insert(key.to_string(), value.to_string());
    }
    values
}

pub fn parse_kv_file(path: &Path) -> WdmResult<IndexMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WdmError::Config(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(parse_kv_str(&content, &path.display().to_string()))
}

/// Replace `${key}` and `$key` placeholders with resolved values.
///
/// Longer keys are substituted first so `$name` never clobbers `$namespace`.
pub fn substitute_placeholders(template: &str, values: &IndexMap<String, String>) -> String {
    let mut keys: Vec<&String> = values.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut result = template.to_string();
    for key in keys {
        let value = &values[key];
        result = result.replace(&format!("${{{}}}", key), value);
        result = result.replace(&format!("${}", key), value);
    }
    result
}
