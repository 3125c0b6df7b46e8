use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::configs::tasks::Task;
use crate::configs::{scalar_to_string, string_map};
use crate::types::{WdmError, WdmResult};

/// A named unit with a detection procedure and a remediation procedure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Dependency {
    pub name: String,
    /// Caller-supplied overrides, consulted before the global configuration
    #[serde(default, deserialize_with = "string_map")]
    pub configuration: IndexMap<String, String>,
    pub spec: DependencySpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub configuration: Vec<String>,
    #[serde(default)]
    pub test: Vec<Task>,
    #[serde(default)]
    pub install: Vec<Task>,
}

/// The spec-less document of a dependency file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationDocument {
    pub name: Option<String>,
    pub values: IndexMap<String, String>,
}

/// Everything a single dependency file declares, in file order
#[derive(Debug, Clone, Default)]
pub struct DependencyDocuments {
    pub configuration: Option<ConfigurationDocument>,
    pub dependencies: Vec<Dependency>,
}

/// Split a multi-document YAML file into its configuration document and its dependencies.
///
/// `source` only names the file in error messages.
pub fn parse_dependency_documents(yaml_str: &str, source: &str) -> WdmResult<DependencyDocuments> {
    let mut documents = DependencyDocuments::default();

    for document in serde_yaml::Deserializer::from_str(yaml_str) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        let is_configuration = value.as_mapping().is_some_and(|m| !m.contains_key("spec"));
        if is_configuration {
            let configuration = parse_configuration_document(&value)
                .map_err(|e| schema_error(source, &value, &e))?;
            if documents.configuration.is_some() {
                return Err(schema_error(
                    source,
                    &value,
                    "only one configuration document (without 'spec') is allowed per file",
                ));
            }
            documents.configuration = Some(configuration);
            continue;
        }

        let dependency: Dependency = serde_yaml::from_value(value.clone())
            .map_err(|e| schema_error(source, &value, &e.to_string()))?;
        documents.dependencies.push(dependency);
    }

    Ok(documents)
}

fn parse_configuration_document(value: &Value) -> Result<ConfigurationDocument, String> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| "document must be a mapping".to_string())?;

    let mut document = ConfigurationDocument::default();
    for (key, value) in mapping {
        let key = key
            .as_str()
            .ok_or_else(|| format!("configuration key {:?} is not a string", key))?;
        match key {
            "name" => document.name = scalar_to_string(value),
            "configuration" => {
                let Some(values) = value.as_mapping() else {
                    if value.is_null() {
                        continue;
                    }
                    return Err("'configuration' must be a mapping".to_string());
                };
                for (k, v) in values {
                    let (Some(k), Some(v)) = (k.as_str(), scalar_to_string(v)) else {
                        return Err(format!("invalid configuration entry {:?}", k));
                    };
                    document.values.insert(k.to_string(), v);
                }
            }
            other => {
                let v = scalar_to_string(value)
                    .ok_or_else(|| format!("configuration value for '{}' must be a scalar", other))?;
                document.values.insert(other.to_string(), v);
            }
        }
    }

    Ok(document)
}

fn schema_error(source: &str, document: &Value, reason: &str) -> WdmError {
    if let Ok(dump) = serde_yaml::to_string(document) {
        tracing::info!("Faulty YAML entry:\n{}", dump);
    }
    WdmError::Schema(format!("{}: {}", source, reason))
}
