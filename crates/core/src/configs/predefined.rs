use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

use crate::configs::tasks::{parse_task, Task};
use crate::types::{WdmError, WdmResult};

/// Name of the template the toolbox task type expands to
pub const RUN_TOOLBOX: &str = "run_toolbox";

/// Reusable task templates, indexed by task name
#[derive(Debug, Clone, Default)]
pub struct PredefinedTaskRegistry {
    tasks: IndexMap<String, Task>,
}

impl PredefinedTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. The first definition of a name wins.
    pub fn insert(&mut self, task: Task) -> bool {
        if self.tasks.contains_key(task.name()) {
            tracing::warn!(
                "Predefined task '{}' already known. Keeping only the first one.",
                task.name()
            );
            return false;
        }
        self.tasks.insert(task.name().to_string(), task);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Add every task document of a multi-document YAML string
    pub fn load_str(&mut self, yaml_str: &str, source: &str) -> WdmResult<()> {
        for document in serde_yaml::Deserializer::from_str(yaml_str) {
            let value = Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }

            let task = parse_task(value.clone()).map_err(|e| {
                if let Ok(dump) = serde_yaml::to_string(&value) {
                    tracing::info!("Faulty YAML entry:\n{}", dump);
                }
                WdmError::Schema(format!("{}: {}", source, e))
            })?;
            self.insert(task);
        }
        Ok(())
    }

    /// Load a single file, or every `*.yaml`/`*.yml` file of a directory in name order
    pub fn load_path(&mut self, path: &Path) -> WdmResult<()> {
        if path.is_dir() {
            for file in yaml_files_in(path)? {
                self.load_file(&file)?;
            }
            return Ok(());
        }
        self.load_file(path)
    }

    fn load_file(&mut self, path: &Path) -> WdmResult<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WdmError::Invocation(format!(
                "Failed to read predefined tasks file {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!("Loading predefined tasks from {}", path.display());
        self.load_str(&content, &path.display().to_string())
    }
}

/// YAML files directly inside `dir`, sorted by file name
pub fn yaml_files_in(dir: &Path) -> WdmResult<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
