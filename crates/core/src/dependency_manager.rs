//! High-level dependency management interface
//!
//! This module provides the [`DependencyManager`] which serves as the primary
//! interface of the CLI. It loads the dependency file, the library and
//! predefined-task side files and every configuration source, then resolves a
//! target dependency in a given [`RunMode`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use wdm_core::context::RunMode;
//! use wdm_core::dependency_manager::{DependencyManager, DependencyManagerConfig};
//! use wdm_core::execution::SystemCommandExecutor;
//!
//! # async fn example() -> wdm_core::types::WdmResult<()> {
//! let manager = DependencyManager::new(DependencyManagerConfig::default())?;
//!
//! let report = manager
//!     .run(RunMode::Test, Some("has_gpu_operator"), &SystemCommandExecutor::new())
//!     .await?;
//! assert!(!report.has_failures());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::configs::dependencies::{parse_dependency_documents, ConfigurationDocument};
use crate::configs::predefined::{yaml_files_in, PredefinedTaskRegistry};
use crate::configuration::{parse_cli_configuration, parse_kv_file, GlobalConfiguration};
use crate::context::{DependencyCatalog, ExecutionSettings, RunContext, RunMode};
use crate::execution::{CommandExecutor, DependencyResolver};
use crate::results::RunReport;
use crate::types::{WdmError, WdmResult};

pub const DEFAULT_DEPENDENCY_FILE: &str = "./dependencies.yaml";
pub const DEFAULT_PREDEFINED_DIR: &str = "predefined.d";
pub const DEFAULT_CONFIG_FILE: &str = ".wdm_config";
/// `--config_file` value that disables the configuration file
pub const NO_CONFIG_FILE: &str = "no";

/// Inputs of a [`DependencyManager`], usually straight from the command line
#[derive(Debug, Clone)]
pub struct DependencyManagerConfig {
    pub dependency_file: PathBuf,
    /// Directory of library dependency files
    pub library: Option<PathBuf>,
    /// Predefined tasks file or directory; `predefined.d` when it exists otherwise
    pub predefined: Option<PathBuf>,
    /// Comma-separated `key=value` list
    pub config: Option<String>,
    /// `key=value` file; `.wdm_config` when it exists otherwise, `no` to disable
    pub config_file: Option<String>,
    pub ansible_config: Option<PathBuf>,
    pub shell_trace: bool,
    /// Base of every relative path above, and home of temporary play files
    pub working_dir: PathBuf,
}

impl Default for DependencyManagerConfig {
    fn default() -> Self {
        Self {
            dependency_file: PathBuf::from(DEFAULT_DEPENDENCY_FILE),
            library: None,
            predefined: None,
            config: None,
            config_file: None,
            ansible_config: None,
            shell_trace: true,
            working_dir: ExecutionSettings::default().working_dir,
        }
    }
}

/// Loaded dependency files and configuration, ready to resolve targets
pub struct DependencyManager {
    pub configuration: GlobalConfiguration,
    pub catalog: DependencyCatalog,
    pub predefined: PredefinedTaskRegistry,
    pub settings: ExecutionSettings,
    first_target: Option<String>,
}

impl DependencyManager {
    /// Load every file named by `config`
    pub fn new(config: DependencyManagerConfig) -> WdmResult<Self> {
        let base = config.working_dir.as_path();

        let cli_configuration = match &config.config {
            Some(arg) => parse_cli_configuration(arg)?,
            None => IndexMap::new(),
        };

        let predefined = Self::load_predefined(base, config.predefined.as_deref())?;

        let mut catalog = DependencyCatalog::new();
        if let Some(library) = &config.library {
            Self::load_library(&base.join(library), &mut catalog)?;
        }

        let file_configuration = Self::load_config_file(base, config.config_file.as_deref())?;

        let dependency_file = base.join(&config.dependency_file);
        let mut document_configuration = ConfigurationDocument::default();
        let mut first_target = None;
        if dependency_file.is_file() {
            let content = std::fs::read_to_string(&dependency_file)?;
            let mut documents =
                parse_dependency_documents(&content, &dependency_file.display().to_string())?;
            if let Some(configuration) = documents.configuration.take() {
                document_configuration = configuration;
            }
            first_target = catalog.add_documents(documents, "");
        } else if config.library.is_none() {
            return Err(WdmError::Invocation(format!(
                "flag 'dependency_file' must point to a valid file (dependency_file='{}'), \
                 or set 'library' to pick the target from the library files only",
                config.dependency_file.display()
            )));
        }

        let configuration = GlobalConfiguration::from_layers([
            &cli_configuration,
            &document_configuration.values,
            &file_configuration,
        ])
        .with_provenance(document_configuration.name.as_deref());

        tracing::debug!(
            "Loaded {} dependencies, {} predefined tasks, {} configuration values",
            catalog.len(),
            predefined.len(),
            configuration.len()
        );

        Ok(Self {
            configuration,
            catalog,
            predefined,
            settings: ExecutionSettings {
                working_dir: config.working_dir,
                ansible_config: config.ansible_config,
                shell_trace: config.shell_trace,
            },
            first_target,
        })
    }

    /// Names of every known dependency, in load order
    pub fn list_dependencies(&self) -> Vec<String> {
        self.catalog.names().map(str::to_string).collect()
    }

    /// The explicitly requested target, or the first dependency of the dependency file
    pub fn target(&self, requested: Option<&str>) -> WdmResult<String> {
        match requested.filter(|t| !t.is_empty()) {
            Some(target) => Ok(target.to_string()),
            None => self.first_target.clone().ok_or_else(|| {
                WdmError::Invocation(
                    "flag 'target' cannot be empty when no dependency file declares a dependency"
                        .to_string(),
                )
            }),
        }
    }

    /// Resolve `target` in `mode` and summarize what happened
    pub async fn run(
        &self,
        mode: RunMode,
        target: Option<&str>,
        executor: &dyn CommandExecutor,
    ) -> WdmResult<RunReport> {
        let target = self.target(target)?;
        let context = RunContext {
            mode,
            configuration: self.configuration.clone(),
            catalog: self.catalog.clone(),
            predefined: self.predefined.clone(),
            settings: self.settings.clone(),
        };

        let mut resolver = DependencyResolver::new(&context, executor);
        resolver.resolve(&target).await?;

        Ok(RunReport::from_state(mode, &target, resolver.into_state()))
    }

    fn load_predefined(base: &Path, explicit: Option<&Path>) -> WdmResult<PredefinedTaskRegistry> {
        let mut registry = PredefinedTaskRegistry::new();
        match explicit {
            Some(path) => {
                let path = base.join(path);
                if !path.exists() {
                    return Err(WdmError::Invocation(format!(
                        "predefined tasks path '{}' does not exist",
                        path.display()
                    )));
                }
                registry.load_path(&path)?;
            }
            None => {
                let path = base.join(DEFAULT_PREDEFINED_DIR);
                if path.is_dir() {
                    registry.load_path(&path)?;
                }
            }
        }
        Ok(registry)
    }

    fn load_library(dir: &Path, catalog: &mut DependencyCatalog) -> WdmResult<()> {
        if !dir.is_dir() {
            return Err(WdmError::Invocation(format!(
                "library '{}' is not a directory",
                dir.display()
            )));
        }

        for file in yaml_files_in(dir)? {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let source = file.display().to_string();
            let content = std::fs::read_to_string(&file)?;
            let documents = parse_dependency_documents(&content, &source)?;

            if documents
                .configuration
                .as_ref()
                .is_some_and(|c| !c.values.is_empty())
            {
                return Err(WdmError::Schema(format!(
                    "library file '{}' cannot have configuration values",
                    source
                )));
            }

            catalog.add_documents(documents, &format!("library.{}.", stem));
        }
        Ok(())
    }

    fn load_config_file(base: &Path, config_file: Option<&str>) -> WdmResult<IndexMap<String, String>> {
        let path = match config_file.filter(|f| !f.is_empty()) {
            Some(NO_CONFIG_FILE) => return Ok(IndexMap::new()),
            Some(path) => {
                let path = base.join(path);
                if !path.is_file() {
                    return Err(WdmError::Invocation(format!(
                        "flag 'config_file' must point to a valid file (config_file={})",
                        path.display()
                    )));
                }
                path
            }
            None => {
                let path = base.join(DEFAULT_CONFIG_FILE);
                if !path.is_file() {
                    return Ok(IndexMap::new());
                }
                path
            }
        };
        parse_kv_file(&path)
    }
}
