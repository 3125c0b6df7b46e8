//! Run-wide state
//!
//! [`RunContext`] is the read-only input of a run (mode, configuration, known
//! dependencies and templates). [`RunState`] is what the resolver accumulates
//! while walking the graph and hands back for the final report.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};

use crate::configs::dependencies::{Dependency, DependencyDocuments};
use crate::configs::predefined::PredefinedTaskRegistry;
use crate::configuration::GlobalConfiguration;
use crate::types::{WdmError, WdmResult};

/// Run-wide policy for executing test and install tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run nothing, report what would be tested and installed
    DryRun,
    /// Run test tasks only
    Test,
    /// Run test tasks and install whatever is unsatisfied
    Ensure,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }

    /// Whether install tasks are only reported, never executed
    pub fn skips_install(self) -> bool {
        matches!(self, RunMode::DryRun | RunMode::Test)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::DryRun => "dryrun",
            RunMode::Test => "test",
            RunMode::Ensure => "ensure",
        };
        f.write_str(name)
    }
}

/// Knobs for the process-spawning executors
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    /// Directory the automation play file is written to
    pub working_dir: PathBuf,
    /// Value for `ANSIBLE_CONFIG`, when overridden on the command line
    pub ansible_config: Option<PathBuf>,
    /// Run shell tasks with `set -x`
    pub shell_trace: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            ansible_config: None,
            shell_trace: true,
        }
    }
}

/// All known dependencies, keyed by (possibly prefixed) name
#[derive(Debug, Clone, Default)]
pub struct DependencyCatalog {
    dependencies: IndexMap<String, Dependency>,
    prefixes: HashMap<String, String>,
}

impl DependencyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the dependencies of one file under `prefix`.
    ///
    /// Returns the name of the first dependency the file declares.
    pub fn add_documents(&mut self, documents: DependencyDocuments, prefix: &str) -> Option<String> {
        let mut first_target = None;
        for mut dependency in documents.dependencies {
            dependency.name = format!("{}{}", prefix, dependency.name);
            if first_target.is_none() {
                first_target = Some(dependency.name.clone());
            }
            self.prefixes
                .insert(dependency.name.clone(), prefix.to_string());
            self.dependencies.insert(dependency.name.clone(), dependency);
        }
        first_target
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.get(name)
    }

    /// Find `requirement` as seen from `parent`: first inside the parent's
    /// library prefix, then as a plain name.
    pub fn find_requirement(&self, parent: &str, requirement: &str) -> WdmResult<&Dependency> {
        let prefix = self.prefixes.get(parent).map(String::as_str).unwrap_or("");
        let prefixed = format!("{}{}", prefix, requirement);

        self.dependencies
            .get(&prefixed)
            .or_else(|| self.dependencies.get(requirement))
            .ok_or_else(|| {
                let shown = if prefix.is_empty() {
                    requirement.to_string()
                } else {
                    format!("[{}]{}", prefix, requirement)
                };
                WdmError::Dependency(format!(
                    "missing required dependency '{}' (needed by '{}', known: {})",
                    shown,
                    parent,
                    self.names().collect::<Vec<_>>().join(", ")
                ))
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Immutable inputs shared by the resolver and the task dispatcher
#[derive(Debug, Clone)]
pub struct RunContext {
    pub mode: RunMode,
    pub configuration: GlobalConfiguration,
    pub catalog: DependencyCatalog,
    pub predefined: PredefinedTaskRegistry,
    pub settings: ExecutionSettings,
}

/// Outcome of one test task, as shown in the report
pub type TestOutcome = Option<bool>;

/// What the resolver learned during a run
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Dependencies fully processed, append-only
    pub resolved: IndexSet<String>,
    /// Dependencies currently being resolved, outermost first
    pub resolving: IndexSet<String>,
    /// `"<dep> -> <task>"` to test outcome, `None` when skipped
    pub tested: IndexMap<String, TestOutcome>,
    /// `"<dep> -> <task>"` of installed, or would-be installed, tasks
    pub installed: IndexSet<String>,
    /// Dependencies whose tests failed and were left unsatisfied
    pub unsatisfied: IndexSet<String>,
}

impl RunState {
    pub fn task_key(dependency: &str, task: &str) -> String {
        format!("{} -> {}", dependency, task)
    }

    pub fn has_failures(&self) -> bool {
        !self.unsatisfied.is_empty()
    }
}
