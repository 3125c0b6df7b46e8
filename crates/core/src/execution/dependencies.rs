//! Dependency resolution
//!
//! The resolver walks the requirement graph depth-first, in declaration order.
//! For every dependency it runs the test tasks, and when none of them passes
//! and the run mode allows it, the install tasks followed by one more round of
//! tests. Each dependency is processed at most once per run.

use std::future::Future;
use std::pin::Pin;

use crate::configs::dependencies::Dependency;
use crate::context::{RunContext, RunState};
use crate::execution::command::CommandExecutor;
use crate::execution::runner::TaskRunner;
use crate::types::{WdmError, WdmResult};

/// Result of running a dependency's test tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// A test task passed
    Satisfied,
    /// Every test task failed, or there are only install tasks
    Unsatisfied,
    /// Test tasks exist but none was executed (dryrun)
    Skipped,
    /// Nothing to test and nothing to install
    NoTest,
}

type ResolveFuture<'b> = Pin<Box<dyn Future<Output = WdmResult<()>> + 'b>>;

/// Walks the dependency graph of a run and records what was tested and installed
pub struct DependencyResolver<'a> {
    context: &'a RunContext,
    runner: TaskRunner<'a>,
    state: RunState,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(context: &'a RunContext, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            context,
            runner: TaskRunner::new(context, executor),
            state: RunState::default(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn into_state(self) -> RunState {
        self.state
    }

    /// Resolve `name` and, first, everything it requires
    pub async fn resolve(&mut self, name: &str) -> WdmResult<()> {
        let context = self.context;
        let dependency = context.catalog.get(name).ok_or_else(|| {
            WdmError::Dependency(format!(
                "main dependency '{}' does not exist (known: {})",
                name,
                context.catalog.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        self.resolve_dependency(dependency).await
    }

    fn resolve_dependency<'b>(&'b mut self, dependency: &'a Dependency) -> ResolveFuture<'b> {
        let context = self.context;
        Box::pin(async move {
            let name = &dependency.name;
            tracing::info!("Resolving '{}' dependency ...", name);

            if self.state.resolved.contains(name) {
                tracing::info!("Dependency '{}' has already been resolved, skipping.", name);
                return Ok(());
            }
            if let Some(start) = self.state.resolving.get_index_of(name) {
                let cycle = self
                    .state
                    .resolving
                    .iter()
                    .skip(start)
                    .chain(std::iter::once(name))
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(WdmError::Cycle(cycle));
            }

            self.check_configuration(dependency)?;

            self.state.resolving.insert(name.clone());
            for requirement in &dependency.spec.requirements {
                tracing::info!("Dependency '{}' needs '{}' ...", name, requirement);
                let next = context.catalog.find_requirement(name, requirement)?;
                self.resolve_dependency(next).await?;
            }

            self.satisfy(dependency).await?;

            self.state.resolving.shift_remove(name);
            self.state.resolved.insert(name.clone());
            tracing::info!("Done with '{}'.", name);
            Ok(())
        })
    }

    /// Every key the dependency declares must be globally configured
    fn check_configuration(&self, dependency: &Dependency) -> WdmResult<()> {
        let configuration = &self.context.configuration;
        let missing: Vec<&str> = dependency
            .spec
            .configuration
            .iter()
            .filter(|key| !configuration.contains(key))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        let available = configuration.keys().collect::<Vec<_>>().join(", ");

        Err(WdmError::Config(format!(
            "'{}' needs missing configuration keys: {} (available: {})",
            dependency.name,
            missing.join(", "),
            available
        )))
    }

    async fn satisfy(&mut self, dependency: &Dependency) -> WdmResult<()> {
        let name = &dependency.name;
        let spec = &dependency.spec;

        match self.detect(dependency, true).await? {
            Detection::Satisfied => {
                tracing::debug!("Dependency '{}' is satisfied, no need to install.", name);
                return Ok(());
            }
            Detection::NoTest => return Ok(()),
            Detection::Unsatisfied if self.context.mode.skips_install() => {
                if !spec.test.is_empty() {
                    self.state.unsatisfied.insert(name.clone());
                }
                self.skip_install(dependency);
                return Ok(());
            }
            Detection::Skipped => {
                self.skip_install(dependency);
                return Ok(());
            }
            Detection::Unsatisfied => {}
        }

        if spec.install.is_empty() {
            return Err(WdmError::Install(format!(
                "'{}' test failed, but no install task is provided",
                name
            )));
        }

        tracing::info!("Installing '{}' ...", name);
        for task in &spec.install {
            if self.runner.run(dependency, task, false).await? == Some(false) {
                return Err(WdmError::Install(format!(
                    "installation of '{}' failed at task '{}'",
                    name,
                    task.name()
                )));
            }
            self.state
                .installed
                .insert(RunState::task_key(name, task.name()));
        }

        if spec.test.is_empty() {
            tracing::info!("'{}' installed, but has no test. Continuing nevertheless.", name);
            return Ok(());
        }

        if self.detect(dependency, false).await? != Detection::Satisfied {
            return Err(WdmError::Install(format!(
                "'{}' installed, but test still failing",
                name
            )));
        }

        Ok(())
    }

    /// Record the install tasks that would have run
    fn skip_install(&mut self, dependency: &Dependency) {
        for task in &dependency.spec.install {
            tracing::debug!(
                "Running in {} mode, skipping '{}' installation.",
                self.context.mode,
                task.name()
            );
            self.state
                .installed
                .insert(RunState::task_key(&dependency.name, task.name()));
        }
    }

    /// Run the test tasks of `dependency` until one passes
    pub async fn detect(&mut self, dependency: &Dependency, announce: bool) -> WdmResult<Detection> {
        let name = &dependency.name;
        let spec = &dependency.spec;

        if spec.test.is_empty() {
            if spec.install.is_empty() {
                if announce {
                    tracing::debug!(
                        "Nothing to test for '{}'. Doesn't have install tasks, we're good.",
                        name
                    );
                }
                return Ok(Detection::NoTest);
            }
            if announce {
                tracing::debug!("Nothing to test for '{}'. Has install tasks, run them.", name);
            }
            return Ok(Detection::Unsatisfied);
        }

        let mut announce = announce;
        let mut skipped = false;
        for task in &spec.test {
            if announce {
                tracing::debug!("Testing '{}' ...", name);
                announce = false;
            }

            let outcome = self.runner.run(dependency, task, true).await?;
            self.state
                .tested
                .insert(RunState::task_key(name, task.name()), outcome);

            match outcome {
                Some(true) => return Ok(Detection::Satisfied),
                Some(false) => {}
                None => skipped = true,
            }
        }

        Ok(if skipped {
            Detection::Skipped
        } else {
            Detection::Unsatisfied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::dependencies::parse_dependency_documents;
    use crate::configs::predefined::PredefinedTaskRegistry;
    use crate::configuration::GlobalConfiguration;
    use crate::context::{DependencyCatalog, ExecutionSettings, RunMode};
    use crate::execution::testing::ScriptedExecutor;

    fn context(mode: RunMode, yaml: &str) -> RunContext {
        let documents = parse_dependency_documents(yaml, "deps.yaml").unwrap();
        let configuration = documents
            .configuration
            .clone()
            .map(|doc| GlobalConfiguration::from_layers([&doc.values]))
            .unwrap_or_default();
        let mut catalog = DependencyCatalog::new();
        catalog.add_documents(documents, "");

        RunContext {
            mode,
            configuration,
            catalog,
            predefined: PredefinedTaskRegistry::new(),
            settings: ExecutionSettings {
                working_dir: std::env::temp_dir(),
                ansible_config: None,
                shell_trace: true,
            },
        }
    }

    const HAS_TOOL: &str = r#"
name: cfg
timeout: "30"
---
name: has_tool
spec:
  test:
  - name: t1
    type: shell
    spec: which tool
  install:
  - name: i1
    type: shell
    spec: install-tool
"#;

    #[tokio::test]
    async fn satisfied_dependency_is_not_installed() {
        let ctx = context(RunMode::Ensure, HAS_TOOL);
        let executor = ScriptedExecutor::new();
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("has_tool").await.unwrap();

        assert_eq!(executor.labels(), vec!["t1"]);
        let state = resolver.into_state();
        assert_eq!(state.tested.get("has_tool -> t1"), Some(&Some(true)));
        assert!(state.installed.is_empty());
        assert!(!state.has_failures());
    }

    #[tokio::test]
    async fn test_mode_reports_failure_without_installing() {
        let ctx = context(RunMode::Test, HAS_TOOL);
        let executor = ScriptedExecutor::new().failing("t1");
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("has_tool").await.unwrap();

        assert_eq!(executor.labels(), vec!["t1"]);
        let state = resolver.into_state();
        assert!(state.has_failures());
        assert!(state.installed.contains("has_tool -> i1"));
    }

    #[tokio::test]
    async fn ensure_installs_then_retests() {
        let ctx = context(RunMode::Ensure, HAS_TOOL);
        let executor = ScriptedExecutor::new().with_outcomes("t1", &[false, true]);
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("has_tool").await.unwrap();

        assert_eq!(executor.labels(), vec!["t1", "i1", "t1"]);
        let state = resolver.into_state();
        assert!(state.installed.contains("has_tool -> i1"));
        assert_eq!(state.tested.get("has_tool -> t1"), Some(&Some(true)));
        assert!(!state.has_failures());
    }

    #[tokio::test]
    async fn ensure_fails_when_retest_still_fails() {
        let ctx = context(RunMode::Ensure, HAS_TOOL);
        let executor = ScriptedExecutor::new().failing("t1");
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        let err = resolver.resolve("has_tool").await.unwrap_err();

        assert!(matches!(err, WdmError::Install(_)));
        assert!(err.to_string().contains("test still failing"));
    }

    #[tokio::test]
    async fn short_circuits_on_first_passing_test() {
        let ctx = context(
            RunMode::Ensure,
            r#"
name: d
spec:
  test:
  - {name: t1, type: shell, spec: 'true'}
  - {name: t2, type: shell, spec: 'true'}
"#,
        );
        let executor = ScriptedExecutor::new();
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("d").await.unwrap();

        assert_eq!(executor.labels(), vec!["t1"]);
        assert!(!resolver.state().tested.contains_key("d -> t2"));
    }

    #[tokio::test]
    async fn shared_requirements_run_once() {
        let ctx = context(
            RunMode::Ensure,
            r#"
name: top
spec:
  requirements: [left, right]
---
name: left
spec:
  requirements: [base]
---
name: right
spec:
  requirements: [base]
---
name: base
spec:
  test:
  - {name: base_test, type: shell, spec: 'true'}
"#,
        );
        let executor = ScriptedExecutor::new();
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("top").await.unwrap();

        assert_eq!(executor.labels(), vec!["base_test"]);
        let resolved: Vec<_> = resolver.state().resolved.iter().cloned().collect();
        assert_eq!(resolved, vec!["base", "left", "right", "top"]);
    }

    #[tokio::test]
    async fn forced_and_trivial_dependencies() {
        let ctx = context(
            RunMode::Ensure,
            r#"
name: top
spec:
  requirements: [forced, trivial]
---
name: forced
spec:
  install:
  - {name: setup, type: shell, spec: 'true'}
---
name: trivial
spec: {}
"#,
        );
        let executor = ScriptedExecutor::new();
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("top").await.unwrap();

        assert_eq!(executor.labels(), vec!["setup"]);
        assert!(resolver.state().installed.contains("forced -> setup"));
        assert!(resolver.state().tested.is_empty());
    }

    #[tokio::test]
    async fn dryrun_spawns_nothing_but_lists_installs() {
        let ctx = context(
            RunMode::DryRun,
            r#"
name: top
spec:
  requirements: [base]
  test:
  - {name: top_test, type: shell, spec: 'false'}
  install:
  - {name: top_install, type: shell, spec: 'true'}
---
name: base
spec:
  install:
  - {name: base_install, type: shell, spec: 'true'}
  - name: base_play
    type: ansible
    spec:
    - debug: msg=hi
"#,
        );
        let executor = ScriptedExecutor::new();
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        resolver.resolve("top").await.unwrap();

        assert!(executor.calls().is_empty());
        let state = resolver.into_state();
        let installed: Vec<_> = state.installed.iter().map(String::as_str).collect();
        assert_eq!(
            installed,
            vec!["base -> base_install", "base -> base_play", "top -> top_install"]
        );
        assert_eq!(state.tested.get("top -> top_test"), Some(&None));
        assert!(!state.has_failures());
    }

    #[tokio::test]
    async fn failed_install_aborts_before_dependents() {
        let ctx = context(
            RunMode::Ensure,
            r#"
name: b
spec:
  requirements: [a]
  test:
  - {name: b_test, type: shell, spec: 'true'}
  install:
  - {name: b_install, type: shell, spec: 'true'}
---
name: a
spec:
  install:
  - {name: a_install, type: shell, spec: 'false'}
"#,
        );
        let executor = ScriptedExecutor::new().failing("a_install");
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        let err = resolver.resolve("b").await.unwrap_err();

        assert_eq!(err.exit_code(), 1);
        assert!(matches!(err, WdmError::Install(_)));
        assert_eq!(executor.labels(), vec!["a_install"]);
    }

    #[tokio::test]
    async fn unsatisfied_without_install_is_fatal_in_ensure() {
        let ctx = context(
            RunMode::Ensure,
            "name: d\nspec:\n  test:\n  - {name: t, type: shell, spec: 'false'}\n",
        );
        let executor = ScriptedExecutor::new().failing("t");
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        let err = resolver.resolve("d").await.unwrap_err();
        assert!(err.to_string().contains("no install task"));
    }

    #[tokio::test]
    async fn cycles_are_reported_with_their_path() {
        let ctx = context(
            RunMode::Ensure,
            r#"
name: a
spec:
  requirements: [b]
---
name: b
spec:
  requirements: [c]
---
name: c
spec:
  requirements: [b]
"#,
        );
        let executor = ScriptedExecutor::new();
        let mut resolver = DependencyResolver::new(&ctx, &executor);

        let err = resolver.resolve("a").await.unwrap_err();

        assert!(matches!(err, WdmError::Cycle(_)));
        assert!(err.to_string().contains("b -> c -> b"));
    }

    #[tokio::test]
    async fn unknown_requirement_and_missing_configuration_are_fatal() {
        let ctx = context(
            RunMode::Ensure,
            r#"
name: cfg
present: yes
---
name: needs_ghost
spec:
  requirements: [ghost]
---
name: needs_key
spec:
  configuration: [present, absent]
"#,
        );
        let executor = ScriptedExecutor::new();

        let mut resolver = DependencyResolver::new(&ctx, &executor);
        let err = resolver.resolve("needs_ghost").await.unwrap_err();
        assert!(matches!(err, WdmError::Dependency(_)));
        assert!(err.to_string().contains("'ghost'"));

        let mut resolver = DependencyResolver::new(&ctx, &executor);
        let err = resolver.resolve("needs_key").await.unwrap_err();
        assert!(matches!(err, WdmError::Config(_)));
        assert!(err.to_string().contains("absent"));
        assert!(err.to_string().contains("available: present"));

        let mut resolver = DependencyResolver::new(&ctx, &executor);
        assert!(resolver.resolve("nope").await.is_err());
    }
}
