//! Task dispatch
//!
//! [`TaskRunner`] routes a task to the executor for its type. Shell and
//! automation tasks spawn a process through the [`CommandExecutor`];
//! predefined and toolbox tasks expand into another task and recurse.

use std::future::Future;
use std::pin::Pin;

use indexmap::IndexMap;

use crate::configs::dependencies::Dependency;
use crate::configs::predefined::RUN_TOOLBOX;
use crate::configs::tasks::{
    AutomationTask, PredefinedSpec, PredefinedTask, ShellTask, Task, ToolboxTask,
};
use crate::configuration::{resolve_keys, substitute_placeholders};
use crate::context::RunContext;
use crate::execution::automation::PlaybookFile;
use crate::execution::command::{CommandExecutor, ProcessInvocation};
use crate::types::{WdmError, WdmResult};

/// `Some(success)` for executed tasks, `None` when skipped in dryrun mode
pub type TaskOutcome = Option<bool>;

type TaskFuture<'a> = Pin<Box<dyn Future<Output = WdmResult<TaskOutcome>> + 'a>>;

/// Dispatches tasks of a run to their executors
pub struct TaskRunner<'a> {
    context: &'a RunContext,
    executor: &'a dyn CommandExecutor,
}

impl<'a> TaskRunner<'a> {
    pub fn new(context: &'a RunContext, executor: &'a dyn CommandExecutor) -> Self {
        Self { context, executor }
    }

    /// Run one task on behalf of `dependency`
    pub async fn run(
        &self,
        dependency: &Dependency,
        task: &Task,
        is_test: bool,
    ) -> WdmResult<TaskOutcome> {
        self.dispatch(dependency, task, is_test, Vec::new()).await
    }

    fn dispatch<'b>(
        &'b self,
        dependency: &'b Dependency,
        task: &'b Task,
        is_test: bool,
        expanding: Vec<String>,
    ) -> TaskFuture<'b> {
        Box::pin(async move {
            tracing::debug!(
                "Running {} task '{}' ...",
                if is_test { "test" } else { "install" },
                task.name()
            );

            let outcome = match task {
                Task::Shell(shell) => self.run_shell(dependency, task, shell).await?,
                Task::Automation(automation) => {
                    self.run_automation(dependency, task, automation).await?
                }
                Task::Predefined(predefined) => {
                    self.run_predefined(dependency, predefined, is_test, expanding)
                        .await?
                }
                Task::Toolbox(toolbox) => {
                    self.run_toolbox(dependency, task, toolbox, is_test, expanding)
                        .await?
                }
            };

            if let Some(success) = outcome {
                tracing::info!(
                    "{} of '{}': {}",
                    if is_test { "Testing" } else { "Installation" },
                    task.name(),
                    if success { "Success" } else { "Failed" }
                );
            }
            Ok(outcome)
        })
    }

    async fn run_shell(
        &self,
        dependency: &Dependency,
        task: &Task,
        shell: &ShellTask,
    ) -> WdmResult<TaskOutcome> {
        tracing::debug!("[shell] Running '{}' ...", shell.name);
        let script = shell.spec.trim();

        let mut invocation = ProcessInvocation::new(&shell.name, "bash");
        for (key, value) in resolve_keys(&self.context.configuration, dependency, Some(task))? {
            tracing::debug!("[shell] env {}={}", key, value);
            invocation = invocation.env(key, value);
        }
        for line in script.lines() {
            tracing::debug!("[shell] {}", line);
        }

        if self.context.mode.is_dry_run() {
            tracing::info!("Dry mode, skipping execution.");
            return Ok(None);
        }

        let flags = if self.context.settings.shell_trace {
            "-cxeuo"
        } else {
            "-ceuo"
        };
        let invocation = invocation.arg(flags).arg("pipefail").arg(script);

        self.executor.execute(&invocation).await.map(Some)
    }

    async fn run_automation(
        &self,
        dependency: &Dependency,
        task: &Task,
        automation: &AutomationTask,
    ) -> WdmResult<TaskOutcome> {
        let extra_vars = resolve_keys(&self.context.configuration, dependency, Some(task))?;

        if self.context.mode.is_dry_run() {
            for (key, value) in &extra_vars {
                tracing::debug!("[ansible] extra var: {}={}", key, value);
            }
            tracing::info!("Dry mode, skipping execution.");
            return Ok(None);
        }

        let settings = &self.context.settings;
        let playbook = PlaybookFile::write(&settings.working_dir, &automation.name, &automation.spec)?;
        let invocation = playbook.invocation(
            &automation.name,
            &extra_vars,
            settings.ansible_config.as_deref(),
        );
        tracing::debug!("[ansible] command: {}", invocation.command_line());

        // `playbook` is dropped, and the file removed, on every return path
        self.executor.execute(&invocation).await.map(Some)
    }

    async fn run_predefined(
        &self,
        dependency: &Dependency,
        predefined: &PredefinedTask,
        is_test: bool,
        mut expanding: Vec<String>,
    ) -> WdmResult<TaskOutcome> {
        let template_name = &predefined.spec.name;
        let template = self.context.predefined.get(template_name).ok_or_else(|| {
            let available = self.context.predefined.names().join(", ");
            WdmError::Task(format!(
                "{}/{}: could not find predefined task '{}' (available: {})",
                dependency.name, predefined.name, template_name, available
            ))
        })?;

        if expanding.contains(template_name) {
            expanding.push(template_name.clone());
            return Err(WdmError::Cycle(format!(
                "predefined task '{}' expands into itself: {}",
                template_name,
                expanding.join(" -> ")
            )));
        }
        expanding.push(template_name.clone());

        let task = template.renamed(format!(
            "{} | predefined({})",
            predefined.name, template_name
        ));
        tracing::debug!("[predefined] Running '{}' ...", task.name());

        let mut caller = dependency.clone();
        for (key, value) in &predefined.spec.args {
            caller.configuration.insert(key.clone(), value.clone());
        }

        self.dispatch(&caller, &task, is_test, expanding).await
    }

    async fn run_toolbox(
        &self,
        dependency: &Dependency,
        task: &Task,
        toolbox: &ToolboxTask,
        is_test: bool,
        expanding: Vec<String>,
    ) -> WdmResult<TaskOutcome> {
        if !self.context.predefined.contains(RUN_TOOLBOX) {
            let available = self.context.predefined.names().join(", ");
            return Err(WdmError::Task(format!(
                "toolbox task '{}' needs the predefined task '{}' (available: {})",
                toolbox.name, RUN_TOOLBOX, available
            )));
        }

        let values = resolve_keys(&self.context.configuration, dependency, Some(task))?;
        let args = toolbox
            .spec
            .args
            .iter()
            .map(|arg| substitute_placeholders(arg, &values))
            .collect::<Vec<_>>()
            .join(" ");

        let mut toolbox_args = IndexMap::new();
        toolbox_args.insert(
            "group".to_string(),
            substitute_placeholders(&toolbox.spec.group, &values),
        );
        toolbox_args.insert(
            "command".to_string(),
            substitute_placeholders(&toolbox.spec.command, &values),
        );
        toolbox_args.insert("args".to_string(), args);

        let expanded = PredefinedTask {
            name: format!("{} | toolbox()", toolbox.name),
            configuration: toolbox.configuration.clone(),
            spec: PredefinedSpec {
                name: RUN_TOOLBOX.to_string(),
                args: toolbox_args,
            },
        };
        tracing::debug!("[toolbox] Running '{}' ...", expanded.name);

        self.run_predefined(dependency, &expanded, is_test, expanding)
            .await
    }
}
