//! Child process execution
//!
//! Executors describe what to run as a [`ProcessInvocation`]; a
//! [`CommandExecutor`] spawns it, streams its output into the log and reports
//! whether it exited successfully.

use std::process::Stdio;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::process::Command;

use crate::execution::output::{multiplex, OutputStream};
use crate::types::{WdmError, WdmResult};

/// A fully prepared child process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInvocation {
    /// Task name, used as the log prefix of every output line
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment
    pub env: IndexMap<String, String>,
}

impl ProcessInvocation {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            env: IndexMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The invocation as a single printable command line
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs child processes to completion
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `invocation`, returning `true` when it exits with status 0
    async fn execute(&self, invocation: &ProcessInvocation) -> WdmResult<bool>;
}

/// Spawns real processes and multiplexes their output into `tracing`
#[derive(Debug, Default, Clone)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn execute(&self, invocation: &ProcessInvocation) -> WdmResult<bool> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WdmError::Task(format!(
                    "Failed to execute '{}' for task '{}': {}",
                    invocation.program, invocation.label, e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WdmError::Task("child stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| WdmError::Task("child stderr was not captured".to_string()))?;

        let label = invocation.label.as_str();
        let run = async {
            multiplex(stdout, stderr, |stream, line| {
                let stream = match stream {
                    OutputStream::Stdout => "stdout",
                    OutputStream::Stderr => "stderr",
                };
                tracing::debug!(stream, "{} | {}", label, line);
            })
            .await?;
            child.wait().await
        };

        tokio::select! {
            status = run => Ok(status?.success()),
            _ = tokio::signal::ctrl_c() => Err(WdmError::Interrupted(invocation.label.clone())),
        }
    }
}
