use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::execution::command::{CommandExecutor, ProcessInvocation};
use crate::types::WdmResult;

/// Records invocations instead of spawning them.
///
/// Every invocation succeeds unless its label was marked failing or given a
/// queue of outcomes.
#[derive(Default)]
pub struct ScriptedExecutor {
    always_failing: HashSet<String>,
    outcomes: Mutex<HashMap<String, VecDeque<bool>>>,
    calls: Mutex<Vec<ProcessInvocation>>,
    existing_files: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, label: &str) -> Self {
        self.always_failing.insert(label.to_string());
        self
    }

    /// Successive outcomes for `label`; once exhausted it succeeds
    pub fn with_outcomes(self, label: &str, outcomes: &[bool]) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(label.to_string(), outcomes.iter().copied().collect());
        self
    }

    pub fn calls(&self) -> Vec<ProcessInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.label).collect()
    }

    /// First arguments that named an existing file while the process ran
    pub fn existing_files(&self) -> Vec<String> {
        self.existing_files.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, invocation: &ProcessInvocation) -> WdmResult<bool> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(first) = invocation.args.first() {
            if std::path::Path::new(first).is_file() {
                self.existing_files.lock().unwrap().push(first.clone());
            }
        }

        if self.always_failing.contains(&invocation.label) {
            return Ok(false);
        }
        let next = self
            .outcomes
            .lock()
            .unwrap()
            .get_mut(&invocation.label)
            .and_then(VecDeque::pop_front);
        Ok(next.unwrap_or(true))
    }
}
