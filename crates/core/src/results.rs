//! Result types for dependency manager operations
//!
//! This module contains the structures handed back to the CLI for printing.

use crate::context::{RunMode, RunState, TestOutcome};

/// One test task of the report
#[derive(Debug, Clone, PartialEq)]
pub struct TestEntry {
    /// `"<dependency> -> <task>"`
    pub key: String,
    pub outcome: TestOutcome,
}

/// Summary of a finished resolution
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub target: String,
    pub tested: Vec<TestEntry>,
    /// Installed tasks, or in dryrun/test mode the ones that would have been
    pub installed: Vec<String>,
    /// Dependencies left unsatisfied in test mode
    pub failures: Vec<String>,
}

impl RunReport {
    pub fn from_state(mode: RunMode, target: &str, state: RunState) -> Self {
        Self {
            mode,
            target: target.to_string(),
            tested: state
                .tested
                .into_iter()
                .map(|(key, outcome)| TestEntry { key, outcome })
                .collect(),
            installed: state.installed.into_iter().collect(),
            failures: state.unsatisfied.into_iter().collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn tested_heading(&self) -> &'static str {
        if self.mode.is_dry_run() {
            "Would have tested"
        } else {
            "Tested"
        }
    }

    pub fn installed_heading(&self) -> &'static str {
        if self.mode.skips_install() {
            "Would have installed"
        } else {
            "Installed"
        }
    }
}

/// Marker shown in front of a test entry
pub fn outcome_marker(outcome: TestOutcome) -> &'static str {
    match outcome {
        Some(true) => "☑ ",
        Some(false) => "❎ ",
        None => "",
    }
}
