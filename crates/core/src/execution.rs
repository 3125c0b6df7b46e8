//! Task execution module
//!
//! This module handles the actual execution of tasks: dependency resolution,
//! task dispatch, process spawning and output streaming.

pub mod automation;
pub mod command;
pub mod dependencies;
pub mod output;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandExecutor, ProcessInvocation, SystemCommandExecutor};
pub use dependencies::{DependencyResolver, Detection};
pub use runner::{TaskOutcome, TaskRunner};
