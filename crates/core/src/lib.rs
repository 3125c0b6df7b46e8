//! WDM Core Library
//!
//! This is the core library of the Workload Dependency Manager. It checks, and
//! if needed installs, the prerequisites of a workload from a declarative YAML
//! dependency file.
//!
//! ## Architecture
//!
//! - [`dependency_manager`] - High-level interface: loads files, runs a target
//! - [`execution`] - Resolver, task dispatch, process spawning and output streaming
//! - [`configs`] - YAML models for dependencies, tasks and predefined task templates
//! - [`configuration`] - Configuration sources and per-task key resolution
//! - [`context`] - Run mode, immutable run context and accumulated run state
//! - [`env`] - Startup `.env` files
//! - [`results`] - Report returned after a run
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wdm_core::context::RunMode;
//! use wdm_core::execution::SystemCommandExecutor;
//! use wdm_core::{DependencyManager, DependencyManagerConfig};
//!
//! # async fn example() -> wdm_core::types::WdmResult<()> {
//! let manager = DependencyManager::new(DependencyManagerConfig::default())?;
//! let report = manager
//!     .run(RunMode::Ensure, None, &SystemCommandExecutor::new())
//!     .await?;
//! println!("installed {} tasks", report.installed.len());
//! # Ok(())
//! # }
//! ```

pub mod configs;
pub mod configuration;
pub mod context;
pub mod dependency_manager;
pub mod env;
pub mod execution;
pub mod results;
pub mod types;

// Re-export the main types for easier usage
pub use dependency_manager::{DependencyManager, DependencyManagerConfig};
pub use types::{WdmError, WdmResult};
