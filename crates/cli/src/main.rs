use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use wdm_core::context::RunMode;
use wdm_core::dependency_manager::{
    DependencyManager, DependencyManagerConfig, DEFAULT_DEPENDENCY_FILE,
};
use wdm_core::WdmError;

mod commands;

/// WDM - Workload Dependency Manager
///
/// Exit codes: 0 when everything is satisfied, 1 when a test or an
/// installation failed or the files are invalid, 2 on invocation errors.
#[derive(Parser)]
#[command(name = "wdm")]
#[command(about = "Test, and install if needed, the dependencies of a workload")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Do not run test nor install tasks, only show what would run
    Dryrun(RunArgs),
    /// Only test if the dependencies are satisfied
    Test(RunArgs),
    /// Test the dependencies and install those unsatisfied
    Ensure(RunArgs),
    /// List the known dependencies
    List(RunArgs),
    /// Show an example of command and dependency file
    Example,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Dependency to resolve (same as --target)
    #[arg(value_name = "TARGET")]
    target_name: Option<String>,

    /// Dependency to resolve. If empty, the first entry of the dependency file
    #[arg(long = "target", env = "WDM_TARGET")]
    target: Option<String>,

    /// Path of the dependency file to resolve
    #[arg(long = "dependency_file", env = "WDM_DEPENDENCY_FILE", default_value = DEFAULT_DEPENDENCY_FILE)]
    dependency_file: PathBuf,

    /// Ansible config file (for ansible tasks)
    #[arg(long = "ansible_config", env = "WDM_ANSIBLE_CONFIG")]
    ansible_config: Option<PathBuf>,

    /// Directory of library dependency files. The dependency file may then be omitted
    #[arg(long = "library", env = "WDM_LIBRARY")]
    library: Option<PathBuf>,

    /// Predefined tasks file or directory (defaults to ./predefined.d when present)
    #[arg(long = "predefined", env = "WDM_PREDEFINED")]
    predefined: Option<PathBuf>,

    /// Comma-separated key=value list of configuration values
    #[arg(long = "config", env = "WDM_CONFIG")]
    config: Option<String>,

    /// File of key=value configuration lines (defaults to .wdm_config, 'no' to skip)
    #[arg(long = "config_file", env = "WDM_CONFIG_FILE")]
    config_file: Option<String>,

    /// Trace shell task commands with `set -x`
    #[arg(
        long = "shell_trace",
        env = "WDM_SHELL_TRACE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    shell_trace: bool,
}

impl RunArgs {
    fn target(&self) -> Option<&str> {
        self.target_name.as_deref().or(self.target.as_deref())
    }

    fn manager_config(&self) -> Result<DependencyManagerConfig> {
        let working_dir =
            std::env::current_dir().context("Failed to read the current directory")?;

        Ok(DependencyManagerConfig {
            dependency_file: self.dependency_file.clone(),
            library: self.library.clone(),
            predefined: self.predefined.clone(),
            config: self.config.clone(),
            config_file: self.config_file.clone(),
            ansible_config: self.ansible_config.clone(),
            shell_trace: self.shell_trace,
            working_dir,
        })
    }

    fn load_manager(&self) -> Result<DependencyManager> {
        let manager = DependencyManager::new(self.manager_config()?)
            .context("Failed to load the dependency files")?;
        Ok(manager)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = match std::env::current_dir() {
        Ok(cwd) => wdm_core::env::load_env_files(&cwd),
        Err(_) => Vec::new(),
    };
    let cleared = wdm_core::env::clear_empty_vars("WDM_");

    init_tracing();
    for (file, key, value) in &loaded {
        tracing::debug!("{}: {}={}", file, key, value);
    }
    for key in &cleared {
        tracing::debug!("Ignoring empty variable {}", key);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Dryrun(args) => run_mode(RunMode::DryRun, &args).await,
        Commands::Test(args) => run_mode(RunMode::Test, &args).await,
        Commands::Ensure(args) => run_mode(RunMode::Ensure, &args).await,
        Commands::List(args) => args
            .load_manager()
            .and_then(|manager| commands::list::execute(&manager)),
        Commands::Example => commands::example::execute(),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

async fn run_mode(mode: RunMode, args: &RunArgs) -> Result<ExitCode> {
    let manager = args.load_manager()?;
    commands::run::execute(&manager, mode, args.target()).await
}

fn exit_code_for_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<WdmError>() {
        Some(err) => err.exit_code() as u8,
        None => 1,
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .try_init();
}
