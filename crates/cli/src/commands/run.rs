use std::process::ExitCode;

use anyhow::Result;
use colored::*;
use wdm_core::context::RunMode;
use wdm_core::dependency_manager::DependencyManager;
use wdm_core::execution::SystemCommandExecutor;
use wdm_core::results::{outcome_marker, RunReport};

pub async fn execute(
    manager: &DependencyManager,
    mode: RunMode,
    target: Option<&str>,
) -> Result<ExitCode> {
    let target = manager.target(target)?;
    println!(
        "{} {} {}",
        "Resolving".bold(),
        target.cyan(),
        format!("({} mode)", mode).dimmed()
    );
    println!();

    let executor = SystemCommandExecutor::new();
    let report = manager.run(mode, Some(&target), &executor).await?;

    println!();
    print_summary(&report);

    if report.has_failures() {
        tracing::warn!("Test failed, exit with errcode=1.");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &RunReport) {
    println!("{}", "All done.".bold());
    println!();

    println!("{}:", report.tested_heading().bold());
    for entry in &report.tested {
        let line = format!("- {}{}", outcome_marker(entry.outcome), entry.key);
        match entry.outcome {
            Some(true) => println!("{}", line.green()),
            Some(false) => println!("{}", line.red()),
            None => println!("{}", line.dimmed()),
        }
    }

    if report.installed.is_empty() {
        println!("{}: nothing.", report.installed_heading().bold());
        return;
    }

    println!("{}:", report.installed_heading().bold());
    for task in &report.installed {
        println!("- {}", task.cyan());
    }
}
