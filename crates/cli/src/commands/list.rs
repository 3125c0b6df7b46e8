use std::process::ExitCode;

use anyhow::Result;
use colored::*;
use wdm_core::dependency_manager::DependencyManager;

pub fn execute(manager: &DependencyManager) -> Result<ExitCode> {
    let dependencies = manager.list_dependencies();
    println!("{}", "Dependencies".bold().underline());

    if dependencies.is_empty() {
        println!("  {}", "No dependencies found".dimmed());
        return Ok(ExitCode::SUCCESS);
    }

    for name in dependencies {
        println!("- {}", name);
    }

    Ok(ExitCode::SUCCESS)
}
