// src/bin/recipe.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use recipe_runner::{
    cli::{Cli, dispatcher},
    core::error::{PublishError, RecipeError},
    system::executor::ExecutionError,
};

/// Finds the execution error behind `e`, however many layers wrap it.
fn execution_error(e: &anyhow::Error) -> Option<&ExecutionError> {
    if let Some(exec_err) = e.downcast_ref::<ExecutionError>() {
        return Some(exec_err);
    }
    match e.downcast_ref::<RecipeError>() {
        Some(RecipeError::Execution(exec_err)) => Some(exec_err),
        _ => match e.downcast_ref::<PublishError>() {
            Some(PublishError::Recipe(RecipeError::Execution(exec_err))) => Some(exec_err),
            _ => None,
        },
    }
}

/// Sets up logging and the runtime, dispatches, and turns errors into exit codes.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        match execution_error(&e) {
            // Ctrl+C: exit quietly like a shell would.
            Some(ExecutionError::Interrupted(_)) => std::process::exit(130),
            // A failing recipe passes its own status through.
            Some(ExecutionError::NonZeroExitStatus {
                code: Some(code), ..
            }) => {
                eprintln!("\n{}: {}", "Error".red().bold(), e);
                std::process::exit(*code);
            }
            _ => {
                eprintln!("\n{}: {}", "Error".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    dispatcher::dispatch(cli.args, &runtime)
}
