// src/cli/handlers/run.rs

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use tokio::runtime::Runtime;

use super::commons;
use crate::cli::args::ContextFlags;
use crate::core::error::RecipeResult;
use crate::core::identifier::RecipeIdentifier;
use crate::state::AppServices;
use crate::system::executor::ExecutionError;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Runs a recipe, installing it first if needed.")]
struct RunArgs {
    #[command(flatten)]
    flags: ContextFlags,
    /// `name` or `name@range`. A bare name matching a local task runs that task.
    recipe: String,
    /// Arguments handed to the recipe.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Runs the local task called `identifier` if there is one, else the recipe.
async fn invoke(
    services: &AppServices,
    identifier: &RecipeIdentifier,
    raw: &str,
    args: Vec<String>,
) -> RecipeResult<Value> {
    if identifier.is_latest() && services.elves.has(&identifier.name).await? {
        return services.elves.get(&identifier.name, Vec::new()).invoke(args).await;
    }
    services.runner.get(raw, Vec::new()).invoke(args).await
}

pub fn handle(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    let services = commons::services(&run_args.flags)?;
    let identifier = RecipeIdentifier::parse(&run_args.recipe);

    let result = runtime.block_on(async {
        tokio::select! {
            result = invoke(&services, &identifier, &run_args.recipe, run_args.args.clone()) => {
                result.map_err(anyhow::Error::from)
            }
            _ = tokio::signal::ctrl_c() => {
                Err(anyhow::Error::from(ExecutionError::Interrupted(run_args.recipe.clone())))
            }
        }
    })?;

    match result {
        Value::Null => {}
        Value::String(s) => println!("{}", s),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    log::debug!("Finished '{}'", identifier);
    Ok(())
}
