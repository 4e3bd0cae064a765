// src/cli/handlers/install.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use tokio::runtime::Runtime;

use super::commons;
use crate::cli::args::ContextFlags;
use crate::core::identifier::RecipeIdentifier;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Resolves and installs a recipe without running it.")]
struct InstallArgs {
    #[command(flatten)]
    flags: ContextFlags,
    /// `name` or `name@range`.
    recipe: String,
}

pub fn handle(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let install_args = InstallArgs::try_parse_from(&args)?;
    let services = commons::services(&install_args.flags)?;
    let identifier = RecipeIdentifier::parse(&install_args.recipe);

    let (resolved, recipe) = runtime.block_on(services.runner.install(&identifier))?;
    println!(
        "{} {}@{} in {}",
        "Installed".green().bold(),
        resolved.name.cyan(),
        resolved.version_number.cyan(),
        recipe.recipe_file().dir().display()
    );
    Ok(())
}
