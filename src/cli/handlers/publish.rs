// src/cli/handlers/publish.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tokio::runtime::Runtime;

use super::commons;
use crate::cli::args::ContextFlags;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Publishes the recipe in a directory.")]
struct PublishArgs {
    #[command(flatten)]
    flags: ContextFlags,
    /// The recipe directory or its `recipe.json`. Defaults to the current directory.
    path: Option<PathBuf>,
}

pub fn handle(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let publish_args = PublishArgs::try_parse_from(&args)?;
    let services = commons::services(&publish_args.flags)?;
    let path = publish_args.path.unwrap_or_else(|| PathBuf::from("."));

    let receipt = runtime.block_on(services.publisher.publish(&path))?;
    println!(
        "{} {}@{}",
        "Published".green().bold(),
        receipt.name.cyan(),
        receipt.version.cyan()
    );
    log::debug!("Package hash: {}", receipt.hash);
    Ok(())
}
