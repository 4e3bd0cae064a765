// src/cli/handlers/cache.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tokio::runtime::Runtime;

use super::commons;
use crate::cli::args::ContextFlags;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manages the local package cache.")]
struct CacheArgs {
    #[command(flatten)]
    flags: ContextFlags,
    #[command(subcommand)]
    action: CacheAction,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Deletes every downloaded package.
    Clear,
}

pub fn handle(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let cache_args = CacheArgs::try_parse_from(&args)?;
    let services = commons::services(&cache_args.flags)?;

    match cache_args.action {
        CacheAction::Clear => {
            let removed = runtime.block_on(services.downloads.clear())?;
            println!(
                "{} {} cached package(s) from {}",
                "Removed".green(),
                removed,
                services.downloads.dir().display()
            );
        }
    }
    Ok(())
}
