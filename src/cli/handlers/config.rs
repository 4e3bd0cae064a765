// src/cli/handlers/config.rs

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::cli::args::ContextFlags;
use crate::core::config::ConfigController;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Reads and writes layered configuration.")]
struct ConfigArgs {
    #[command(flatten)]
    flags: ContextFlags,
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Prints the merged value of a key, or everything when no key is given.
    Get { key: Option<String> },
    /// Writes a key in the selected scope. Values are parsed as JSON when possible.
    Set { key: String, value: String },
    /// Removes a key from the selected scope.
    Delete { key: String },
}

/// `8080` and `["a"]` become JSON values; anything that does not parse stays a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn handle(args: Vec<String>, _runtime: &Runtime) -> Result<()> {
    let config_args = ConfigArgs::try_parse_from(&args)?;
    let target = config_args.flags.target()?;
    let config = ConfigController::new(config_args.flags.context()?);

    match config_args.action {
        ConfigAction::Get { key: None } => {
            println!("{}", serde_json::to_string_pretty(&config.get_all()?)?);
        }
        ConfigAction::Get { key: Some(key) } => {
            let value = config
                .get(&key)?
                .ok_or_else(|| anyhow!("Config key '{}' is not set.", key))?;
            match value {
                Value::String(s) => println!("{}", s),
                other => println!("{}", serde_json::to_string_pretty(&other)?),
            }
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, parse_value(&value), target)?;
            println!("{} {} ({})", "Set".green(), key.cyan(), target);
        }
        ConfigAction::Delete { key } => {
            if config.delete(&key, target)? {
                println!("{} {} ({})", "Deleted".green(), key.cyan(), target);
            } else {
                println!("{} '{}' is not set in {} config.", "Nothing to do:".yellow(), key, target);
            }
        }
    }
    Ok(())
}
