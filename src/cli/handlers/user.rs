// src/cli/handlers/user.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tokio::runtime::Runtime;

use super::commons;
use crate::cli::args::ContextFlags;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Changes your account details.")]
struct UserArgs {
    #[command(flatten)]
    flags: ContextFlags,
    #[command(subcommand)]
    change: UserChange,
}

#[derive(Subcommand, Debug)]
enum UserChange {
    /// Picks a new username.
    Username { username: String },
    /// Moves the account to a new e-mail address.
    Email { email: String },
}

pub fn handle(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let user_args = UserArgs::try_parse_from(&args)?;
    let services = commons::services(&user_args.flags)?;

    let user = match &user_args.change {
        UserChange::Username { username } => {
            runtime.block_on(services.users.set_username(username))?
        }
        UserChange::Email { email } => runtime.block_on(services.users.set_email(email))?,
    };
    println!(
        "{} {} <{}>",
        "Updated:".green(),
        user.username.cyan().bold(),
        user.email
    );
    Ok(())
}
