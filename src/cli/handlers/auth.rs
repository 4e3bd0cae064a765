// src/cli/handlers/auth.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use tokio::runtime::Runtime;

use super::commons;
use crate::cli::args::ContextFlags;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Logs in and stores the session in config.")]
struct LoginArgs {
    #[command(flatten)]
    flags: ContextFlags,
    #[arg(long, short)]
    email: Option<String>,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Creates an account and logs into it.")]
struct SignupArgs {
    #[command(flatten)]
    flags: ContextFlags,
    #[arg(long)]
    username: Option<String>,
    #[arg(long, short)]
    email: Option<String>,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct SessionArgs {
    #[command(flatten)]
    flags: ContextFlags,
}

pub fn login(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let login_args = LoginArgs::try_parse_from(&args)?;
    let services = commons::services(&login_args.flags)?;
    let email = commons::text_or_prompt(login_args.email, "E-mail")?;
    let password = commons::password_prompt(false)?;

    let user = runtime.block_on(services.auth.login(&email, &password))?;
    println!("{} {}", "Logged in as".green(), user.username.cyan().bold());
    Ok(())
}

pub fn signup(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let signup_args = SignupArgs::try_parse_from(&args)?;
    let services = commons::services(&signup_args.flags)?;
    let username = commons::text_or_prompt(signup_args.username, "Username")?;
    let email = commons::text_or_prompt(signup_args.email, "E-mail")?;
    let password = commons::password_prompt(true)?;

    let user = runtime.block_on(services.auth.sign_up(&username, &email, &password))?;
    println!(
        "{} {}. You are now logged in.",
        "Welcome,".green(),
        user.username.cyan().bold()
    );
    Ok(())
}

pub fn logout(args: Vec<String>, _runtime: &Runtime) -> Result<()> {
    let session_args = SessionArgs::try_parse_from(&args)?;
    let services = commons::services(&session_args.flags)?;
    if services.auth.logout()? {
        println!("{}", "Logged out.".green());
    } else {
        println!("{}", "No session in this scope.".yellow());
    }
    Ok(())
}

pub fn whoami(args: Vec<String>, runtime: &Runtime) -> Result<()> {
    let session_args = SessionArgs::try_parse_from(&args)?;
    let services = commons::services(&session_args.flags)?;
    match runtime.block_on(services.auth.current_user())? {
        Some(user) => println!("{} <{}>", user.username.cyan().bold(), user.email),
        None => println!("{}", "Not logged in.".yellow()),
    }
    Ok(())
}
