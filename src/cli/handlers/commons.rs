// src/cli/handlers/commons.rs

// Shared helpers for the command handlers.

use anyhow::Result;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::cli::args::ContextFlags;
use crate::state::AppServices;

/// Builds the services for the scope selected by `flags`.
pub fn services(flags: &ContextFlags) -> Result<AppServices> {
    AppServices::build(flags.context()?)
}

/// Returns `value`, or asks for it when it was not given on the command line.
pub fn text_or_prompt(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .interact_text()?),
    }
}

pub fn password_prompt(confirm: bool) -> Result<String> {
    let theme = ColorfulTheme::default();
    let mut prompt = Password::with_theme(&theme).with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match.");
    }
    Ok(prompt.interact()?)
}
