// src/cli/mod.rs

use clap::Parser;

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// recipe: resolve, install and run versioned build recipes.
///
/// Commands:
///   run <recipe[@range]> [args...]   Run a recipe (or a local task)
///   install <recipe[@range]>         Install a recipe without running it
///   publish [path]                   Publish the recipe in `path`
///   signup | login | logout | whoami Manage your account session
///   user username|email <value>      Change your username or e-mail
///   config get|set|delete <key>      Read or write configuration
///   cache clear                      Remove downloaded packages
///
/// Every command accepts --global, --user or --project to pick the config scope.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, verbatim_doc_comment)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The command followed by its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
