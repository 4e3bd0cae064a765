// src/cli/dispatcher.rs

use anyhow::Result;
use colored::*;
use tokio::runtime::Runtime;

use crate::cli::handlers;

/// A command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &Runtime) -> Result<()>,
}

/// Every command the binary understands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "run",
        aliases: &["r"],
        handler: handlers::run::handle,
    },
    CommandDefinition {
        name: "install",
        aliases: &["i"],
        handler: handlers::install::handle,
    },
    CommandDefinition {
        name: "publish",
        aliases: &["pub"],
        handler: handlers::publish::handle,
    },
    CommandDefinition {
        name: "login",
        aliases: &[],
        handler: handlers::auth::login,
    },
    CommandDefinition {
        name: "logout",
        aliases: &[],
        handler: handlers::auth::logout,
    },
    CommandDefinition {
        name: "signup",
        aliases: &["register"],
        handler: handlers::auth::signup,
    },
    CommandDefinition {
        name: "whoami",
        aliases: &[],
        handler: handlers::auth::whoami,
    },
    CommandDefinition {
        name: "user",
        aliases: &[],
        handler: handlers::user::handle,
    },
    CommandDefinition {
        name: "config",
        aliases: &["cfg"],
        handler: handlers::config::handle,
    },
    CommandDefinition {
        name: "cache",
        aliases: &[],
        handler: handlers::cache::handle,
    },
];

/// Finds a command by name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `args` to a handler. An unknown first word is taken as a recipe to run.
pub fn dispatch(mut args: Vec<String>, runtime: &Runtime) -> Result<()> {
    log::debug!("Dispatching args: {:?}", args);

    if args.is_empty() {
        println!(
            "Nothing to do. Try '{}' or '{}'.",
            "recipe run <name>".cyan(),
            "recipe --help".cyan()
        );
        return Ok(());
    }

    let first = args.remove(0);
    match find_command(&first) {
        Some(command) => (command.handler)(args, runtime),
        None => {
            // `recipe mylib@^1 a b` is short for `recipe run mylib@^1 a b`.
            let mut run_args = vec![first];
            run_args.extend(args);
            handlers::run::handle(run_args, runtime)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_resolve_by_name_and_alias() {
        assert_eq!(find_command("install").map(|c| c.name), Some("install"));
        assert_eq!(find_command("i").map(|c| c.name), Some("install"));
        assert_eq!(find_command("register").map(|c| c.name), Some("signup"));
        assert!(find_command("mylib").is_none());
    }

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for cmd in COMMAND_REGISTRY {
            for name in std::iter::once(&cmd.name).chain(cmd.aliases.iter()) {
                assert!(seen.insert(*name), "duplicate command name '{}'", name);
            }
        }
    }
}
