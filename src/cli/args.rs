// src/cli/args.rs

use anyhow::Result;
use clap::Args;

use crate::core::config::{ConfigTarget, RecipeContext};

/// The scope flags shared by every command.
#[derive(Args, Debug, Default, Clone, Copy)]
pub struct ContextFlags {
    /// Use the global config next to the executable.
    #[arg(long, short = 'g', global = true)]
    pub global: bool,
    /// Use the per-user config.
    #[arg(long, short = 'u', global = true)]
    pub user: bool,
    /// Use the project config in `./.recipe` (the default).
    #[arg(long, short = 'p', global = true)]
    pub project: bool,
}

impl ContextFlags {
    pub fn target(&self) -> Result<ConfigTarget> {
        Ok(ConfigTarget::from_flags(self.global, self.user, self.project)?)
    }

    /// The context of this process with the selected target.
    pub fn context(&self) -> Result<RecipeContext> {
        Ok(RecipeContext::detect(self.target()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    #[command(no_binary_name = true)]
    struct FlagsOnly {
        #[command(flatten)]
        flags: ContextFlags,
    }

    #[test]
    fn test_flags_map_to_targets() {
        let parsed = FlagsOnly::try_parse_from(["--user"]).unwrap();
        assert_eq!(parsed.flags.target().unwrap(), ConfigTarget::User);

        let parsed = FlagsOnly::try_parse_from(Vec::<String>::new()).unwrap();
        assert_eq!(parsed.flags.target().unwrap(), ConfigTarget::Project);

        let parsed = FlagsOnly::try_parse_from(["-g", "-p"]).unwrap();
        assert!(parsed.flags.target().is_err());
    }
}
