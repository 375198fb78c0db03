// strata/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use strata_common::config::Config;
use strata_common::error::Result;

// Module declarations
pub mod build;
pub mod check;
pub mod list;
pub mod plan;
pub mod status;

use crate::cli::build::BuildArgs;
use crate::cli::check::CheckArgs;
use crate::cli::list::ListArgs;
use crate::cli::plan::PlanArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "strata", bin_name = "strata")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Recipe file to operate on (defaults to ./strata.json or $STRATA_RECIPE).
    #[arg(long, global = true, value_name = "PATH")]
    pub recipe: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one or more variants from the recipe.
    Build(BuildArgs),
    /// Show the install plan per variant without executing anything.
    Plan(PlanArgs),
    /// List the variants declared in the recipe.
    List(ListArgs),
    /// Validate the recipe, its constraint and requirement files, and
    /// probe the installer commands.
    Check(CheckArgs),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Build(command) => command.run(config).await,
            Self::Plan(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Check(command) => command.run(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;

    #[test]
    fn build_accepts_repeated_variants() {
        let args = CliArgs::try_parse_from([
            "strata", "build", "--variant", "stable", "--variant", "legacy",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Build(_)));
    }

    #[test]
    fn build_all_conflicts_with_explicit_variants() {
        assert!(CliArgs::try_parse_from([
            "strata", "build", "--variant", "stable", "--all",
        ])
        .is_err());
    }

    #[test]
    fn recipe_flag_is_global() {
        let args =
            CliArgs::try_parse_from(["strata", "list", "--recipe", "ops/strata.json"]).unwrap();
        assert_eq!(args.recipe.as_deref(), Some(Path::new("ops/strata.json")));
    }
}
