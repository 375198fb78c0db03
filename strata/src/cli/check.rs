//! Contains the logic for the `check` command: validate the recipe and its
//! referenced files without executing anything, then probe the installer
//! commands.
use std::collections::BTreeSet;

use clap::Args;
use colored::Colorize;
use strata_common::config::Config;
use strata_common::error::{Result, StrataError};
use strata_common::model::variant::BuildVariant;
use strata_common::recipe::Recipe;
use strata_common::resolve::{self, LayerPlanner};

#[derive(Debug, Args)]
pub struct CheckArgs;

impl CheckArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = match Recipe::load(&config.recipe_path) {
            Ok(recipe) => {
                println!("{} recipe {}", "✓".green().bold(), config.recipe_path.display());
                recipe
            }
            Err(e) => {
                println!("{} recipe {}: {e}", "✗".red().bold(), config.recipe_path.display());
                return Err(e);
            }
        };

        let mut failures = 0usize;
        let mut installers: BTreeSet<String> = BTreeSet::new();

        for variant in &recipe.variants {
            let outcome = check_variant(variant);
            match outcome {
                Ok(package_count) => {
                    println!(
                        "{} variant {} resolves and plans ({} package(s))",
                        "✓".green().bold(),
                        variant.id.cyan(),
                        package_count
                    );
                }
                Err(e) => {
                    failures += 1;
                    println!("{} variant {}: {e}", "✗".red().bold(), variant.id.cyan());
                }
            }
            if let Some(cmd) = variant.system_installer.first() {
                installers.insert(cmd.clone());
            }
            if let Some(cmd) = variant.package_installer.first() {
                installers.insert(cmd.clone());
            }
        }

        // Installer availability is advisory: the build may run somewhere
        // else (a container) where the tool exists.
        for command in installers {
            let probe = strata_aio::process::run_command_async(
                command.clone(),
                vec!["--version".to_string()],
                None,
                None,
            )
            .await;
            match probe {
                Ok(output) if output.status.success() => {
                    println!("{} installer '{}' available", "✓".green().bold(), command);
                }
                Ok(output) => {
                    println!(
                        "{} installer '{}' exited with {}",
                        "!".yellow().bold(),
                        command,
                        output.status
                    );
                }
                Err(_) => {
                    println!(
                        "{} installer '{}' not found on this host",
                        "!".yellow().bold(),
                        command
                    );
                }
            }
        }

        if failures > 0 {
            return Err(StrataError::Generic(format!(
                "check failed for {failures} variant(s)"
            )));
        }
        println!("{}", "Recipe check passed.".bold());
        Ok(())
    }
}

fn check_variant(variant: &BuildVariant) -> Result<usize> {
    let resolved = resolve::resolve_variant(variant)?;
    LayerPlanner::new().plan(&resolved)?;
    Ok(resolved.len())
}
