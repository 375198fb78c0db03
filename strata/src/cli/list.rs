//! Contains the logic for the `list` command.
use clap::Args;
use colored::Colorize;
use strata_common::config::Config;
use strata_common::error::Result;
use strata_common::recipe::Recipe;

#[derive(Debug, Args)]
pub struct ListArgs;

impl ListArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Recipe::load(&config.recipe_path)?;

        if let Some(name) = &recipe.name {
            println!("{} {}", "Recipe:".bold(), name.cyan());
        }
        println!(
            "{:<16} {:<16} {:>7} {:>5} {}",
            "VARIANT".bold().dimmed(),
            "BASE".bold().dimmed(),
            "GROUPS".bold().dimmed(),
            "ENV".bold().dimmed(),
            "CONSTRAINTS".bold().dimmed()
        );
        for variant in &recipe.variants {
            let constraints = variant
                .constraints
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<16} {:<16} {:>7} {:>5} {}",
                variant.id.cyan(),
                variant.base,
                variant.groups.len(),
                variant.env.len(),
                constraints.dimmed()
            );
        }
        if !recipe.cross_check.is_empty() {
            println!(
                "\n{} {}",
                "Cross-checked pins:".bold(),
                recipe.cross_check.join(", ").cyan()
            );
        }
        Ok(())
    }
}
