// strata/src/cli/build.rs

use clap::Args;
use strata_common::config::Config;
use strata_common::error::{Result, StrataError};
use strata_common::recipe::Recipe;
use tracing::instrument;

use crate::pipeline::runner;

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Variant id to build; repeat for several variants.
    #[arg(long = "variant", value_name = "ID")]
    variants: Vec<String>,

    /// Build every variant declared in the recipe.
    #[arg(long, conflicts_with = "variants")]
    all: bool,

    /// Rebuild even when the published artifact is up to date.
    #[arg(long)]
    force: bool,
}

impl BuildArgs {
    #[instrument(skip(self, config), fields(variants = ?self.variants, all = self.all))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        if self.variants.is_empty() && !self.all {
            return Err(StrataError::Generic(
                "Specify --variant <id> (repeatable) or --all.".to_string(),
            ));
        }

        let recipe = Recipe::load(&config.recipe_path)?;
        let selected: Vec<_> = recipe
            .select(&self.variants)?
            .into_iter()
            .cloned()
            .collect();

        runner::run_pipeline(config, &recipe, selected, self.force).await
    }
}
