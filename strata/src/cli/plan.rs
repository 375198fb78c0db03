// strata/src/cli/plan.rs
use clap::Args;
use colored::Colorize;
use strata_common::config::Config;
use strata_common::error::{Result, StrataError};
use strata_common::model::variant::BuildVariant;
use strata_common::model::version::VersionConstraint;
use strata_common::recipe::Recipe;
use strata_common::resolve::{self, InstallPlan, ResolvedRequirement};

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Variant id to plan; repeat for several. Defaults to all variants.
    #[arg(long = "variant", value_name = "ID")]
    variants: Vec<String>,
}

impl PlanArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = Recipe::load(&config.recipe_path)?;
        let selected = recipe.select(&self.variants)?;

        let mut failures = 0usize;
        for variant in selected {
            match resolve::plan_variant(variant) {
                Ok(plan) => print_plan(variant, &plan),
                Err(e) => {
                    failures += 1;
                    println!("{} {}: {}", "✗".red().bold(), variant.id.cyan(), e);
                }
            }
        }

        if failures > 0 {
            return Err(StrataError::Generic(format!(
                "planning failed for {failures} variant(s)"
            )));
        }
        Ok(())
    }
}

fn print_plan(variant: &BuildVariant, plan: &InstallPlan) {
    println!(
        "{} {} ({} on {}, {} step(s), {} package(s))",
        "==>".bold().blue(),
        variant.id.cyan().bold(),
        "base".dimmed(),
        variant.base,
        plan.len(),
        plan.package_count()
    );
    for (index, step) in plan.steps.iter().enumerate() {
        let specs: Vec<String> = step.requirements.iter().map(render_spec).collect();
        println!(
            "  {:>2}. {:<10} {}",
            index + 1,
            step.label().magenta(),
            specs.join(" ")
        );
    }
}

fn render_spec(requirement: &ResolvedRequirement) -> String {
    let name = &requirement.requirement.name;
    let rendered = match &requirement.constraint {
        VersionConstraint::Unpinned => name.clone(),
        constraint => format!("{name}{constraint}"),
    };
    if requirement.pinned_by_constraint {
        rendered.green().to_string()
    } else {
        rendered
    }
}
