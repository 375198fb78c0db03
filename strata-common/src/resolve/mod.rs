// strata-common/src/resolve/mod.rs
pub mod planner;
pub mod resolver;

pub use planner::{InstallPlan, InstallStep, LayerPlanner};
pub use resolver::{ResolvedRequirement, ResolvedSet, Resolver};

use crate::constraint::ConstraintSet;
use crate::error::Result;
use crate::model::variant::BuildVariant;

/// Loads a variant's constraint set and requirement groups and resolves
/// them. This is the one resolution entry point every caller shares.
pub fn resolve_variant(variant: &BuildVariant) -> Result<ResolvedSet> {
    let constraints = match &variant.constraints {
        Some(path) => ConstraintSet::load(path)?,
        None => ConstraintSet::default(),
    };
    let requirements = variant.load_requirements()?;
    Resolver::new(&constraints).resolve(requirements)
}

/// Resolution plus layer planning in one call, for callers that only need
/// the final step sequence.
pub fn plan_variant(variant: &BuildVariant) -> Result<InstallPlan> {
    let resolved = resolve_variant(variant)?;
    LayerPlanner::new().plan(&resolved)
}
