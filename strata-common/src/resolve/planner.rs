// strata-common/src/resolve/planner.rs
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StrataError};
use crate::model::requirement::StabilityClass;
use crate::resolve::resolver::{ResolvedRequirement, ResolvedSet};

/// One batch of requirements installed together: one cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallStep {
    pub class: StabilityClass,
    pub requirements: Vec<ResolvedRequirement>,
}

impl InstallStep {
    pub fn label(&self) -> String {
        self.class.label().to_string()
    }

    pub fn names(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .map(|r| r.requirement.name.as_str())
            .collect()
    }
}

/// The ordered step sequence for one variant build. Computed fresh per
/// invocation, never persisted (the artifact receipt records the plan that
/// produced it, which is a property of the artifact).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallPlan {
    pub steps: Vec<InstallStep>,
}

impl InstallPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn package_count(&self) -> usize {
        self.steps.iter().map(|s| s.requirements.len()).sum()
    }
}

/// Orders resolved requirements into cache-friendly layers.
///
/// Rarely-changing system requirements come first, constraint-pinned
/// ecosystem requirements next, project-local and VCS requirements last;
/// editing a project requirement must never invalidate the layers below it.
/// Within a class, declared prerequisites split the batch so a dependent
/// always lands in a later step; within a step, names sort
/// lexicographically to keep plans deterministic.
#[derive(Debug, Default)]
pub struct LayerPlanner;

impl LayerPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, resolved: &ResolvedSet) -> Result<InstallPlan> {
        let mut by_class: BTreeMap<StabilityClass, Vec<&ResolvedRequirement>> = BTreeMap::new();
        for entry in resolved.requirements.values() {
            by_class
                .entry(entry.requirement.stability_class())
                .or_default()
                .push(entry);
        }

        self.check_cross_class_edges(resolved)?;

        let mut steps = Vec::new();
        for (class, members) in by_class {
            for level in self.levels_within_class(class, &members)? {
                steps.push(InstallStep {
                    class,
                    requirements: level,
                });
            }
        }

        debug!(
            "Planned {} step(s) over {} package(s)",
            steps.len(),
            resolved.len()
        );
        Ok(InstallPlan { steps })
    }

    /// A prerequisite in a *more* frequently changing class than its
    /// dependent can never be ordered first by layering; reject it.
    fn check_cross_class_edges(&self, resolved: &ResolvedSet) -> Result<()> {
        for entry in resolved.requirements.values() {
            let class = entry.requirement.stability_class();
            for name in &entry.requirement.requires {
                if let Some(prerequisite) = resolved.get(name) {
                    if prerequisite.requirement.stability_class() > class {
                        return Err(StrataError::Dependency(format!(
                            "'{}' ({}) cannot depend on '{}' from the later {} layer",
                            entry.requirement.name,
                            class.label(),
                            name,
                            prerequisite.requirement.stability_class().label(),
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Kahn levels over same-class prerequisite edges. Each level becomes
    /// its own step so a dependent is always in a strictly later step than
    /// its prerequisites.
    fn levels_within_class(
        &self,
        class: StabilityClass,
        members: &[&ResolvedRequirement],
    ) -> Result<Vec<Vec<ResolvedRequirement>>> {
        let names: BTreeSet<&str> = members
            .iter()
            .map(|r| r.requirement.name.as_str())
            .collect();
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let by_name: BTreeMap<&str, &ResolvedRequirement> = members
            .iter()
            .map(|r| (r.requirement.name.as_str(), *r))
            .collect();

        for member in members {
            let name = member.requirement.name.as_str();
            in_degree.entry(name).or_default();
            for prerequisite in &member.requirement.requires {
                if names.contains(prerequisite.as_str()) {
                    *in_degree.entry(name).or_default() += 1;
                    dependents
                        .entry(prerequisite.as_str())
                        .or_default()
                        .push(name);
                }
            }
        }

        let mut levels = Vec::new();
        let mut placed = 0usize;
        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();

        while !ready.is_empty() {
            // BTreeMap iteration already yields names sorted; keep the
            // level itself sorted for the deterministic tie-break.
            ready.sort_unstable();
            let mut next = Vec::new();
            let mut level = Vec::with_capacity(ready.len());
            for name in &ready {
                level.push((*by_name[name]).clone());
                placed += 1;
                for dependent in dependents.get(name).into_iter().flatten() {
                    let degree = in_degree
                        .get_mut(dependent)
                        .expect("dependent registered in in_degree");
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dependent);
                    }
                }
            }
            levels.push(level);
            ready = next;
        }

        if placed != members.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(n, _)| *n)
                .collect();
            return Err(StrataError::Dependency(format!(
                "prerequisite cycle in {} layer involving: {}",
                class.label(),
                stuck.join(", ")
            )));
        }

        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintSet;
    use crate::model::requirement::{parse_requirement_line, RequirementTag};
    use crate::resolve::resolver::Resolver;

    fn resolve(lines: &[(&str, RequirementTag)], constraints: &str) -> ResolvedSet {
        let set = ConstraintSet::parse(constraints, "c.txt").unwrap();
        let reqs = lines
            .iter()
            .map(|(l, t)| parse_requirement_line(l, *t).unwrap())
            .collect();
        Resolver::new(&set).resolve(reqs).unwrap()
    }

    #[test]
    fn classes_order_system_first_project_last() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("model");
        std::fs::create_dir(&local).unwrap();
        let local_line = format!("-e {}", local.display());

        let resolved = resolve(
            &[
                (local_line.as_str(), RequirementTag::empty()),
                ("numpy", RequirementTag::empty()),
                ("libmpich-dev", RequirementTag::SYSTEM),
            ],
            "numpy==1.21.4\n",
        );
        let plan = LayerPlanner::new().plan(&resolved).unwrap();
        let classes: Vec<_> = plan.steps.iter().map(|s| s.class).collect();
        assert_eq!(
            classes,
            vec![
                StabilityClass::System,
                StabilityClass::Ecosystem,
                StabilityClass::Project
            ]
        );
        assert_eq!(plan.steps[0].names(), vec!["libmpich-dev"]);
        assert_eq!(plan.steps[2].names(), vec!["model"]);
    }

    #[test]
    fn lexicographic_tie_break_within_step() {
        let resolved = resolve(
            &[
                ("zarr", RequirementTag::empty()),
                ("dacite", RequirementTag::empty()),
                ("numpy", RequirementTag::empty()),
            ],
            "",
        );
        let plan = LayerPlanner::new().plan(&resolved).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].names(), vec!["dacite", "numpy", "zarr"]);
    }

    #[test]
    fn prerequisites_split_a_class_into_levels() {
        let set = ConstraintSet::default();
        let mut mpi4py = parse_requirement_line("mpi4py==3.1.4", RequirementTag::empty()).unwrap();
        mpi4py.requires = vec!["numpy".to_string()];
        let numpy = parse_requirement_line("numpy==1.21.4", RequirementTag::empty()).unwrap();
        let resolved = Resolver::new(&set).resolve(vec![mpi4py, numpy]).unwrap();

        let plan = LayerPlanner::new().plan(&resolved).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].names(), vec!["numpy"]);
        assert_eq!(plan.steps[1].names(), vec!["mpi4py"]);
    }

    #[test]
    fn prerequisite_cycle_is_rejected() {
        let set = ConstraintSet::default();
        let mut a = parse_requirement_line("aaa==1.0", RequirementTag::empty()).unwrap();
        a.requires = vec!["bbb".to_string()];
        let mut b = parse_requirement_line("bbb==1.0", RequirementTag::empty()).unwrap();
        b.requires = vec!["aaa".to_string()];
        let resolved = Resolver::new(&set).resolve(vec![a, b]).unwrap();

        let err = LayerPlanner::new().plan(&resolved).unwrap_err();
        assert!(matches!(err, StrataError::Dependency(_)));
    }

    #[test]
    fn dependent_in_earlier_class_is_rejected() {
        let set = ConstraintSet::default();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("plugin");
        std::fs::create_dir(&local).unwrap();

        let mut system =
            parse_requirement_line("libfoo-dev==1.0", RequirementTag::SYSTEM).unwrap();
        system.requires = vec!["plugin".to_string()];
        let local_line = format!("-e {}", local.display());
        let plugin = parse_requirement_line(&local_line, RequirementTag::empty()).unwrap();
        let resolved = Resolver::new(&set).resolve(vec![system, plugin]).unwrap();

        let err = LayerPlanner::new().plan(&resolved).unwrap_err();
        assert!(matches!(err, StrataError::Dependency(_)));
    }

    #[test]
    fn plan_is_idempotent() {
        let resolved = resolve(
            &[
                ("numpy", RequirementTag::empty()),
                ("netCDF4", RequirementTag::empty()),
            ],
            "numpy==1.21.4\nnetCDF4==1.5.8\n",
        );
        let a = LayerPlanner::new().plan(&resolved).unwrap();
        let b = LayerPlanner::new().plan(&resolved).unwrap();
        assert_eq!(a, b);
    }
}
