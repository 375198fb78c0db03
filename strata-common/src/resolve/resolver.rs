// strata-common/src/resolve/resolver.rs
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::constraint::ConstraintSet;
use crate::error::{Result, StrataError};
use crate::model::requirement::{PackageRequirement, SourceOrigin};
use crate::model::version::VersionConstraint;

use serde::{Deserialize, Serialize};

/// A requirement after constraint narrowing: the effective constraint the
/// installer will be asked to honor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequirement {
    pub requirement: PackageRequirement,
    pub constraint: VersionConstraint,
    /// True when the constraint set narrowed this requirement.
    pub pinned_by_constraint: bool,
}

/// Deterministic resolution output, ordered by package name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSet {
    pub requirements: BTreeMap<String, ResolvedRequirement>,
}

impl ResolvedSet {
    pub fn get(&self, name: &str) -> Option<&ResolvedRequirement> {
        self.requirements.get(name)
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

pub struct Resolver<'a> {
    constraints: &'a ConstraintSet,
}

impl<'a> Resolver<'a> {
    pub fn new(constraints: &'a ConstraintSet) -> Self {
        Self { constraints }
    }

    /// Resolves a flat requirement list against the constraint set.
    ///
    /// Duplicate names are merged by constraint intersection; requirements
    /// without an explicit pin are narrowed by the constraint set; local
    /// sources must exist on disk; declared prerequisites must reference
    /// known names. Identical inputs always produce an identical set.
    pub fn resolve(&self, requirements: Vec<PackageRequirement>) -> Result<ResolvedSet> {
        debug!("Resolving {} requirement(s)", requirements.len());
        let mut merged: BTreeMap<String, PackageRequirement> = BTreeMap::new();

        for requirement in requirements {
            match merged.entry(requirement.name.clone()) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(requirement);
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let existing = slot.get_mut();
                    debug!("Merging duplicate requirement '{}'", requirement.name);
                    if existing.origin != requirement.origin {
                        return Err(StrataError::Dependency(format!(
                            "requirement '{}' declared with conflicting origins",
                            requirement.name
                        )));
                    }
                    let narrowed = existing
                        .constraint
                        .narrow(&requirement.constraint)
                        .ok_or_else(|| StrataError::Conflict {
                            package: requirement.name.clone(),
                            first: existing.constraint.to_string(),
                            second: requirement.constraint.to_string(),
                        })?;
                    existing.constraint = narrowed;
                    existing.tags |= requirement.tags;
                    for name in &requirement.requires {
                        if !existing.requires.contains(name) {
                            existing.requires.push(name.clone());
                        }
                    }
                }
            }
        }

        let mut resolved = ResolvedSet::default();
        for (name, requirement) in merged {
            let (constraint, pinned_by_constraint) = self.narrow(&requirement)?;
            self.validate_source(&requirement)?;
            resolved.requirements.insert(
                name,
                ResolvedRequirement {
                    requirement,
                    constraint,
                    pinned_by_constraint,
                },
            );
        }

        for entry in resolved.requirements.values() {
            for prerequisite in &entry.requirement.requires {
                if !resolved.requirements.contains_key(prerequisite) {
                    return Err(StrataError::Dependency(format!(
                        "'{}' declares unknown prerequisite '{}'",
                        entry.requirement.name, prerequisite
                    )));
                }
            }
        }

        debug!("Resolution finished: {} package(s)", resolved.len());
        Ok(resolved)
    }

    /// Applies the constraint set to one requirement. The constraint set
    /// only narrows; it never widens or introduces.
    fn narrow(
        &self,
        requirement: &PackageRequirement,
    ) -> Result<(VersionConstraint, bool)> {
        if requirement.constraint.is_pinned() {
            // An explicit pin wins over the constraint set; a disagreeing
            // pin is still a conflict worth surfacing.
            if let Some(pin) = self.constraints.lookup(&requirement.name) {
                if requirement.constraint.narrow(pin).is_none() {
                    return Err(StrataError::Conflict {
                        package: requirement.name.clone(),
                        first: requirement.constraint.to_string(),
                        second: pin.to_string(),
                    });
                }
            }
            return Ok((requirement.constraint.clone(), false));
        }
        match self.constraints.lookup(&requirement.name) {
            Some(pin) => {
                let narrowed = requirement.constraint.narrow(pin).ok_or_else(|| {
                    StrataError::Conflict {
                        package: requirement.name.clone(),
                        first: requirement.constraint.to_string(),
                        second: pin.to_string(),
                    }
                })?;
                debug!(
                    "Narrowed '{}' from '{}' to '{}'",
                    requirement.name, requirement.constraint, narrowed
                );
                Ok((narrowed, true))
            }
            None => {
                if matches!(requirement.origin, SourceOrigin::Registry)
                    && requirement.constraint == VersionConstraint::Unpinned
                {
                    warn!(
                        "Requirement '{}' is unpinned and has no constraint entry",
                        requirement.name
                    );
                }
                Ok((requirement.constraint.clone(), false))
            }
        }
    }

    fn validate_source(&self, requirement: &PackageRequirement) -> Result<()> {
        if let SourceOrigin::LocalPath { path } = &requirement.origin {
            if !path.exists() {
                return Err(StrataError::MissingSource { path: path.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::requirement::{parse_requirement_line, RequirementTag};

    fn req(line: &str) -> PackageRequirement {
        parse_requirement_line(line, RequirementTag::empty()).unwrap()
    }

    fn empty() -> ConstraintSet {
        ConstraintSet::default()
    }

    #[test]
    fn conflicting_pins_fail_with_both_constraints() {
        let constraints = empty();
        let err = Resolver::new(&constraints)
            .resolve(vec![req("numpy==1.0"), req("numpy==2.0")])
            .unwrap_err();
        match err {
            StrataError::Conflict {
                package,
                first,
                second,
            } => {
                assert_eq!(package, "numpy");
                assert_eq!(first, "==1.0");
                assert_eq!(second, "==2.0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn constraint_set_narrows_unpinned() {
        let constraints = ConstraintSet::parse("numpy==1.21.4\n", "c.txt").unwrap();
        let resolved = Resolver::new(&constraints)
            .resolve(vec![req("numpy")])
            .unwrap();
        let entry = resolved.get("numpy").unwrap();
        assert!(entry.pinned_by_constraint);
        assert_eq!(entry.constraint.to_string(), "==1.21.4");
    }

    #[test]
    fn constraint_set_never_introduces_packages() {
        let constraints = ConstraintSet::parse("numpy==1.21.4\n", "c.txt").unwrap();
        let resolved = Resolver::new(&constraints)
            .resolve(vec![req("zarr")])
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved.get("numpy").is_none());
    }

    #[test]
    fn pin_outside_required_range_is_conflict() {
        let constraints = ConstraintSet::parse("xarray==0.18.0\n", "c.txt").unwrap();
        let err = Resolver::new(&constraints)
            .resolve(vec![req("xarray>=0.19,<0.21")])
            .unwrap_err();
        assert!(matches!(err, StrataError::Conflict { .. }));
    }

    #[test]
    fn overlapping_duplicates_merge() {
        let constraints = empty();
        let resolved = Resolver::new(&constraints)
            .resolve(vec![req("mpi4py>=3.0"), req("mpi4py<4.0")])
            .unwrap();
        assert_eq!(resolved.get("mpi4py").unwrap().constraint.to_string(), ">=3.0,<4.0");
    }

    #[test]
    fn missing_local_path_fails() {
        let constraints = empty();
        let err = Resolver::new(&constraints)
            .resolve(vec![req("-e ./definitely-not-here-xyz")])
            .unwrap_err();
        assert!(matches!(err, StrataError::MissingSource { .. }));
    }

    #[test]
    fn resolution_is_deterministic() {
        let constraints = ConstraintSet::parse("numpy==1.21.4\nzarr==2.10.3\n", "c.txt").unwrap();
        let input = || vec![req("zarr"), req("numpy"), req("dacite==1.6.0")];
        let a = Resolver::new(&constraints).resolve(input()).unwrap();
        let b = Resolver::new(&constraints).resolve(input()).unwrap();
        assert_eq!(a, b);
        let names: Vec<_> = a.requirements.keys().cloned().collect();
        assert_eq!(names, vec!["dacite", "numpy", "zarr"]);
    }

    #[test]
    fn unknown_prerequisite_fails() {
        let constraints = empty();
        let mut requirement = req("mpi4py==3.1.4");
        requirement.requires = vec!["libmpich-dev".to_string()];
        let err = Resolver::new(&constraints)
            .resolve(vec![requirement])
            .unwrap_err();
        assert!(matches!(err, StrataError::Dependency(_)));
    }
}
