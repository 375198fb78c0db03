// strata-common/src/constraint.rs
use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, StrataError};
use crate::model::version::VersionConstraint;

/// An immutable set of pinned version constraints, loaded once per variant.
///
/// Constraints only ever narrow ambiguous requirements during resolution;
/// they never introduce packages of their own.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    pins: BTreeMap<String, VersionConstraint>,
}

impl ConstraintSet {
    /// Parses a line-oriented constraints file: one `name<op>version` (or
    /// `name>=a,<b` range) per line, `#` comments and blank lines ignored.
    /// Any other line fails the load.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading constraint set from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let set = Self::parse(&text, &path.display().to_string())?;
        debug!(
            "Loaded {} pinned constraint(s) from {}",
            set.len(),
            path.display()
        );
        Ok(set)
    }

    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut pins = BTreeMap::new();
        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: String| StrataError::MalformedConstraint {
                file: source.to_string(),
                line: idx + 1,
                text: line.to_string(),
                reason,
            };

            let split_at = line
                .find(|c| c == '=' || c == '<' || c == '>')
                .ok_or_else(|| malformed("missing version operator".to_string()))?;
            let (name, spec) = line.split_at(split_at);
            let name = name.trim();
            if name.is_empty() {
                return Err(malformed("missing package name".to_string()));
            }
            let constraint = VersionConstraint::parse(spec).map_err(&malformed)?;
            if pins.insert(name.to_string(), constraint).is_some() {
                return Err(malformed(format!("duplicate constraint for '{name}'")));
            }
        }
        Ok(Self { pins })
    }

    pub fn lookup(&self, name: &str) -> Option<&VersionConstraint> {
        self.pins.get(name)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VersionConstraint)> {
        self.pins.iter()
    }
}
