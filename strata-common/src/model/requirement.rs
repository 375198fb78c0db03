// strata-common/src/model/requirement.rs
use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::model::version::VersionConstraint;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RequirementTag: u8 {
        /// Native/system-level requirement (rarely changes, first layer).
        const SYSTEM   = 0b00000001;
        /// Project-local editable install (changes every commit, last layer).
        const EDITABLE = 0b00000010;
    }
}

impl Default for RequirementTag {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for RequirementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Where a requirement is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOrigin {
    /// Resolved through a package index.
    Registry,
    /// A directory on disk, installed in place.
    LocalPath { path: PathBuf },
    /// A git checkout materialized before installation.
    Vcs { url: String, rev: Option<String> },
}

/// Cache-stability classes, ordered least-frequently-changing first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum StabilityClass {
    System,
    Ecosystem,
    Project,
}

impl StabilityClass {
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Ecosystem => "ecosystem",
            Self::Project => "project",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequirement {
    pub name: String,
    pub constraint: VersionConstraint,
    pub origin: SourceOrigin,
    #[serde(default)]
    pub tags: RequirementTag,
    /// Names of packages that must be installed in an earlier step.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl PackageRequirement {
    pub fn registry(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            origin: SourceOrigin::Registry,
            tags: RequirementTag::empty(),
            requires: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: RequirementTag) -> Self {
        self.tags = tags;
        self
    }

    /// The layer the requirement belongs to, derived from origin and tags.
    pub fn stability_class(&self) -> StabilityClass {
        if self.tags.contains(RequirementTag::SYSTEM) {
            return StabilityClass::System;
        }
        match self.origin {
            SourceOrigin::Registry => StabilityClass::Ecosystem,
            SourceOrigin::LocalPath { .. } | SourceOrigin::Vcs { .. } => StabilityClass::Project,
        }
    }
}

/// Loads a line-oriented requirement file.
///
/// Grammar: `name[<op>version[,<op>version]]` registry entries, `-e <path>`
/// editable local entries, bare `./path` local entries and
/// `git+<url>[@rev]#egg=<name>` VCS entries. `#` comment lines and blank
/// lines are ignored; anything else fails the load.
pub fn load_requirements_file(path: &Path, tags: RequirementTag) -> Result<Vec<PackageRequirement>> {
    let text = std::fs::read_to_string(path)?;
    let file_display = path.display().to_string();
    let mut requirements = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut requirement = parse_requirement_line(line, tags).map_err(|reason| {
            StrataError::MalformedConstraint {
                file: file_display.clone(),
                line: idx + 1,
                text: line.to_string(),
                reason,
            }
        })?;
        // Local entries are written relative to the requirement file.
        if let SourceOrigin::LocalPath { path: local } = &mut requirement.origin {
            if local.is_relative() {
                if let Some(parent) = path.parent() {
                    let joined = parent.join(local.as_path());
                    *local = joined;
                }
            }
        }
        requirements.push(requirement);
    }
    Ok(requirements)
}

pub fn parse_requirement_line(
    line: &str,
    tags: RequirementTag,
) -> std::result::Result<PackageRequirement, String> {
    if let Some(rest) = line.strip_prefix("-e ") {
        let local = parse_local_entry(rest.trim())?;
        return Ok(PackageRequirement {
            tags: tags | RequirementTag::EDITABLE,
            ..local
        });
    }
    if line.starts_with("git+") {
        return parse_vcs_entry(line, tags);
    }
    if line.starts_with("./") || line.starts_with("../") || line.starts_with('/') {
        let mut local = parse_local_entry(line)?;
        local.tags = tags;
        return Ok(local);
    }
    parse_registry_entry(line, tags)
}

fn parse_registry_entry(
    line: &str,
    tags: RequirementTag,
) -> std::result::Result<PackageRequirement, String> {
    let split_at = line
        .find(|c| c == '=' || c == '<' || c == '>')
        .unwrap_or(line.len());
    let (name, spec) = line.split_at(split_at);
    let name = name.trim();
    if !is_valid_name(name) {
        return Err(format!("invalid package name '{name}'"));
    }
    let constraint = VersionConstraint::parse(spec)?;
    Ok(PackageRequirement::registry(name, constraint).with_tags(tags))
}

fn parse_local_entry(path_text: &str) -> std::result::Result<PackageRequirement, String> {
    if path_text.is_empty() {
        return Err("empty local path".to_string());
    }
    let path = PathBuf::from(path_text);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("cannot derive a package name from path '{path_text}'"))?
        .to_string();
    Ok(PackageRequirement {
        name,
        constraint: VersionConstraint::Unpinned,
        origin: SourceOrigin::LocalPath { path },
        tags: RequirementTag::empty(),
        requires: Vec::new(),
    })
}

fn parse_vcs_entry(
    line: &str,
    tags: RequirementTag,
) -> std::result::Result<PackageRequirement, String> {
    let body = line.strip_prefix("git+").unwrap_or(line);
    let (body, fragment) = match body.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (body, None),
    };
    // A rev marker is an '@' after the final path segment separator, so
    // ssh-style user@host URLs are left intact.
    let (url, rev) = match body.rfind('@') {
        Some(at) if at > body.rfind('/').unwrap_or(0) => (
            body[..at].to_string(),
            Some(body[at + 1..].trim().to_string()).filter(|r| !r.is_empty()),
        ),
        _ => (body.to_string(), None),
    };
    if url.is_empty() || !url.contains("://") {
        return Err(format!("unparseable VCS url '{body}'"));
    }
    let name = match fragment {
        Some(f) => f
            .strip_prefix("egg=")
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("unrecognized VCS fragment '#{f}'"))?,
        None => url
            .rsplit('/')
            .next()
            .map(|s| s.trim_end_matches(".git").to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("cannot derive a package name from url '{url}'"))?,
    };
    Ok(PackageRequirement {
        name,
        constraint: VersionConstraint::Unpinned,
        origin: SourceOrigin::Vcs { url, rev },
        tags,
        requires: Vec::new(),
    })
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_line_with_pin() {
        let req = parse_requirement_line("numpy==1.26.4", RequirementTag::empty()).unwrap();
        assert_eq!(req.name, "numpy");
        assert!(req.constraint.is_pinned());
        assert_eq!(req.origin, SourceOrigin::Registry);
        assert_eq!(req.stability_class(), StabilityClass::Ecosystem);
    }

    #[test]
    fn registry_line_with_range() {
        let req = parse_requirement_line("xarray>=2023.1,<2024.0", RequirementTag::empty()).unwrap();
        assert_eq!(req.name, "xarray");
        assert!(!req.constraint.is_pinned());
    }

    #[test]
    fn bare_name_is_unpinned() {
        let req = parse_requirement_line("zarr", RequirementTag::empty()).unwrap();
        assert_eq!(req.constraint, VersionConstraint::Unpinned);
    }

    #[test]
    fn system_tag_wins_classification() {
        let req = parse_requirement_line("libnetcdf-dev==4.9.0", RequirementTag::SYSTEM).unwrap();
        assert_eq!(req.stability_class(), StabilityClass::System);
    }

    #[test]
    fn editable_entry() {
        let req = parse_requirement_line("-e ./pace-util", RequirementTag::empty()).unwrap();
        assert_eq!(req.name, "pace-util");
        assert!(req.tags.contains(RequirementTag::EDITABLE));
        assert_eq!(
            req.origin,
            SourceOrigin::LocalPath {
                path: PathBuf::from("./pace-util")
            }
        );
        assert_eq!(req.stability_class(), StabilityClass::Project);
    }

    #[test]
    fn vcs_entry_with_rev_and_egg() {
        let req = parse_requirement_line(
            "git+https://github.com/GridTools/gt4py.git@v1.0#egg=gt4py",
            RequirementTag::empty(),
        )
        .unwrap();
        assert_eq!(req.name, "gt4py");
        assert_eq!(
            req.origin,
            SourceOrigin::Vcs {
                url: "https://github.com/GridTools/gt4py.git".to_string(),
                rev: Some("v1.0".to_string()),
            }
        );
        assert_eq!(req.stability_class(), StabilityClass::Project);
    }

    #[test]
    fn vcs_entry_derives_name_from_url() {
        let req = parse_requirement_line(
            "git+https://github.com/ai2cm/fv3config.git",
            RequirementTag::empty(),
        )
        .unwrap();
        assert_eq!(req.name, "fv3config");
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse_requirement_line("num py==1.0", RequirementTag::empty()).is_err());
        assert!(parse_requirement_line("numpy~=1.0", RequirementTag::empty()).is_err());
        assert!(parse_requirement_line("git+not-a-url", RequirementTag::empty()).is_err());
    }
}
