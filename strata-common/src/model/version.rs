// strata-common/src/model/version.rs
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// A package version as found in constraint and requirement files.
///
/// Versions that parse as full semver compare through `semver::Version`;
/// everything else ("3.8", "19.10b0") falls back to an ordered segment
/// comparison so the resolver still has a total order to narrow ranges with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    original: String,
    semver: Option<semver::Version>,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Num(u64),
    Alpha(String),
}

impl Version {
    pub fn parse(text: &str) -> Result<Self, StrataError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(StrataError::Version("empty version string".to_string()));
        }
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let segments = split_segments(bare);
        if segments.is_empty() {
            return Err(StrataError::Version(format!(
                "version '{trimmed}' has no comparable segments"
            )));
        }
        Ok(Self {
            original: trimmed.to_string(),
            semver: semver::Version::parse(bare).ok(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut digits = String::new();
    let mut alpha = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            if !alpha.is_empty() {
                segments.push(Segment::Alpha(std::mem::take(&mut alpha)));
            }
            digits.push(ch);
        } else if ch.is_ascii_alphanumeric() {
            if !digits.is_empty() {
                // Numeric overflow falls back to an alpha segment.
                match digits.parse::<u64>() {
                    Ok(n) => segments.push(Segment::Num(n)),
                    Err(_) => segments.push(Segment::Alpha(std::mem::take(&mut digits))),
                }
                digits.clear();
            }
            alpha.push(ch.to_ascii_lowercase());
        } else {
            // Separator: flush whichever run is open.
            if !digits.is_empty() {
                match digits.parse::<u64>() {
                    Ok(n) => segments.push(Segment::Num(n)),
                    Err(_) => segments.push(Segment::Alpha(std::mem::take(&mut digits))),
                }
                digits.clear();
            }
            if !alpha.is_empty() {
                segments.push(Segment::Alpha(std::mem::take(&mut alpha)));
            }
        }
    }
    if !digits.is_empty() {
        match digits.parse::<u64>() {
            Ok(n) => segments.push(Segment::Num(n)),
            Err(_) => segments.push(Segment::Alpha(digits)),
        }
    }
    if !alpha.is_empty() {
        segments.push(Segment::Alpha(alpha));
    }
    segments
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (&self.semver, &other.semver) {
            return a.cmp(b);
        }
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl FromStr for Version {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.original
    }
}

impl TryFrom<String> for Version {
    type Error = StrataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

/// One end of a version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A version constraint as written after a package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum VersionConstraint {
    /// No constraint at all (a bare name, "latest").
    Unpinned,
    /// `==version`
    Exact(Version),
    /// Any combination of `>=`/`>` and `<=`/`<` bounds.
    Range {
        min: Option<Bound>,
        max: Option<Bound>,
    },
}

impl VersionConstraint {
    /// Parses the constraint expression following a package name, e.g.
    /// `==1.2.3` or `>=1.0,<2.0`. An empty expression means unpinned.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Self::Unpinned);
        }
        let mut exact: Option<Version> = None;
        let mut min: Option<Bound> = None;
        let mut max: Option<Bound> = None;
        for clause in expr.split(',') {
            let clause = clause.trim();
            let (op, rest) = split_operator(clause)?;
            let version = Version::parse(rest).map_err(|e| e.to_string())?;
            match op {
                "==" => {
                    if exact.is_some() || min.is_some() || max.is_some() {
                        return Err(format!("'==' cannot be combined in '{expr}'"));
                    }
                    exact = Some(version);
                }
                ">=" | ">" => {
                    if exact.is_some() || min.is_some() {
                        return Err(format!("duplicate lower bound in '{expr}'"));
                    }
                    min = Some(Bound {
                        version,
                        inclusive: op == ">=",
                    });
                }
                "<=" | "<" => {
                    if exact.is_some() || max.is_some() {
                        return Err(format!("duplicate upper bound in '{expr}'"));
                    }
                    max = Some(Bound {
                        version,
                        inclusive: op == "<=",
                    });
                }
                _ => unreachable!("split_operator yields known operators"),
            }
        }
        if let Some(v) = exact {
            return Ok(Self::Exact(v));
        }
        let constraint = Self::Range { min, max };
        if constraint.is_empty_range() {
            return Err(format!("empty version range '{expr}'"));
        }
        Ok(constraint)
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    pub fn exact_version(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            _ => None,
        }
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Unpinned => true,
            Self::Exact(v) => v == version,
            Self::Range { min, max } => {
                if let Some(b) = min {
                    match version.cmp(&b.version) {
                        Ordering::Less => return false,
                        Ordering::Equal if !b.inclusive => return false,
                        _ => {}
                    }
                }
                if let Some(b) = max {
                    match version.cmp(&b.version) {
                        Ordering::Greater => return false,
                        Ordering::Equal if !b.inclusive => return false,
                        _ => {}
                    }
                }
                true
            }
        }
    }

    /// Intersects two constraints. `None` means they do not overlap.
    pub fn narrow(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Unpinned, c) | (c, Self::Unpinned) => Some(c.clone()),
            (Self::Exact(a), Self::Exact(b)) => (a == b).then(|| Self::Exact(a.clone())),
            (Self::Exact(v), range @ Self::Range { .. })
            | (range @ Self::Range { .. }, Self::Exact(v)) => {
                range.satisfies(v).then(|| Self::Exact(v.clone()))
            }
            (
                Self::Range {
                    min: min_a,
                    max: max_a,
                },
                Self::Range {
                    min: min_b,
                    max: max_b,
                },
            ) => {
                let min = tighter_bound(min_a, min_b, true);
                let max = tighter_bound(max_a, max_b, false);
                let merged = Self::Range { min, max };
                (!merged.is_empty_range()).then_some(merged)
            }
        }
    }

    fn is_empty_range(&self) -> bool {
        if let Self::Range {
            min: Some(lo),
            max: Some(hi),
        } = self
        {
            match lo.version.cmp(&hi.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lo.inclusive && hi.inclusive),
                Ordering::Less => false,
            }
        } else {
            false
        }
    }
}

fn split_operator(clause: &str) -> Result<(&str, &str), String> {
    for op in ["==", ">=", "<=", ">", "<"] {
        if let Some(rest) = clause.strip_prefix(op) {
            return Ok((op, rest.trim()));
        }
    }
    Err(format!("missing comparison operator in '{clause}'"))
}

/// Picks the stricter of two optional bounds. For lower bounds the greater
/// version wins, for upper bounds the lesser one.
fn tighter_bound(a: &Option<Bound>, b: &Option<Bound>, lower: bool) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            let pick_x = match x.version.cmp(&y.version) {
                Ordering::Equal => !x.inclusive || y.inclusive,
                Ordering::Greater => lower,
                Ordering::Less => !lower,
            };
            Some(if pick_x { x.clone() } else { y.clone() })
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpinned => f.write_str("*"),
            Self::Exact(v) => write!(f, "=={v}"),
            Self::Range { min, max } => {
                let mut parts = Vec::new();
                if let Some(b) = min {
                    parts.push(format!(
                        "{}{}",
                        if b.inclusive { ">=" } else { ">" },
                        b.version
                    ));
                }
                if let Some(b) = max {
                    parts.push(format!(
                        "{}{}",
                        if b.inclusive { "<=" } else { "<" },
                        b.version
                    ));
                }
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl From<VersionConstraint> for String {
    fn from(c: VersionConstraint) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = StrataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "*" {
            return Ok(Self::Unpinned);
        }
        Self::parse(&s).map_err(|reason| StrataError::Version(reason))
    }
}
