// strata-common/src/model/variant.rs
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::requirement::{
    load_requirements_file, PackageRequirement, RequirementTag,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Native packages installed through the system package tool.
    System,
    /// Language-ecosystem packages installed through the package tool.
    Package,
}

/// One requirement file within a variant, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementGroup {
    pub kind: GroupKind,
    pub file: PathBuf,
}

/// One independently buildable environment configuration.
///
/// A variant owns everything a build needs: its constraint file, its
/// requirement groups, the installer command templates and the environment
/// exports stamped onto the produced artifact. Failure of one variant never
/// touches another's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildVariant {
    pub id: String,
    /// Base tag the environment is provisioned on top of (e.g. an
    /// interpreter or base-image version). Opaque to the core.
    pub base: String,
    #[serde(default)]
    pub constraints: Option<PathBuf>,
    #[serde(default)]
    pub groups: Vec<RequirementGroup>,
    /// Environment variables exported into installer processes and recorded
    /// on the artifact. Never applied to the builder's own process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Declared install-order prerequisites: package -> packages that must
    /// land in an earlier step.
    #[serde(default)]
    pub prerequisites: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_system_installer")]
    pub system_installer: Vec<String>,
    #[serde(default = "default_package_installer")]
    pub package_installer: Vec<String>,
}

fn default_system_installer() -> Vec<String> {
    vec![
        "apt-get".to_string(),
        "install".to_string(),
        "-y".to_string(),
    ]
}

fn default_package_installer() -> Vec<String> {
    vec![
        "python3".to_string(),
        "-m".to_string(),
        "pip".to_string(),
        "install".to_string(),
    ]
}

impl BuildVariant {
    /// Parses every requirement group in declaration order and attaches the
    /// declared prerequisites. The result is the resolver's input.
    pub fn load_requirements(&self) -> Result<Vec<PackageRequirement>> {
        let mut requirements = Vec::new();
        for group in &self.groups {
            let tags = match group.kind {
                GroupKind::System => RequirementTag::SYSTEM,
                GroupKind::Package => RequirementTag::empty(),
            };
            for mut requirement in load_requirements_file(&group.file, tags)? {
                if let Some(requires) = self.prerequisites.get(&requirement.name) {
                    requirement.requires = requires.clone();
                }
                requirements.push(requirement);
            }
        }
        Ok(requirements)
    }
}
