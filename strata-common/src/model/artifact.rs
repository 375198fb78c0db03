// strata-common/src/model/artifact.rs
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolve::planner::InstallPlan;

pub const RECEIPT_FILENAME: &str = "strata.receipt.json";

/// Per-step outcome recorded in the receipt after execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub label: String,
    pub package_count: usize,
    pub duration_secs: f64,
}

/// The receipt written into a published artifact. It captures everything
/// the build was derived from, which makes up-to-date detection a pure
/// structural comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReceipt {
    pub variant_id: String,
    pub base: String,
    pub env: BTreeMap<String, String>,
    pub plan: InstallPlan,
    pub steps: Vec<StepRecord>,
}

impl ArtifactReceipt {
    /// True when the receipt was produced from the same inputs: same base,
    /// same env exports, step-for-step identical plan. Step timings are
    /// execution history, not an input, and are ignored.
    pub fn is_current(
        &self,
        base: &str,
        env: &BTreeMap<String, String>,
        plan: &InstallPlan,
    ) -> bool {
        self.base == base && &self.env == env && &self.plan == plan
    }
}

/// A successfully published environment.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub variant_id: String,
    pub path: PathBuf,
    pub receipt: ArtifactReceipt,
    /// False when the variant was already up to date and the existing
    /// artifact was kept.
    pub freshly_built: bool,
}

impl Artifact {
    pub fn receipt_path(&self) -> PathBuf {
        self.path.join(RECEIPT_FILENAME)
    }
}
