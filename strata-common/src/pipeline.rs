// strata-common/src/pipeline.rs
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StrataError;

/// Progress events broadcast from the orchestrator and builders to the
/// status renderer. Errors travel as strings; the typed error stays in the
/// per-variant result map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildEvent {
    OrchestrationStarted {
        total_variants: usize,
    },
    CrossCheckStarted {
        packages: Vec<String>,
    },
    CrossCheckPassed,
    VariantStarted {
        variant_id: String,
    },
    ResolutionStarted {
        variant_id: String,
    },
    ResolutionFinished {
        variant_id: String,
        package_count: usize,
    },
    PlanningFinished {
        variant_id: String,
        step_count: usize,
    },
    VariantUpToDate {
        variant_id: String,
    },
    CheckoutStarted {
        variant_id: String,
        package: String,
        url: String,
    },
    StepStarted {
        variant_id: String,
        index: usize,
        total: usize,
        label: String,
        package_count: usize,
    },
    StepFinished {
        variant_id: String,
        index: usize,
        label: String,
    },
    VariantSucceeded {
        variant_id: String,
        artifact_path: PathBuf,
    },
    VariantFailed {
        variant_id: String,
        error: String,
    },
    LogInfo {
        message: String,
    },
    LogWarn {
        message: String,
    },
    LogError {
        message: String,
    },
    OrchestrationFinished {
        duration_secs: f64,
        success_count: usize,
        fail_count: usize,
    },
}

impl BuildEvent {
    pub fn variant_failed(variant_id: String, error: &StrataError) -> Self {
        BuildEvent::VariantFailed {
            variant_id,
            error: error.to_string(),
        }
    }
}

/// One variant's outcome in the build report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OutcomeSummary {
    Succeeded {
        artifact: PathBuf,
        freshly_built: bool,
    },
    Failed {
        error: String,
    },
}

/// Written under the state directory after every orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub duration_secs: f64,
    pub outcomes: BTreeMap<String, OutcomeSummary>,
}

impl BuildReport {
    pub fn success_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, OutcomeSummary::Succeeded { .. }))
            .count()
    }

    pub fn fail_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.fail_count() == 0
    }
}
