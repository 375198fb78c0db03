// strata/src/pipeline/runner.rs
use std::collections::BTreeMap;
use std::time::Instant;

use strata_common::config::Config;
use strata_common::error::{Result, StrataError};
use strata_common::model::variant::BuildVariant;
use strata_common::pipeline::{BuildReport, OutcomeSummary};
use strata_common::recipe::Recipe;
use strata_core::orchestrator::Orchestrator;
use tokio::sync::broadcast;
use tracing::{error, instrument, warn};

use crate::cli::status;

const EVENT_CHANNEL_SIZE: usize = 100;

pub(crate) fn get_panic_message(e: Box<dyn std::any::Any + Send>) -> String {
    match e.downcast_ref::<&'static str>() {
        Some(s) => (*s).to_string(),
        None => match e.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => "Unknown panic payload".to_string(),
        },
    }
}

/// Runs the orchestrator on its own thread while the status task renders
/// progress, then writes the build report. Any failed variant turns into a
/// non-zero exit for the whole invocation.
#[instrument(skip_all, fields(variants = variants.len(), force = force))]
pub async fn run_pipeline(
    config: &Config,
    recipe: &Recipe,
    variants: Vec<BuildVariant>,
    force: bool,
) -> Result<()> {
    let start_time = Instant::now();
    let (event_tx, _event_rx) = broadcast::channel(EVENT_CHANNEL_SIZE);

    let status_handle = tokio::spawn(status::handle_events(event_tx.subscribe()));

    let core_config = config.clone();
    let core_event_tx = event_tx.clone();
    let cross_check = recipe.cross_check.clone();
    let total = variants.len();
    let core_handle = std::thread::spawn(move || {
        Orchestrator::new(core_config, core_event_tx, force).build_all(&cross_check, &variants)
    });

    let results = match tokio::task::spawn_blocking(move || core_handle.join()).await {
        Ok(Ok(results)) => results,
        Ok(Err(join_err)) => {
            let msg = get_panic_message(join_err);
            error!("RUNNER: Orchestrator thread panicked: {}", msg);
            drop(event_tx);
            let _ = status_handle.await;
            return Err(StrataError::Generic(format!(
                "orchestrator thread panicked: {msg}"
            )));
        }
        Err(join_err) => {
            error!("RUNNER: Orchestrator join task failed: {}", join_err);
            drop(event_tx);
            let _ = status_handle.await;
            return Err(StrataError::Generic(format!(
                "orchestrator join task failed: {join_err}"
            )));
        }
    };

    // The status task exits after OrchestrationFinished; dropping our
    // sender closes the channel either way.
    drop(event_tx);
    if let Err(join_err) = status_handle.await {
        error!("RUNNER: Status task join error: {}", join_err);
    }

    let mut outcomes = BTreeMap::new();
    for (variant_id, result) in &results {
        let summary = match result {
            Ok(artifact) => OutcomeSummary::Succeeded {
                artifact: artifact.path.clone(),
                freshly_built: artifact.freshly_built,
            },
            Err(e) => OutcomeSummary::Failed {
                error: e.to_string(),
            },
        };
        outcomes.insert(variant_id.clone(), summary);
    }
    let report = BuildReport {
        duration_secs: start_time.elapsed().as_secs_f64(),
        outcomes,
    };
    if let Err(e) = strata_aio::json_io::write_json_async(&config.report_path(), &report).await {
        warn!(
            "Failed to write build report {}: {}",
            config.report_path().display(),
            e
        );
    }

    let fail_count = report.fail_count();
    if fail_count > 0 {
        return Err(StrataError::Generic(format!(
            "{fail_count} of {total} variant(s) failed"
        )));
    }
    Ok(())
}
