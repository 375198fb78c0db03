// strata-core/src/builder.rs
use strata_common::config::Config;
use strata_common::error::Result;
use strata_common::model::artifact::{Artifact, ArtifactReceipt, RECEIPT_FILENAME};
use strata_common::model::variant::BuildVariant;
use strata_common::pipeline::BuildEvent;
use strata_common::resolve::{self, LayerPlanner};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::executor::StepExecutor;

/// Drives one variant end to end: constraints, resolution, planning, step
/// execution in a staging root, then atomic publication. A failure at any
/// point aborts this variant only; already-executed steps are not rolled
/// back (layer semantics) but nothing is published.
pub struct VariantBuilder<'a> {
    config: &'a Config,
    event_tx: broadcast::Sender<BuildEvent>,
    force: bool,
}

impl<'a> VariantBuilder<'a> {
    pub fn new(config: &'a Config, event_tx: broadcast::Sender<BuildEvent>, force: bool) -> Self {
        Self {
            config,
            event_tx,
            force,
        }
    }

    #[instrument(skip_all, fields(variant = %variant.id))]
    pub fn build(&self, variant: &BuildVariant) -> Result<Artifact> {
        let _ = self.event_tx.send(BuildEvent::VariantStarted {
            variant_id: variant.id.clone(),
        });

        let _ = self.event_tx.send(BuildEvent::ResolutionStarted {
            variant_id: variant.id.clone(),
        });
        let resolved = resolve::resolve_variant(variant)?;
        let _ = self.event_tx.send(BuildEvent::ResolutionFinished {
            variant_id: variant.id.clone(),
            package_count: resolved.len(),
        });

        let plan = LayerPlanner::new().plan(&resolved)?;
        let _ = self.event_tx.send(BuildEvent::PlanningFinished {
            variant_id: variant.id.clone(),
            step_count: plan.len(),
        });

        let published = self.config.variant_artifact_path(&variant.id);
        if !self.force {
            if let Some(receipt) = self.published_receipt(&published) {
                if receipt.is_current(&variant.base, &variant.env, &plan) {
                    debug!("Variant '{}' is up to date, skipping build", variant.id);
                    let _ = self.event_tx.send(BuildEvent::VariantUpToDate {
                        variant_id: variant.id.clone(),
                    });
                    return Ok(Artifact {
                        variant_id: variant.id.clone(),
                        path: published,
                        receipt,
                        freshly_built: false,
                    });
                }
            }
        }

        // Staging is wiped per build; a failed attempt's staging is kept
        // around only until the next one.
        let staging = self.config.variant_staging_path(&variant.id);
        strata_aio::fs::remove_directory_recursive(&staging)?;
        strata_aio::fs::create_dir_all(&staging)?;

        let executor = StepExecutor::new(self.config, variant, self.event_tx.clone());
        let steps = executor.execute(&plan, &staging)?;

        let receipt = ArtifactReceipt {
            variant_id: variant.id.clone(),
            base: variant.base.clone(),
            env: variant.env.clone(),
            plan,
            steps,
        };
        strata_aio::json_io::write_json(&staging.join(RECEIPT_FILENAME), &receipt)?;
        strata_aio::fs::promote_directory(&staging, &published)?;

        let _ = self.event_tx.send(BuildEvent::VariantSucceeded {
            variant_id: variant.id.clone(),
            artifact_path: published.clone(),
        });
        Ok(Artifact {
            variant_id: variant.id.clone(),
            path: published,
            receipt,
            freshly_built: true,
        })
    }

    fn published_receipt(&self, published: &std::path::Path) -> Option<ArtifactReceipt> {
        let receipt_path = published.join(RECEIPT_FILENAME);
        if !receipt_path.is_file() {
            return None;
        }
        match strata_aio::json_io::read_json(&receipt_path) {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                debug!(
                    "Ignoring unreadable receipt {}: {}",
                    receipt_path.display(),
                    e
                );
                None
            }
        }
    }
}
