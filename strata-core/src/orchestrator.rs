// strata-core/src/orchestrator.rs
use std::collections::BTreeMap;
use std::time::Instant;

use crossbeam_channel::unbounded as crossbeam_unbounded;
use strata_common::config::Config;
use strata_common::error::{Result, StrataError};
use strata_common::model::artifact::Artifact;
use strata_common::model::variant::BuildVariant;
use strata_common::pipeline::BuildEvent;
use strata_common::resolve::{self, ResolvedSet};
use threadpool::ThreadPool;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::builder::VariantBuilder;

/// Builds a set of variants independently on a worker pool. Variants share
/// nothing mutable (each worker gets its own clones), so one failure can
/// never corrupt another variant's artifact.
pub struct Orchestrator {
    config: Config,
    event_tx: broadcast::Sender<BuildEvent>,
    force: bool,
}

impl Orchestrator {
    pub fn new(config: Config, event_tx: broadcast::Sender<BuildEvent>, force: bool) -> Self {
        Self {
            config,
            event_tx,
            force,
        }
    }

    /// Builds every requested variant and aggregates per-variant outcomes.
    /// `cross_check` names packages whose resolved exact pins must agree
    /// across all requested variants before any step runs.
    #[instrument(skip_all, fields(variants = variants.len()))]
    pub fn build_all(
        &self,
        cross_check: &[String],
        variants: &[BuildVariant],
    ) -> BTreeMap<String, Result<Artifact>> {
        let start_time = Instant::now();
        let _ = self.event_tx.send(BuildEvent::OrchestrationStarted {
            total_variants: variants.len(),
        });

        if let Err(conflict) = self.check_shared_pins(cross_check, variants) {
            // A cross-variant disagreement fails every requested variant
            // before a single step executes.
            let mut results = BTreeMap::new();
            for variant in variants {
                let _ = self
                    .event_tx
                    .send(BuildEvent::variant_failed(variant.id.clone(), &conflict));
                results.insert(variant.id.clone(), Err(conflict.clone()));
            }
            self.finish(start_time, &results);
            return results;
        }

        let num_workers = std::cmp::max(1, num_cpus::get_physical().saturating_sub(1))
            .min(6)
            .min(variants.len().max(1));
        let pool = ThreadPool::new(num_workers);
        debug!("Variant build pool started with {} workers.", num_workers);

        let (result_tx, result_rx) = crossbeam_unbounded::<(String, Result<Artifact>)>();
        for variant in variants {
            let variant = variant.clone();
            let config = self.config.clone();
            let event_tx = self.event_tx.clone();
            let force = self.force;
            let result_tx = result_tx.clone();
            pool.execute(move || {
                let variant_id = variant.id.clone();
                debug!("[{}] Worker starting variant build.", variant_id);
                let result = VariantBuilder::new(&config, event_tx.clone(), force).build(&variant);
                if let Err(e) = &result {
                    let _ = event_tx.send(BuildEvent::variant_failed(variant_id.clone(), e));
                }
                let _ = result_tx.send((variant_id, result));
            });
        }
        drop(result_tx);

        let mut results = BTreeMap::new();
        for (variant_id, result) in result_rx {
            results.insert(variant_id, result);
        }
        pool.join();

        self.finish(start_time, &results);
        results
    }

    fn finish(&self, start_time: Instant, results: &BTreeMap<String, Result<Artifact>>) {
        let success_count = results.values().filter(|r| r.is_ok()).count();
        let fail_count = results.len() - success_count;
        let _ = self.event_tx.send(BuildEvent::OrchestrationFinished {
            duration_secs: start_time.elapsed().as_secs_f64(),
            success_count,
            fail_count,
        });
    }

    /// Pre-build agreement check over the recipe's `cross_check` list.
    /// Variants whose own resolution fails are skipped here; their build
    /// will surface the real error independently.
    fn check_shared_pins(
        &self,
        cross_check: &[String],
        variants: &[BuildVariant],
    ) -> Result<()> {
        if cross_check.is_empty() || variants.len() < 2 {
            return Ok(());
        }
        let _ = self.event_tx.send(BuildEvent::CrossCheckStarted {
            packages: cross_check.to_vec(),
        });

        let mut resolutions: Vec<(&str, ResolvedSet)> = Vec::new();
        for variant in variants {
            match resolve::resolve_variant(variant) {
                Ok(resolved) => resolutions.push((variant.id.as_str(), resolved)),
                Err(e) => {
                    warn!(
                        "Skipping '{}' in cross-check, resolution failed: {}",
                        variant.id, e
                    );
                }
            }
        }

        for package in cross_check {
            let mut seen: Option<(&str, String)> = None;
            for (variant_id, resolved) in &resolutions {
                let Some(entry) = resolved.get(package) else {
                    continue;
                };
                let Some(version) = entry.constraint.exact_version() else {
                    continue;
                };
                match &seen {
                    None => seen = Some((*variant_id, version.to_string())),
                    Some((first_id, first_version)) => {
                        if first_version != &version.to_string() {
                            return Err(StrataError::Conflict {
                                package: package.clone(),
                                first: format!("{first_id}: =={first_version}"),
                                second: format!("{variant_id}: =={version}"),
                            });
                        }
                    }
                }
            }
        }

        let _ = self.event_tx.send(BuildEvent::CrossCheckPassed);
        Ok(())
    }
}
