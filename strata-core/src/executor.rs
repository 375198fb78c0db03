// strata-core/src/executor.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use strata_common::config::Config;
use strata_common::error::{Result, StrataError};
use strata_common::model::artifact::StepRecord;
use strata_common::model::requirement::{RequirementTag, SourceOrigin, StabilityClass};
use strata_common::model::version::VersionConstraint;
use strata_common::model::variant::BuildVariant;
use strata_common::pipeline::BuildEvent;
use strata_common::resolve::planner::{InstallPlan, InstallStep};
use strata_common::resolve::resolver::ResolvedRequirement;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

const STDERR_TAIL_LINES: usize = 12;

/// Executes a variant's install plan strictly in order by delegating each
/// step to the variant's installer command. Steps mutate only the staging
/// root handed in; nothing is published here.
pub struct StepExecutor<'a> {
    config: &'a Config,
    variant: &'a BuildVariant,
    event_tx: broadcast::Sender<BuildEvent>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        config: &'a Config,
        variant: &'a BuildVariant,
        event_tx: broadcast::Sender<BuildEvent>,
    ) -> Self {
        Self {
            config,
            variant,
            event_tx,
        }
    }

    #[instrument(skip_all, fields(variant = %self.variant.id))]
    pub fn execute(&self, plan: &InstallPlan, staging_root: &Path) -> Result<Vec<StepRecord>> {
        let total = plan.len();
        let mut records = Vec::with_capacity(total);
        for (index, step) in plan.steps.iter().enumerate() {
            let _ = self.event_tx.send(BuildEvent::StepStarted {
                variant_id: self.variant.id.clone(),
                index,
                total,
                label: step.label(),
                package_count: step.requirements.len(),
            });
            let started = Instant::now();
            self.execute_step(index, step, staging_root)?;
            let duration_secs = started.elapsed().as_secs_f64();
            let _ = self.event_tx.send(BuildEvent::StepFinished {
                variant_id: self.variant.id.clone(),
                index,
                label: step.label(),
            });
            records.push(StepRecord {
                index,
                label: step.label(),
                package_count: step.requirements.len(),
                duration_secs,
            });
        }
        Ok(records)
    }

    /// One step, one installer invocation: the whole batch lands in a
    /// single cache layer or not at all.
    fn execute_step(&self, index: usize, step: &InstallStep, staging_root: &Path) -> Result<()> {
        let mut argv = self.installer_for(step.class).to_vec();
        if argv.is_empty() {
            return Err(StrataError::Config(format!(
                "variant '{}' has no installer configured for the {} layer",
                self.variant.id,
                step.class.label()
            )));
        }
        for requirement in &step.requirements {
            argv.extend(self.install_args(requirement)?);
        }

        let command = argv.remove(0);
        debug!(
            "Step {} ({}): {} {:?}",
            index,
            step.label(),
            command,
            argv
        );
        let output = strata_aio::process::run_command(
            command,
            argv,
            None,
            Some(self.step_env(staging_root)),
        )
        .map_err(|e| StrataError::StepFailed {
            index,
            label: step.label(),
            cause: e.to_string(),
        })?;

        if !output.status.success() {
            let tail = strata_aio::process::stderr_tail(&output, STDERR_TAIL_LINES);
            return Err(StrataError::StepFailed {
                index,
                label: step.label(),
                cause: if tail.is_empty() {
                    format!("installer exited with {}", output.status)
                } else {
                    format!("installer exited with {}: {tail}", output.status)
                },
            });
        }
        Ok(())
    }

    fn installer_for(&self, class: StabilityClass) -> &[String] {
        match class {
            StabilityClass::System => &self.variant.system_installer,
            StabilityClass::Ecosystem | StabilityClass::Project => {
                &self.variant.package_installer
            }
        }
    }

    /// Renders one requirement into installer arguments. VCS requirements
    /// are materialized into the variant's checkout area first so the
    /// installer only ever sees local paths and registry specs.
    fn install_args(&self, resolved: &ResolvedRequirement) -> Result<Vec<String>> {
        let requirement = &resolved.requirement;
        match &requirement.origin {
            SourceOrigin::Registry => {
                let spec = match &resolved.constraint {
                    VersionConstraint::Unpinned => requirement.name.clone(),
                    constraint => format!("{}{constraint}", requirement.name),
                };
                Ok(vec![spec])
            }
            SourceOrigin::LocalPath { path } => {
                let rendered = path.display().to_string();
                if requirement.tags.contains(RequirementTag::EDITABLE) {
                    Ok(vec!["-e".to_string(), rendered])
                } else {
                    Ok(vec![rendered])
                }
            }
            SourceOrigin::Vcs { url, rev } => {
                let checkout = self.checkout_path(&requirement.name);
                let _ = self.event_tx.send(BuildEvent::CheckoutStarted {
                    variant_id: self.variant.id.clone(),
                    package: requirement.name.clone(),
                    url: url.clone(),
                });
                strata_aio::git::ensure_checkout(url, rev.as_deref(), &checkout)?;
                Ok(vec![checkout.display().to_string()])
            }
        }
    }

    fn checkout_path(&self, package: &str) -> PathBuf {
        self.config
            .variant_checkouts_path(&self.variant.id)
            .join(package)
    }

    /// The child environment: the variant's exports plus the staging
    /// prefix. Exports never leak into the builder's own process.
    fn step_env(&self, staging_root: &Path) -> BTreeMap<String, String> {
        let mut env = self.variant.env.clone();
        env.insert(
            "STRATA_PREFIX".to_string(),
            staging_root.display().to_string(),
        );
        env
    }
}

#[cfg(test)]
mod tests {
    use strata_common::constraint::ConstraintSet;
    use strata_common::model::requirement::{parse_requirement_line, RequirementTag};
    use strata_common::resolve::planner::LayerPlanner;
    use strata_common::resolve::resolver::Resolver;

    use super::*;

    fn test_config(root: &Path) -> Config {
        Config {
            strata_root: root.to_path_buf(),
            recipe_path: root.join("strata.json"),
        }
    }

    fn plan_for(lines: &[&str]) -> InstallPlan {
        let constraints = ConstraintSet::default();
        let reqs = lines
            .iter()
            .map(|l| parse_requirement_line(l, RequirementTag::empty()).unwrap())
            .collect();
        let resolved = Resolver::new(&constraints).resolve(reqs).unwrap();
        LayerPlanner::new().plan(&resolved).unwrap()
    }

    fn recording_variant(id: &str, log: &Path) -> BuildVariant {
        BuildVariant {
            id: id.to_string(),
            base: "3.8".to_string(),
            constraints: None,
            groups: Vec::new(),
            env: std::collections::BTreeMap::new(),
            prerequisites: std::collections::BTreeMap::new(),
            system_installer: installer_logging_to(log),
            package_installer: installer_logging_to(log),
        }
    }

    fn installer_logging_to(log: &Path) -> Vec<String> {
        vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("echo \"$@\" >> {}", log.display()),
            "installer".to_string(),
        ]
    }

    #[test]
    fn step_arguments_reach_the_installer() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("install.log");
        let config = test_config(dir.path());
        let variant = recording_variant("stable", &log);
        let (event_tx, _event_rx) = broadcast::channel(16);

        let plan = plan_for(&["numpy==1.21.4", "dacite"]);
        let executor = StepExecutor::new(&config, &variant, event_tx);
        let records = executor.execute(&plan, dir.path()).unwrap();

        assert_eq!(records.len(), 1);
        let logged = std::fs::read_to_string(&log).unwrap();
        assert_eq!(logged.trim(), "dacite numpy==1.21.4");
    }

    #[test]
    fn env_exports_flow_into_installer_processes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env.out");
        let config = test_config(dir.path());
        let mut variant = recording_variant("stable", &out);
        variant.env.insert("FV3_BUILD".to_string(), "release".to_string());
        variant.package_installer = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("printf '%s %s' \"$FV3_BUILD\" \"$STRATA_PREFIX\" > {}", out.display()),
            "installer".to_string(),
        ];
        let (event_tx, _event_rx) = broadcast::channel(16);

        let plan = plan_for(&["numpy==1.21.4"]);
        StepExecutor::new(&config, &variant, event_tx)
            .execute(&plan, dir.path())
            .unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            content,
            format!("release {}", dir.path().display())
        );
    }

    #[test]
    fn failing_installer_yields_step_failed_with_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut variant = recording_variant("legacy", &dir.path().join("unused.log"));
        variant.package_installer = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo boom >&2; exit 7".to_string(),
            "installer".to_string(),
        ];
        let (event_tx, _event_rx) = broadcast::channel(16);

        let plan = plan_for(&["numpy==1.21.4"]);
        let err = StepExecutor::new(&config, &variant, event_tx)
            .execute(&plan, dir.path())
            .unwrap_err();
        match err {
            StrataError::StepFailed { index, cause, .. } => {
                assert_eq!(index, 0);
                assert!(cause.contains("boom"), "cause was: {cause}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
