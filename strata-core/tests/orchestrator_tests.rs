//! End-to-end engine tests: variants build against stub installers in a
//! temporary root.

use std::collections::BTreeMap;
use std::path::Path;

use strata_common::config::Config;
use strata_common::error::StrataError;
use strata_common::model::artifact::RECEIPT_FILENAME;
use strata_common::model::variant::{BuildVariant, GroupKind, RequirementGroup};
use strata_core::orchestrator::Orchestrator;
use tokio::sync::broadcast;

fn test_config(root: &Path) -> Config {
    Config {
        strata_root: root.to_path_buf(),
        recipe_path: root.join("strata.json"),
    }
}

fn succeeding_installer() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        "exit 0".to_string(),
        "installer".to_string(),
    ]
}

fn failing_installer() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo install blew up >&2; exit 1".to_string(),
        "installer".to_string(),
    ]
}

fn variant_with_requirements(
    root: &Path,
    id: &str,
    requirement_lines: &str,
    installer: Vec<String>,
) -> BuildVariant {
    let req_file = root.join(format!("{id}-requirements.txt"));
    std::fs::write(&req_file, requirement_lines).unwrap();
    BuildVariant {
        id: id.to_string(),
        base: "3.8.13".to_string(),
        constraints: None,
        groups: vec![RequirementGroup {
            kind: GroupKind::Package,
            file: req_file,
        }],
        env: BTreeMap::new(),
        prerequisites: BTreeMap::new(),
        system_installer: installer.clone(),
        package_installer: installer,
    }
}

#[test]
fn failing_variant_does_not_affect_succeeding_one() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (event_tx, _event_rx) = broadcast::channel(128);

    let stable = variant_with_requirements(
        dir.path(),
        "stable",
        "numpy==1.21.4\n",
        succeeding_installer(),
    );
    let legacy = variant_with_requirements(
        dir.path(),
        "legacy",
        "numpy==1.16.6\n",
        failing_installer(),
    );

    let results = Orchestrator::new(config.clone(), event_tx, false)
        .build_all(&[], &[legacy, stable]);

    assert_eq!(results.len(), 2);
    assert!(results["stable"].is_ok());
    assert!(matches!(
        results["legacy"],
        Err(StrataError::StepFailed { .. })
    ));

    // The healthy variant published, the failed one never did.
    assert!(config
        .variant_artifact_path("stable")
        .join(RECEIPT_FILENAME)
        .is_file());
    assert!(!config.variant_artifact_path("legacy").exists());
}

#[test]
fn no_partial_artifact_when_a_later_step_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (event_tx, _event_rx) = broadcast::channel(128);

    // System step succeeds, the ecosystem step after it fails.
    let sys_file = dir.path().join("system.txt");
    std::fs::write(&sys_file, "libmpich-dev\n").unwrap();
    let pkg_file = dir.path().join("packages.txt");
    std::fs::write(&pkg_file, "mpi4py==3.1.4\n").unwrap();
    let variant = BuildVariant {
        id: "mixed".to_string(),
        base: "3.8.13".to_string(),
        constraints: None,
        groups: vec![
            RequirementGroup {
                kind: GroupKind::System,
                file: sys_file,
            },
            RequirementGroup {
                kind: GroupKind::Package,
                file: pkg_file,
            },
        ],
        env: BTreeMap::new(),
        prerequisites: BTreeMap::new(),
        system_installer: succeeding_installer(),
        package_installer: failing_installer(),
    };

    let results =
        Orchestrator::new(config.clone(), event_tx, false).build_all(&[], &[variant]);

    match &results["mixed"] {
        Err(StrataError::StepFailed { index, .. }) => assert_eq!(*index, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!config.variant_artifact_path("mixed").exists());
}

#[test]
fn unchanged_variant_is_up_to_date_on_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (event_tx, _event_rx) = broadcast::channel(128);

    let variant = variant_with_requirements(
        dir.path(),
        "stable",
        "numpy==1.21.4\nzarr==2.10.3\n",
        succeeding_installer(),
    );

    let orchestrator = Orchestrator::new(config.clone(), event_tx, false);
    let first = orchestrator.build_all(&[], std::slice::from_ref(&variant));
    let first_artifact = first["stable"].as_ref().unwrap();
    assert!(first_artifact.freshly_built);

    let second = orchestrator.build_all(&[], std::slice::from_ref(&variant));
    let second_artifact = second["stable"].as_ref().unwrap();
    assert!(!second_artifact.freshly_built);

    // Step-for-step identical plan across runs.
    assert_eq!(first_artifact.receipt.plan, second_artifact.receipt.plan);
}

#[test]
fn force_rebuilds_an_up_to_date_variant() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (event_tx, _event_rx) = broadcast::channel(128);

    let variant = variant_with_requirements(
        dir.path(),
        "stable",
        "numpy==1.21.4\n",
        succeeding_installer(),
    );

    Orchestrator::new(config.clone(), event_tx.clone(), false)
        .build_all(&[], std::slice::from_ref(&variant));
    let results = Orchestrator::new(config, event_tx, true)
        .build_all(&[], std::slice::from_ref(&variant));
    assert!(results["stable"].as_ref().unwrap().freshly_built);
}

#[test]
fn cross_check_disagreement_fails_all_variants_before_any_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (event_tx, _event_rx) = broadcast::channel(128);

    let stable = variant_with_requirements(
        dir.path(),
        "stable",
        "esmf==8.4.2\n",
        succeeding_installer(),
    );
    let legacy = variant_with_requirements(
        dir.path(),
        "legacy",
        "esmf==8.0.0\n",
        succeeding_installer(),
    );

    let results = Orchestrator::new(config.clone(), event_tx, false)
        .build_all(&["esmf".to_string()], &[stable, legacy]);

    for id in ["stable", "legacy"] {
        match &results[id] {
            Err(StrataError::Conflict { package, .. }) => assert_eq!(package, "esmf"),
            other => panic!("unexpected outcome for {id}: {other:?}"),
        }
        assert!(!config.variant_artifact_path(id).exists());
    }
}

#[test]
fn cross_check_agreement_builds_normally() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (event_tx, _event_rx) = broadcast::channel(128);

    let stable = variant_with_requirements(
        dir.path(),
        "stable",
        "esmf==8.4.2\nnumpy==1.21.4\n",
        succeeding_installer(),
    );
    let legacy = variant_with_requirements(
        dir.path(),
        "legacy",
        "esmf==8.4.2\nnumpy==1.16.6\n",
        succeeding_installer(),
    );

    let results = Orchestrator::new(config, event_tx, false)
        .build_all(&["esmf".to_string()], &[stable, legacy]);
    assert!(results.values().all(|r| r.is_ok()));
}
