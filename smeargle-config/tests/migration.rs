//! Upgrading documents written for the per-class layout.

use approx::assert_relative_eq;
use serde_json::json;
use smeargle_config::{
    current_schema, extract_as, load_tree, migrate, schema_for, upgrade, validate, version_path,
    CURRENT_VERSION,
};
use smeargle_core::{KeyPath, Warning};

fn legacy_document() -> serde_json::Value {
    json!({
        "meta": {"config_spec": "smeargle-masking-1"},
        "echo010": {"run": "yes"},
        "echo120": {"run": true, "x_range": [2, 13], "y_range": "4, 9"},
        "echo270": {"run": true, "minimum_value": 0.5},
        "echo275": {"run": "off", "top_count": 3},
        "echo276": {"run": true, "kept_range": [0.1, 0.9]},
        "echo277": {"run": true, "sigma_limits": [2.5]},
        "echo381": {"run": true, "x_range": [0, 3], "y_range": [1, 2]},
        "echo383": {"run": true, "row_list": [7]}
    })
}

#[test]
fn test_v1_values_land_on_renamed_keys() {
    let migrated = upgrade(&legacy_document()).unwrap();
    assert_eq!(migrated.config_spec(), CURRENT_VERSION);

    let flag = |path: [&str; 2]| extract_as::<bool>(&migrated, &KeyPath::from(path)).unwrap();
    assert!(!flag(["fundamental", "run_prior_mask"]));
    assert!(!flag(["fundamental", "run_bad_pixel_map"]));
    assert!(flag(["filter", "run_filter_invalid_value"]));
    assert!(flag(["filter", "run_filter_percent_truncation"]));
    assert!(flag(["anomalous", "run_subarray"]));
    assert!(flag(["soft", "run_minimum_cut"]));
    assert!(!flag(["filter", "run_filter_pixel_truncation"]));
    assert!(flag(["filter", "run_filter_sigma_value"]));
    assert!(flag(["geometric", "run_mask_rectangle"]));
    assert!(flag(["geometric", "run_mask_rows"]));

    assert_eq!(
        extract_as::<Vec<i64>>(&migrated, &KeyPath::from(["anomalous", "subarray_row_range"]))
            .unwrap(),
        vec![4, 9]
    );
    assert_eq!(
        extract_as::<i64>(&migrated, &KeyPath::from(["filter", "top_count"])).unwrap(),
        3
    );
    assert_eq!(
        extract_as::<Vec<f64>>(&migrated, &KeyPath::from(["filter", "sigma_multiple"])).unwrap(),
        vec![2.5]
    );
    // Keys new in this revision take their defaults.
    assert_eq!(
        extract_as::<i64>(&migrated, &KeyPath::from(["filter", "sigma_iterations"])).unwrap(),
        1
    );
}

#[test]
fn test_every_v1_key_has_a_counterpart() {
    let migrated = upgrade(&legacy_document()).unwrap();
    assert!(
        migrated.warnings().is_empty(),
        "unexpected warnings: {:?}",
        migrated.warnings()
    );
}

#[test]
fn test_invalid_value_fix_maps_to_invalid_value_filter() {
    let migrated = upgrade(&json!({
        "meta": {"config_spec": "smeargle-masking-1"},
        "echo010": {"run": true}
    }))
    .unwrap();
    let flag = |path: [&str; 2]| extract_as::<bool>(&migrated, &KeyPath::from(path)).unwrap();
    assert!(flag(["filter", "run_filter_invalid_value"]));
    assert!(!flag(["fundamental", "run_prior_mask"]));
}

#[test]
fn test_kept_range_becomes_percent_cuts() {
    let migrated = upgrade(&legacy_document()).unwrap();
    let fraction =
        |key: &str| extract_as::<f64>(&migrated, &KeyPath::from(["filter", key])).unwrap();
    assert_relative_eq!(fraction("bottom_percent"), 0.1);
    assert_relative_eq!(fraction("top_percent"), 0.1, epsilon = 1e-12);
}

#[test]
fn test_out_of_range_kept_bound_keeps_default() {
    let migrated = upgrade(&json!({
        "meta": {"config_spec": "smeargle-masking-1"},
        "echo276": {"run": true, "kept_range": [0.2, 1.5]}
    }))
    .unwrap();
    let fraction =
        |key: &str| extract_as::<f64>(&migrated, &KeyPath::from(["filter", key])).unwrap();
    assert_relative_eq!(fraction("bottom_percent"), 0.2);
    assert_relative_eq!(fraction("top_percent"), 0.0);

    let incompatible: Vec<String> = migrated
        .warnings()
        .iter()
        .filter_map(|warning| match warning {
            Warning::MigrationIncompatible { path, .. } => Some(path.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(incompatible, vec!["echo276->kept_range"]);
    assert!(!migrated
        .warnings()
        .iter()
        .any(|warning| matches!(warning, Warning::MigrationDropped { .. })));
}

#[test]
fn test_version_is_rewritten_not_copied() {
    let old = load_tree(&legacy_document()).unwrap();
    let migrated = migrate(
        &old,
        &schema_for("smeargle-masking-1").unwrap(),
        &current_schema().unwrap(),
    )
    .unwrap();
    assert_eq!(
        extract_as::<String>(&migrated, &version_path()).unwrap(),
        CURRENT_VERSION
    );
}

#[test]
fn test_migration_is_idempotent() {
    let current = current_schema().unwrap();
    let once = upgrade(&legacy_document()).unwrap();
    let twice = migrate(&once, &current, &current).unwrap();
    assert_eq!(once, twice);

    let revalidated = validate(&once.to_json(), &current).unwrap();
    assert_eq!(once, revalidated);
}

#[test]
fn test_empty_legacy_document_migrates_to_defaults() {
    let migrated = upgrade(&json!({"meta": {"config_spec": "smeargle-masking-1"}})).unwrap();
    let defaults = validate(&json!({}), &current_schema().unwrap()).unwrap();
    assert_eq!(migrated, defaults);
}
