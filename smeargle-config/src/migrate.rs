//! Upgrading configuration trees between schema revisions.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use smeargle_core::{KeyPath, SchemaError, Warning};

use crate::schema::{version_path, Schema};
use crate::tree::ValidatedTree;
use crate::validate::{coerce_value, validate};

/// Rewrites `old` (validated against `old_schema`) for `new_schema`.
///
/// Every leaf of the new schema takes the old value at the same path or,
/// failing that, at the first of its `previous_paths` present in the old
/// tree, transformed by the leaf's [`Carry`](crate::Carry). A value the new
/// leaf rejects keeps the new default and raises
/// [`Warning::MigrationIncompatible`]. Old leaves nothing consumed raise
/// [`Warning::MigrationDropped`]. The version leaf is never copied; the
/// result declares `new_schema`'s version.
///
/// Fails when `old` was not validated against `old_schema`, or when a
/// required new leaf has neither a default nor an old value to take.
pub fn migrate(
    old: &ValidatedTree,
    old_schema: &Schema,
    new_schema: &Schema,
) -> Result<ValidatedTree, SchemaError> {
    if old.schema_version() != old_schema.version() {
        return Err(SchemaError::ConstraintViolation {
            path: version_path(),
            reason: format!(
                "tree was validated against `{}`, not `{}`",
                old.schema_version(),
                old_schema.version()
            ),
        });
    }

    let version = version_path();
    let mut warnings = Vec::new();
    let mut consumed: BTreeSet<KeyPath> = BTreeSet::new();
    let mut raw = Map::new();

    for (path, leaf) in new_schema.leaves() {
        if path == version {
            continue;
        }
        let source = old
            .value(&path)
            .map(|value| (&path, Ok(value.clone())))
            .or_else(|| {
                leaf.previous_paths.iter().find_map(|candidate| {
                    old.value(candidate)
                        .map(|value| (candidate, leaf.carry.apply(value)))
                })
            });
        let Some((source_path, carried)) = source else {
            continue;
        };
        consumed.insert(source_path.clone());

        let converted = carried.and_then(|value| {
            coerce_value(&value.to_json(), leaf, &path).map_err(|err| err.to_string())
        });
        match converted {
            Ok(converted) => insert_at(&mut raw, &path, converted.to_json()),
            Err(reason) => warnings.push(Warning::MigrationIncompatible {
                path: source_path.clone(),
                reason,
            }),
        }
    }

    for (path, _) in old.leaves() {
        if path != version && !consumed.contains(&path) {
            warnings.push(Warning::MigrationDropped { path });
        }
    }

    let mut tree = validate(&Value::Object(raw), new_schema)?;
    for warning in &warnings {
        warning.emit();
    }
    log::info!(
        "migrated configuration from `{}` to `{}` ({} warnings)",
        old_schema.version(),
        new_schema.version(),
        warnings.len()
    );
    tree.warnings.extend(warnings);
    Ok(tree)
}

fn insert_at(root: &mut Map<String, Value>, path: &KeyPath, value: Value) {
    let Some((leaf, parents)) = path.segments().split_last() else {
        return;
    };
    let mut section = root;
    for segment in parents {
        let entry = section
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        section = next;
    }
    section.insert(leaf.clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ConfigValue;
    use serde_json::json;

    fn old_schema() -> Schema {
        Schema::from_json(
            r#"{
            "version": "demo-1",
            "keys": {
                "cut": {
                    "run": { "type": "boolean", "default": false },
                    "level": { "type": "integer", "optional": true },
                    "flavour": { "type": "string", "default": "plain" }
                },
                "legacy": { "type": "string", "default": "x" }
            }
        }"#,
        )
        .unwrap()
    }

    fn new_schema() -> Schema {
        Schema::from_json(
            r#"{
            "version": "demo-2",
            "keys": {
                "soft": {
                    "run_cut": { "type": "boolean", "default": false, "previous_paths": ["cut.run"] },
                    "level": { "type": "float", "optional": true, "max": 10, "previous_paths": ["cut.level"] },
                    "mode": { "type": "option", "choices": ["a", "b"], "default": "a", "previous_paths": ["cut.flavour"] }
                },
                "fresh": { "type": "integer", "default": 7 }
            }
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_renamed_keys_are_carried() {
        let old = validate(&json!({"cut": {"run": "yes", "level": 4}}), &old_schema()).unwrap();
        let migrated = migrate(&old, &old_schema(), &new_schema()).unwrap();

        assert_eq!(migrated.config_spec(), "demo-2");
        assert_eq!(
            migrated.value(&KeyPath::from(["soft", "run_cut"])),
            Some(&ConfigValue::Boolean(true))
        );
        assert_eq!(
            migrated.value(&KeyPath::from(["soft", "level"])),
            Some(&ConfigValue::Float(4.0))
        );
        assert_eq!(
            migrated.value(&KeyPath::from(["fresh"])),
            Some(&ConfigValue::Integer(7))
        );
    }

    #[test]
    fn test_incompatible_and_dropped_warnings() {
        let old = validate(
            &json!({"cut": {"level": 40, "flavour": "spicy"}, "legacy": "y"}),
            &old_schema(),
        )
        .unwrap();
        let migrated = migrate(&old, &old_schema(), &new_schema()).unwrap();

        assert_eq!(migrated.value(&KeyPath::from(["soft", "level"])), None);
        assert_eq!(
            migrated.value(&KeyPath::from(["soft", "mode"])),
            Some(&ConfigValue::String("a".into()))
        );

        let incompatible: Vec<String> = migrated
            .warnings()
            .iter()
            .filter_map(|w| match w {
                Warning::MigrationIncompatible { path, .. } => Some(path.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(incompatible, vec!["cut->level", "cut->flavour"]);

        assert!(migrated.warnings().contains(&Warning::MigrationDropped {
            path: KeyPath::from(["legacy"])
        }));
    }

    #[test]
    fn test_rejects_tree_of_other_revision() {
        let tree = validate(&json!({}), &new_schema()).unwrap();
        assert!(matches!(
            migrate(&tree, &old_schema(), &new_schema()),
            Err(SchemaError::ConstraintViolation { .. })
        ));
    }

    fn reshaped_pair() -> (Schema, Schema) {
        let old = Schema::from_json(
            r#"{
            "version": "shape-1",
            "keys": {
                "x": { "type": "integer", "default": 0 },
                "y": { "z": { "type": "string", "default": "a" } }
            }
        }"#,
        )
        .unwrap();
        let new = Schema::from_json(
            r#"{
            "version": "shape-2",
            "keys": {
                "x": { "y": { "type": "integer", "default": 7 } },
                "y": { "type": "string", "default": "b" }
            }
        }"#,
        )
        .unwrap();
        (old, new)
    }

    #[test]
    fn test_leaf_turned_section_and_back_take_new_defaults() {
        let (old_schema, new_schema) = reshaped_pair();
        let old = validate(&json!({"x": 5, "y": {"z": "q"}}), &old_schema).unwrap();
        let migrated = migrate(&old, &old_schema, &new_schema).unwrap();

        assert_eq!(
            migrated.value(&KeyPath::from(["x", "y"])),
            Some(&ConfigValue::Integer(7))
        );
        assert_eq!(
            migrated.value(&KeyPath::from(["y"])),
            Some(&ConfigValue::String("b".into()))
        );
        assert_eq!(
            migrated.warnings(),
            &[
                Warning::MigrationDropped {
                    path: KeyPath::from(["x"])
                },
                Warning::MigrationDropped {
                    path: KeyPath::from(["y", "z"])
                },
            ]
        );

        let again = migrate(&migrated, &new_schema, &new_schema).unwrap();
        assert_eq!(again, migrated);
        assert!(again.warnings().is_empty());
    }

    #[test]
    fn test_carry_transforms_values_from_previous_paths() {
        let old_schema = Schema::from_json(
            r#"{
            "version": "range-1",
            "keys": { "cut": { "kept": { "type": "float_list", "optional": true } } }
        }"#,
        )
        .unwrap();
        let new_schema = Schema::from_json(
            r#"{
            "version": "range-2",
            "keys": {
                "low": { "type": "float", "default": 0.0, "previous_paths": ["cut.kept"], "carry": "first" },
                "high": { "type": "float", "default": 0.0, "previous_paths": ["cut.kept"], "carry": "one_minus_last" }
            }
        }"#,
        )
        .unwrap();

        let old = validate(&json!({"cut": {"kept": [0.25, 0.5]}}), &old_schema).unwrap();
        let migrated = migrate(&old, &old_schema, &new_schema).unwrap();
        assert_eq!(
            migrated.value(&KeyPath::from(["low"])),
            Some(&ConfigValue::Float(0.25))
        );
        assert_eq!(
            migrated.value(&KeyPath::from(["high"])),
            Some(&ConfigValue::Float(0.5))
        );
        assert!(migrated.warnings().is_empty());

        let empty = validate(&json!({"cut": {"kept": []}}), &old_schema).unwrap();
        let migrated = migrate(&empty, &old_schema, &new_schema).unwrap();
        assert_eq!(
            migrated.value(&KeyPath::from(["low"])),
            Some(&ConfigValue::Float(0.0))
        );
        assert_eq!(migrated.warnings().len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let old = validate(&json!({"cut": {"run": true, "level": 3}}), &old_schema()).unwrap();
        let once = migrate(&old, &old_schema(), &new_schema()).unwrap();
        let twice = migrate(&once, &new_schema(), &new_schema()).unwrap();
        assert_eq!(once, twice);
        assert!(twice.warnings().is_empty());
    }
}
