//! Validation of raw configuration documents against a schema.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use smeargle_core::{KeyPath, SchemaError, Warning};

use crate::schema::{version_path, LeafSpec, LeafType, Schema, SchemaNode};
use crate::tree::{ConfigNode, ConfigValue, ValidatedTree};

const TRUE_TOKENS: [&str; 4] = ["true", "yes", "on", "1"];
const FALSE_TOKENS: [&str; 4] = ["false", "no", "off", "0"];

/// Validates and normalizes a raw configuration document.
///
/// Present values are converted to their declared type and checked against
/// their constraints. Absent values take their default; absent optional
/// values without default stay absent. `null` counts as absent. Keys the
/// schema does not declare are ignored and reported as
/// [`Warning::UnknownKey`].
pub fn validate(raw: &Value, schema: &Schema) -> Result<ValidatedTree, SchemaError> {
    let root_map = match raw {
        Value::Null => None,
        Value::Object(map) => Some(map),
        other => {
            return Err(SchemaError::TypeMismatch {
                path: KeyPath::root(),
                expected: "section".into(),
                found: json_kind(other).into(),
            })
        }
    };

    let mut warnings = Vec::new();
    let root = validate_section(root_map, schema.root(), &KeyPath::root(), &mut warnings)?;

    let mut tree = ValidatedTree {
        root,
        schema_version: schema.version().to_string(),
        config_spec: String::new(),
        warnings,
    };
    tree.config_spec = match tree.value(&version_path()) {
        Some(ConfigValue::String(spec)) => spec.clone(),
        _ => schema.version().to_string(),
    };
    log::debug!(
        "validated configuration against `{}` ({} warnings)",
        schema.version(),
        tree.warnings.len()
    );
    Ok(tree)
}

fn validate_section(
    raw: Option<&Map<String, Value>>,
    spec: &BTreeMap<String, SchemaNode>,
    prefix: &KeyPath,
    warnings: &mut Vec<Warning>,
) -> Result<BTreeMap<String, ConfigNode>, SchemaError> {
    let mut out = BTreeMap::new();

    for (key, node) in spec {
        let path = prefix.child(key);
        let present = raw
            .and_then(|map| map.get(key))
            .filter(|value| !value.is_null());

        match node {
            SchemaNode::Leaf(leaf) => {
                if let Some(value) = present {
                    out.insert(key.clone(), ConfigNode::Value(coerce_value(value, leaf, &path)?));
                } else if let Some(default) = &leaf.default {
                    out.insert(key.clone(), ConfigNode::Value(default.clone()));
                } else if !leaf.optional {
                    return Err(SchemaError::MissingRequiredKey { path });
                }
            }
            SchemaNode::Section(children) => {
                let child_map = match present {
                    None => None,
                    Some(Value::Object(map)) => Some(map),
                    Some(other) => {
                        return Err(SchemaError::TypeMismatch {
                            path,
                            expected: "section".into(),
                            found: json_kind(other).into(),
                        })
                    }
                };
                let section = validate_section(child_map, children, &path, warnings)?;
                out.insert(key.clone(), ConfigNode::Section(section));
            }
        }
    }

    if let Some(map) = raw {
        for key in map.keys().filter(|key| !spec.contains_key(*key)) {
            let warning = Warning::UnknownKey {
                path: prefix.child(key),
            };
            warning.emit();
            warnings.push(warning);
        }
    }

    Ok(out)
}

/// Converts one raw value to the type declared by `leaf`, checking its
/// constraints. `path` only names the key in errors.
pub fn coerce_value(
    raw: &Value,
    leaf: &LeafSpec,
    path: &KeyPath,
) -> Result<ConfigValue, SchemaError> {
    let mismatch = || SchemaError::TypeMismatch {
        path: path.clone(),
        expected: leaf.value_type.name().into(),
        found: describe(raw),
    };

    match leaf.value_type {
        LeafType::String => scalar_text(raw).map(ConfigValue::String).ok_or_else(mismatch),
        LeafType::Boolean => parse_bool(raw).map(ConfigValue::Boolean).ok_or_else(mismatch),
        LeafType::Integer => {
            let value = parse_integer(raw).ok_or_else(mismatch)?;
            check_bounds(widen(value), &value.to_string(), leaf, path)?;
            Ok(ConfigValue::Integer(value))
        }
        LeafType::Float => {
            let value = parse_float(raw).ok_or_else(mismatch)?;
            check_finite(value, path)?;
            check_bounds(value, &value.to_string(), leaf, path)?;
            Ok(ConfigValue::Float(value))
        }
        LeafType::Option => {
            let text = scalar_text(raw).ok_or_else(mismatch)?;
            let trimmed = text.trim();
            if leaf.choices.iter().any(|choice| choice == trimmed) {
                Ok(ConfigValue::String(trimmed.to_string()))
            } else {
                Err(SchemaError::ConstraintViolation {
                    path: path.clone(),
                    reason: format!(
                        "`{trimmed}` is not one of {}",
                        leaf.choices.join(", ")
                    ),
                })
            }
        }
        LeafType::IntList => {
            let items = list_items(raw).ok_or_else(mismatch)?;
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let value = parse_integer(item).ok_or_else(|| element_mismatch(item, leaf, path))?;
                check_bounds(widen(value), &value.to_string(), leaf, path)?;
                out.push(value);
            }
            Ok(ConfigValue::IntegerList(out))
        }
        LeafType::FloatList => {
            let items = list_items(raw).ok_or_else(mismatch)?;
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let value = parse_float(item).ok_or_else(|| element_mismatch(item, leaf, path))?;
                check_finite(value, path)?;
                check_bounds(value, &value.to_string(), leaf, path)?;
                out.push(value);
            }
            Ok(ConfigValue::FloatList(out))
        }
    }
}

fn element_mismatch(item: &Value, leaf: &LeafSpec, path: &KeyPath) -> SchemaError {
    SchemaError::TypeMismatch {
        path: path.clone(),
        expected: leaf.value_type.name().into(),
        found: format!("list element {}", describe(item)),
    }
}

fn check_finite(value: f64, path: &KeyPath) -> Result<(), SchemaError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SchemaError::ConstraintViolation {
            path: path.clone(),
            reason: format!("value {value} is not finite"),
        })
    }
}

fn check_bounds(
    value: f64,
    shown: &str,
    leaf: &LeafSpec,
    path: &KeyPath,
) -> Result<(), SchemaError> {
    if let Some(min) = leaf.min {
        if value < min {
            return Err(SchemaError::ConstraintViolation {
                path: path.clone(),
                reason: format!("value {shown} is below the minimum {min}"),
            });
        }
    }
    if let Some(max) = leaf.max {
        if value > max {
            return Err(SchemaError::ConstraintViolation {
                path: path.clone(),
                reason: format!("value {shown} is above the maximum {max}"),
            });
        }
    }
    Ok(())
}

/// Scalars cast to text; arrays and sections are not strings.
fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => {
            let token = s.trim().to_ascii_lowercase();
            if TRUE_TOKENS.contains(&token.as_str()) {
                Some(true)
            } else if FALSE_TOKENS.contains(&token.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn widen(value: i64) -> f64 {
    value as f64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_float(value: f64) -> Option<i64> {
    // i64::MAX is not exactly representable; stay strictly inside.
    let limit = i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && value.abs() < limit).then(|| value as i64)
}

fn parse_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_float)),
        Value::String(s) => {
            let text = s.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(integral_float))
        }
        _ => None,
    }
}

fn parse_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Arrays as-is, comma-separated strings split, lone scalars wrapped.
fn list_items(raw: &Value) -> Option<Vec<Value>> {
    match raw {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(|piece| Value::String(piece.to_string()))
                .collect(),
        ),
        Value::Number(_) => Some(vec![raw.clone()]),
        _ => None,
    }
}

fn json_kind(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "section",
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Array(_) | Value::Object(_) | Value::Null => json_kind(raw).to_string(),
        other => format!("{} `{other}`", json_kind(other)),
    }
}
