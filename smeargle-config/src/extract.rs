//! Typed extraction of values from a validated tree by key path.

use smeargle_core::{ConfigurationError, KeyPath};

use crate::tree::{ConfigNode, ConfigValue, ValidatedTree};

/// Types that can be read out of a [`ConfigValue`].
pub trait FromConfigValue: Sized {
    /// Type name reported when the leaf holds something else.
    const EXPECTED: &'static str;

    /// Converts the value, or `None` if it holds a different type.
    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromConfigValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromConfigValue for usize {
    const EXPECTED: &'static str = "non-negative integer";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => usize::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for f64 {
    const EXPECTED: &'static str = "float";

    #[allow(clippy::cast_precision_loss)]
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromConfigValue for String {
    const EXPECTED: &'static str = "string";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromConfigValue for Vec<i64> {
    const EXPECTED: &'static str = "integer list";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::IntegerList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromConfigValue for Vec<usize> {
    const EXPECTED: &'static str = "list of non-negative integers";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::IntegerList(items) => items
                .iter()
                .map(|&i| usize::try_from(i).ok())
                .collect(),
            _ => None,
        }
    }
}

impl FromConfigValue for Vec<f64> {
    const EXPECTED: &'static str = "float list";

    #[allow(clippy::cast_precision_loss)]
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::FloatList(items) => Some(items.clone()),
            ConfigValue::IntegerList(items) => Some(items.iter().map(|&i| i as f64).collect()),
            _ => None,
        }
    }
}

/// Returns the leaf value at `path`.
///
/// Fails with [`ConfigurationError::MissingKey`] when any segment is
/// absent and with [`ConfigurationError::TypeMismatch`] when the path names
/// a section.
pub fn extract<'a>(
    tree: &'a ValidatedTree,
    path: &KeyPath,
) -> Result<&'a ConfigValue, ConfigurationError> {
    match tree.get(path) {
        Some(ConfigNode::Value(value)) => Ok(value),
        Some(ConfigNode::Section(_)) => Err(ConfigurationError::TypeMismatch {
            path: path.clone(),
            expected: "value",
            found: "section",
        }),
        None => Err(ConfigurationError::MissingKey { path: path.clone() }),
    }
}

/// Returns the leaf at `path` converted to `T`.
pub fn extract_as<T: FromConfigValue>(
    tree: &ValidatedTree,
    path: &KeyPath,
) -> Result<T, ConfigurationError> {
    let value = extract(tree, path)?;
    T::from_config_value(value).ok_or_else(|| ConfigurationError::TypeMismatch {
        path: path.clone(),
        expected: T::EXPECTED,
        found: value.type_name(),
    })
}

/// Like [`extract_as`], but an absent final leaf yields `None`.
///
/// The enclosing section must still exist; a missing intermediate segment
/// is an error.
pub fn extract_optional<T: FromConfigValue>(
    tree: &ValidatedTree,
    path: &KeyPath,
) -> Result<Option<T>, ConfigurationError> {
    let Some((_, parents)) = path.segments().split_last() else {
        return Err(ConfigurationError::MissingKey { path: path.clone() });
    };
    if !parents.is_empty() {
        let parent = KeyPath::new(parents.iter().map(String::as_str));
        match tree.get(&parent) {
            Some(ConfigNode::Section(_)) => {}
            Some(ConfigNode::Value(value)) => {
                return Err(ConfigurationError::TypeMismatch {
                    path: parent,
                    expected: "section",
                    found: value.type_name(),
                })
            }
            None => return Err(ConfigurationError::MissingKey { path: parent }),
        }
    }

    if tree.get(path).is_none() {
        return Ok(None);
    }
    extract_as(tree, path).map(Some)
}

/// Lists the keys of the section at `path`; the root path lists top-level
/// keys.
pub fn section_keys<'a>(
    tree: &'a ValidatedTree,
    path: &KeyPath,
) -> Result<Vec<&'a str>, ConfigurationError> {
    if path.is_empty() {
        return Ok(tree.root().keys().map(String::as_str).collect());
    }
    match tree.get(path) {
        Some(ConfigNode::Section(children)) => Ok(children.keys().map(String::as_str).collect()),
        Some(ConfigNode::Value(value)) => Err(ConfigurationError::TypeMismatch {
            path: path.clone(),
            expected: "section",
            found: value.type_name(),
        }),
        None => Err(ConfigurationError::MissingKey { path: path.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::validate::validate;
    use serde_json::json;

    fn tree() -> ValidatedTree {
        let schema = Schema::from_json(
            r#"{
            "version": "t",
            "keys": {
                "pixel": {
                    "run": { "type": "boolean", "default": true },
                    "count": { "type": "integer", "default": -2 },
                    "columns": { "type": "int_list", "default": [1, 2] },
                    "value": { "type": "float", "optional": true }
                }
            }
        }"#,
        )
        .unwrap();
        validate(&json!({}), &schema).unwrap()
    }

    #[test]
    fn test_extract_typed() {
        let tree = tree();
        assert!(extract_as::<bool>(&tree, &KeyPath::from(["pixel", "run"])).unwrap());
        assert_eq!(
            extract_as::<Vec<usize>>(&tree, &KeyPath::from(["pixel", "columns"])).unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            extract_as::<Vec<f64>>(&tree, &KeyPath::from(["pixel", "columns"])).unwrap(),
            vec![1.0, 2.0]
        );
    }

    #[test]
    fn test_extract_errors() {
        let tree = tree();

        let err = extract(&tree, &KeyPath::from(["nope", "run"])).unwrap_err();
        assert_eq!(err.to_string(), "configuration key path `nope->run` does not exist");

        let err = extract_as::<String>(&tree, &KeyPath::from(["pixel", "run"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::TypeMismatch {
                expected: "string",
                found: "boolean",
                ..
            }
        ));

        // Negative integers are not counts.
        assert!(extract_as::<usize>(&tree, &KeyPath::from(["pixel", "count"])).is_err());

        assert!(extract(&tree, &KeyPath::from(["pixel"])).is_err());
    }

    #[test]
    fn test_extract_optional() {
        let tree = tree();
        assert_eq!(
            extract_optional::<f64>(&tree, &KeyPath::from(["pixel", "value"])).unwrap(),
            None
        );
        assert_eq!(
            extract_optional::<i64>(&tree, &KeyPath::from(["pixel", "count"])).unwrap(),
            Some(-2)
        );
        assert!(matches!(
            extract_optional::<f64>(&tree, &KeyPath::from(["missing", "value"])),
            Err(ConfigurationError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_section_keys() {
        let tree = tree();
        assert_eq!(
            section_keys(&tree, &KeyPath::from(["pixel"])).unwrap(),
            vec!["columns", "count", "run"]
        );
        assert_eq!(section_keys(&tree, &KeyPath::root()).unwrap(), vec!["meta", "pixel"]);
    }
}
