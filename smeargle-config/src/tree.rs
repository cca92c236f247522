//! Validated configuration trees.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use smeargle_core::{KeyPath, Warning};

use crate::schema::Schema;

/// A normalized leaf value.
///
/// Option leaves are stored as [`ConfigValue::String`] after their
/// membership check.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    IntegerList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl ConfigValue {
    /// Human-readable type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Boolean(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::IntegerList(_) => "integer list",
            ConfigValue::FloatList(_) => "float list",
        }
    }

    /// Converts back to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Boolean(b) => Value::Bool(*b),
            ConfigValue::Integer(i) => Value::from(*i),
            ConfigValue::Float(f) => Value::from(*f),
            ConfigValue::IntegerList(items) => {
                Value::Array(items.iter().map(|&i| Value::from(i)).collect())
            }
            ConfigValue::FloatList(items) => {
                Value::Array(items.iter().map(|&f| Value::from(f)).collect())
            }
        }
    }
}

/// A node of a validated tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Value(ConfigValue),
    Section(BTreeMap<String, ConfigNode>),
}

impl ConfigNode {
    fn to_json(&self) -> Value {
        match self {
            ConfigNode::Value(value) => value.to_json(),
            ConfigNode::Section(children) => section_to_json(children),
        }
    }
}

fn section_to_json(children: &BTreeMap<String, ConfigNode>) -> Value {
    let map: Map<String, Value> = children
        .iter()
        .map(|(key, node)| (key.clone(), node.to_json()))
        .collect();
    Value::Object(map)
}

/// A configuration tree that has passed schema validation.
///
/// Every leaf satisfies its schema leaf. The tree is immutable to callers;
/// to change it, take the raw document with [`ValidatedTree::into_raw`],
/// edit it and validate again.
#[derive(Debug, Clone)]
pub struct ValidatedTree {
    pub(crate) root: BTreeMap<String, ConfigNode>,
    pub(crate) schema_version: String,
    pub(crate) config_spec: String,
    pub(crate) warnings: Vec<Warning>,
}

impl PartialEq for ValidatedTree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
            && self.schema_version == other.schema_version
            && self.config_spec == other.config_spec
    }
}

impl ValidatedTree {
    /// The schema version token the tree declares (`meta->config_spec`).
    #[must_use]
    pub fn config_spec(&self) -> &str {
        &self.config_spec
    }

    /// The version of the schema the tree was validated against.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Warnings raised while the tree was built.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// True when the tree declares the given schema's version.
    #[must_use]
    pub fn is_current(&self, schema: &Schema) -> bool {
        self.config_spec == schema.version()
    }

    /// Top-level entries.
    #[must_use]
    pub fn root(&self) -> &BTreeMap<String, ConfigNode> {
        &self.root
    }

    /// Looks up a node. The root path is not a node and yields `None`.
    #[must_use]
    pub fn get(&self, path: &KeyPath) -> Option<&ConfigNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            match node {
                ConfigNode::Section(children) => node = children.get(segment)?,
                ConfigNode::Value(_) => return None,
            }
        }
        Some(node)
    }

    /// Looks up a leaf value.
    #[must_use]
    pub fn value(&self, path: &KeyPath) -> Option<&ConfigValue> {
        match self.get(path)? {
            ConfigNode::Value(value) => Some(value),
            ConfigNode::Section(_) => None,
        }
    }

    /// All leaves in depth-first key order.
    #[must_use]
    pub fn leaves(&self) -> Vec<(KeyPath, &ConfigValue)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &KeyPath::root(), &mut out);
        out
    }

    /// Renders the tree as a JSON document, defaults included.
    #[must_use]
    pub fn to_json(&self) -> Value {
        section_to_json(&self.root)
    }

    /// Consumes the tree and returns its raw document for editing.
    #[must_use]
    pub fn into_raw(self) -> Value {
        self.to_json()
    }
}

fn collect_leaves<'a>(
    children: &'a BTreeMap<String, ConfigNode>,
    prefix: &KeyPath,
    out: &mut Vec<(KeyPath, &'a ConfigValue)>,
) {
    for (key, node) in children {
        let path = prefix.child(key);
        match node {
            ConfigNode::Value(value) => out.push((path, value)),
            ConfigNode::Section(grandchildren) => collect_leaves(grandchildren, &path, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ValidatedTree {
        let mut soft = BTreeMap::new();
        soft.insert(
            "minimum_value".to_string(),
            ConfigNode::Value(ConfigValue::Float(1.5)),
        );
        soft.insert(
            "run_minimum_cut".to_string(),
            ConfigNode::Value(ConfigValue::Boolean(true)),
        );
        let mut root = BTreeMap::new();
        root.insert("soft".to_string(), ConfigNode::Section(soft));
        ValidatedTree {
            root,
            schema_version: "test-1".into(),
            config_spec: "test-1".into(),
            warnings: vec![Warning::UnknownKey {
                path: KeyPath::from(["bogus"]),
            }],
        }
    }

    #[test]
    fn test_lookup() {
        let tree = sample();
        assert_eq!(
            tree.value(&KeyPath::from(["soft", "minimum_value"])),
            Some(&ConfigValue::Float(1.5))
        );
        assert!(tree.value(&KeyPath::from(["soft"])).is_none());
        assert!(tree.get(&KeyPath::from(["soft", "minimum_value", "deeper"])).is_none());
        assert!(tree.get(&KeyPath::root()).is_none());
    }

    #[test]
    fn test_to_json() {
        let tree = sample();
        assert_eq!(
            tree.to_json(),
            json!({"soft": {"minimum_value": 1.5, "run_minimum_cut": true}})
        );
    }

    #[test]
    fn test_equality_ignores_warnings() {
        let a = sample();
        let mut b = sample();
        b.warnings.clear();
        assert_eq!(a, b);
    }

    #[test]
    fn test_leaves_are_depth_first() {
        let tree = sample();
        let paths: Vec<String> = tree.leaves().iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["soft->minimum_value", "soft->run_minimum_cut"]);
    }
}
