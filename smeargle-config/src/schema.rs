//! Configuration schema documents.
//!
//! A schema is a JSON document of the form
//!
//! ```json
//! {
//!   "version": "smeargle-masking-2",
//!   "keys": {
//!     "soft": {
//!       "run_minimum_cut": { "type": "boolean", "default": false },
//!       "minimum_value": { "type": "float", "optional": true }
//!     }
//!   }
//! }
//! ```
//!
//! Objects carrying a `type` field are leaves; every other object is a
//! section. The leaf `meta.config_spec` is reserved and always present,
//! defaulting to the schema version.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use smeargle_core::{KeyPath, SchemaError};

use crate::tree::ConfigValue;
use crate::validate::coerce_value;

/// Section holding schema bookkeeping.
pub const META_SECTION: &str = "meta";
/// Leaf under [`META_SECTION`] naming the schema version a tree targets.
pub const CONFIG_SPEC_KEY: &str = "config_spec";

/// Path of the version leaf, `meta->config_spec`.
#[must_use]
pub fn version_path() -> KeyPath {
    KeyPath::from([META_SECTION, CONFIG_SPEC_KEY])
}

/// Declared type of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafType {
    String,
    Boolean,
    Integer,
    Float,
    /// A closed set of string literals, see [`LeafSpec::choices`].
    Option,
    IntList,
    FloatList,
}

impl LeafType {
    /// Human-readable type name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LeafType::String => "string",
            LeafType::Boolean => "boolean",
            LeafType::Integer => "integer",
            LeafType::Float => "float",
            LeafType::Option => "option",
            LeafType::IntList => "integer list",
            LeafType::FloatList => "float list",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            LeafType::Integer | LeafType::Float | LeafType::IntList | LeafType::FloatList
        )
    }
}

/// How a value found at one of a leaf's `previous_paths` is carried over.
///
/// Values found at the leaf's own path are always taken unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carry {
    #[default]
    AsIs,
    /// First element of a list.
    First,
    /// One minus the last element of a float list; turns the upper bound of
    /// a kept fraction range into the fraction cut above it.
    OneMinusLast,
}

impl Carry {
    /// Name used in schema documents and messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Carry::AsIs => "as_is",
            Carry::First => "first",
            Carry::OneMinusLast => "one_minus_last",
        }
    }

    /// Transforms an old value; the error is a human-readable reason.
    pub fn apply(self, value: &ConfigValue) -> Result<ConfigValue, String> {
        let empty = || format!("`{}` needs a non-empty list", self.name());
        match (self, value) {
            (Carry::AsIs, value) => Ok(value.clone()),
            (Carry::First, ConfigValue::IntegerList(items)) => {
                items.first().map(|&i| ConfigValue::Integer(i)).ok_or_else(empty)
            }
            (Carry::First, ConfigValue::FloatList(items)) => {
                items.first().map(|&f| ConfigValue::Float(f)).ok_or_else(empty)
            }
            (Carry::OneMinusLast, ConfigValue::FloatList(items)) => items
                .last()
                .map(|&f| ConfigValue::Float(1.0 - f))
                .ok_or_else(empty),
            (carry, other) => Err(format!(
                "`{}` cannot be applied to a {}",
                carry.name(),
                other.type_name()
            )),
        }
    }
}

/// Declaration of a single configuration key.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafSpec {
    pub value_type: LeafType,
    /// Value substituted when the key is absent.
    pub default: Option<ConfigValue>,
    /// Absent keys without a default are allowed and stay absent.
    pub optional: bool,
    /// Inclusive lower bound for numbers and list elements.
    pub min: Option<f64>,
    /// Inclusive upper bound for numbers and list elements.
    pub max: Option<f64>,
    /// Allowed literals of an option leaf.
    pub choices: Vec<String>,
    /// Older key paths this value may be migrated from, most recent first.
    pub previous_paths: Vec<KeyPath>,
    /// Transform applied to a value taken from `previous_paths`.
    pub carry: Carry,
    pub description: Option<String>,
}

impl LeafSpec {
    /// A leaf without default, constraints or history.
    #[must_use]
    pub fn new(value_type: LeafType) -> Self {
        Self {
            value_type,
            default: None,
            optional: false,
            min: None,
            max: None,
            choices: Vec::new(),
            previous_paths: Vec::new(),
            carry: Carry::AsIs,
            description: None,
        }
    }

    /// True when a missing key is acceptable.
    #[must_use]
    pub fn may_be_absent(&self) -> bool {
        self.optional || self.default.is_some()
    }
}

/// A schema node: a leaf or a nested section.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Leaf(LeafSpec),
    Section(BTreeMap<String, SchemaNode>),
}

/// A parsed, self-consistent configuration schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    version: String,
    description: Option<String>,
    root: BTreeMap<String, SchemaNode>,
}

#[derive(Deserialize)]
struct RawSchema {
    version: String,
    #[serde(default)]
    description: Option<String>,
    keys: BTreeMap<String, RawNode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNode {
    Leaf(RawLeaf),
    Section(BTreeMap<String, RawNode>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLeaf {
    #[serde(rename = "type")]
    value_type: LeafType,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    previous_paths: Vec<String>,
    #[serde(default)]
    carry: Carry,
    #[serde(default)]
    description: Option<String>,
}

impl Schema {
    /// Parses a schema from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_str(json).map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parses a schema from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> smeargle_core::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let raw: RawSchema = serde_json::from_reader(reader)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self::from_raw(raw)?)
    }

    fn from_raw(raw: RawSchema) -> Result<Self, SchemaError> {
        let version = raw.version.trim().to_string();
        if version.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "schema version must not be empty".into(),
            ));
        }

        let mut root = convert_section(raw.keys, &KeyPath::root())?;
        inject_version_leaf(&mut root, &version)?;

        Ok(Self {
            version,
            description: raw.description,
            root,
        })
    }

    /// Version token written into `meta->config_spec` of conforming trees.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Top-level nodes.
    #[must_use]
    pub fn root(&self) -> &BTreeMap<String, SchemaNode> {
        &self.root
    }

    /// Looks up a node by path.
    #[must_use]
    pub fn node(&self, path: &KeyPath) -> Option<&SchemaNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            match node {
                SchemaNode::Section(children) => node = children.get(segment)?,
                SchemaNode::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    /// Looks up a leaf by path.
    #[must_use]
    pub fn leaf(&self, path: &KeyPath) -> Option<&LeafSpec> {
        match self.node(path)? {
            SchemaNode::Leaf(leaf) => Some(leaf),
            SchemaNode::Section(_) => None,
        }
    }

    /// All leaves in depth-first key order.
    #[must_use]
    pub fn leaves(&self) -> Vec<(KeyPath, &LeafSpec)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &KeyPath::root(), &mut out);
        out
    }
}

fn collect_leaves<'a>(
    children: &'a BTreeMap<String, SchemaNode>,
    prefix: &KeyPath,
    out: &mut Vec<(KeyPath, &'a LeafSpec)>,
) {
    for (key, node) in children {
        let path = prefix.child(key);
        match node {
            SchemaNode::Leaf(leaf) => out.push((path, leaf)),
            SchemaNode::Section(grandchildren) => collect_leaves(grandchildren, &path, out),
        }
    }
}

fn convert_section(
    raw: BTreeMap<String, RawNode>,
    prefix: &KeyPath,
) -> Result<BTreeMap<String, SchemaNode>, SchemaError> {
    let mut out = BTreeMap::new();
    for (key, node) in raw {
        if key.trim().is_empty() || key.contains('.') {
            return Err(SchemaError::InvalidSchema(format!(
                "invalid key name `{key}` under `{prefix}`"
            )));
        }
        let path = prefix.child(&key);
        let converted = match node {
            RawNode::Leaf(leaf) => SchemaNode::Leaf(convert_leaf(leaf, &path)?),
            RawNode::Section(children) => SchemaNode::Section(convert_section(children, &path)?),
        };
        out.insert(key, converted);
    }
    Ok(out)
}

fn convert_leaf(raw: RawLeaf, path: &KeyPath) -> Result<LeafSpec, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidSchema(format!("key `{path}`: {reason}"));

    let value_type = raw.value_type;
    if (raw.min.is_some() || raw.max.is_some()) && !value_type.is_numeric() {
        return Err(invalid(format!(
            "min/max are not allowed on a {} leaf",
            value_type.name()
        )));
    }
    if let (Some(min), Some(max)) = (raw.min, raw.max) {
        if min > max {
            return Err(invalid(format!("min {min} exceeds max {max}")));
        }
    }
    match value_type {
        LeafType::Option if raw.choices.is_empty() => {
            return Err(invalid("an option leaf needs at least one choice".into()));
        }
        LeafType::Option => {}
        _ if !raw.choices.is_empty() => {
            return Err(invalid(format!(
                "choices are only allowed on option leaves, not {}",
                value_type.name()
            )));
        }
        _ => {}
    }

    let mut leaf = LeafSpec {
        value_type,
        default: None,
        optional: raw.optional,
        min: raw.min,
        max: raw.max,
        choices: raw.choices,
        previous_paths: raw
            .previous_paths
            .iter()
            .map(|dotted| KeyPath::parse_dotted(dotted))
            .collect(),
        carry: raw.carry,
        description: raw.description,
    };
    if leaf.previous_paths.iter().any(KeyPath::is_empty) {
        return Err(invalid("empty previous path".into()));
    }
    if leaf.carry != Carry::AsIs && leaf.previous_paths.is_empty() {
        return Err(invalid(format!(
            "carry `{}` needs previous paths",
            leaf.carry.name()
        )));
    }

    if let Some(default) = raw.default.filter(|value| !value.is_null()) {
        let checked = coerce_value(&default, &leaf, path)
            .map_err(|e| invalid(format!("bad default: {e}")))?;
        leaf.default = Some(checked);
    }
    Ok(leaf)
}

fn inject_version_leaf(
    root: &mut BTreeMap<String, SchemaNode>,
    version: &str,
) -> Result<(), SchemaError> {
    let meta = root
        .entry(META_SECTION.to_string())
        .or_insert_with(|| SchemaNode::Section(BTreeMap::new()));
    let SchemaNode::Section(children) = meta else {
        return Err(SchemaError::InvalidSchema(format!(
            "`{META_SECTION}` is reserved for a section"
        )));
    };
    if children.contains_key(CONFIG_SPEC_KEY) {
        return Err(SchemaError::InvalidSchema(format!(
            "`{}` is reserved",
            version_path()
        )));
    }
    let mut leaf = LeafSpec::new(LeafType::String);
    leaf.default = Some(ConfigValue::String(version.to_string()));
    leaf.description = Some("Schema version this configuration was written for.".into());
    children.insert(CONFIG_SPEC_KEY.to_string(), SchemaNode::Leaf(leaf));
    Ok(())
}
