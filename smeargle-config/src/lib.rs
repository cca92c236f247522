//! smeargle-config: Declarative configuration for mask composition.
//!
//! A [`Schema`] declares every key a configuration may carry: its type,
//! default, constraints and the older paths it may be migrated from.
//! [`validate`] turns a raw JSON document into an immutable
//! [`ValidatedTree`]; [`extract`] and friends read typed values back out by
//! key path; [`migrate`] upgrades a tree written for an older schema
//! revision.
//!
//! # Key Components
//!
//! - [`Schema`] - Parsed schema document (JSON)
//! - [`ValidatedTree`] - Normalized configuration tree with defaults filled
//! - [`FromConfigValue`] - Typed extraction by key path
//! - [`Settings`] - Runtime settings of the pipeline itself
//! - [`builtin`] - Schema revisions shipped with the crate

pub mod builtin;
mod extract;
mod migrate;
mod schema;
mod settings;
mod store;
mod tree;
mod validate;

pub use builtin::{builtin_schemas, current_schema, known_versions, schema_for, CURRENT_VERSION};
pub use extract::{extract, extract_as, extract_optional, section_keys, FromConfigValue};
pub use migrate::migrate;
pub use schema::{
    version_path, Carry, LeafSpec, LeafType, Schema, SchemaNode, CONFIG_SPEC_KEY, META_SECTION,
};
pub use settings::Settings;
pub use store::{load_tree, load_tree_from_file, load_tree_from_str, upgrade};
pub use tree::{ConfigNode, ConfigValue, ValidatedTree};
pub use validate::{coerce_value, validate};
