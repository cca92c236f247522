//! Loading configuration documents against the built-in schemas.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use smeargle_core::{ConfigurationError, Error, Result};

use crate::builtin::{current_schema, schema_for};
use crate::migrate::migrate;
use crate::schema::{version_path, CONFIG_SPEC_KEY, META_SECTION};
use crate::tree::ValidatedTree;
use crate::validate::validate;

/// Validates a raw document against the built-in schema it declares in
/// `meta.config_spec`.
pub fn load_tree(raw: &Value) -> Result<ValidatedTree> {
    let declared = raw
        .get(META_SECTION)
        .and_then(|meta| meta.get(CONFIG_SPEC_KEY))
        .ok_or_else(|| ConfigurationError::MissingKey {
            path: version_path(),
        })?;
    let version = declared
        .as_str()
        .ok_or(ConfigurationError::TypeMismatch {
            path: version_path(),
            expected: "string",
            found: "non-string value",
        })?;

    let schema = schema_for(version)?;
    Ok(validate(raw, &schema)?)
}

/// Parses and loads a JSON configuration document.
pub fn load_tree_from_str(json: &str) -> Result<ValidatedTree> {
    let raw: Value = serde_json::from_str(json).map_err(|e| Error::Parse(e.to_string()))?;
    load_tree(&raw)
}

/// Reads and loads a JSON configuration file.
pub fn load_tree_from_file<P: AsRef<Path>>(path: P) -> Result<ValidatedTree> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: Value = serde_json::from_reader(reader).map_err(|e| Error::Parse(e.to_string()))?;
    load_tree(&raw)
}

/// Loads a document and migrates it to the current schema if it is stale.
pub fn upgrade(raw: &Value) -> Result<ValidatedTree> {
    let tree = load_tree(raw)?;
    let current = current_schema()?;
    if tree.is_current(&current) {
        return Ok(tree);
    }
    let old_schema = schema_for(tree.schema_version())?;
    Ok(migrate(&tree, &old_schema, &current)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::CURRENT_VERSION;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_load_selects_declared_schema() {
        let tree = load_tree(&json!({
            "meta": {"config_spec": "smeargle-masking-1"},
            "echo270": {"run": true, "minimum_value": 2.0}
        }))
        .unwrap();
        assert_eq!(tree.schema_version(), "smeargle-masking-1");
        assert!(tree.warnings().is_empty());
    }

    #[test]
    fn test_missing_or_unknown_version() {
        let err = load_tree(&json!({"soft": {}})).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MissingKey { .. })
        ));

        let err = load_tree(&json!({"meta": {"config_spec": "nope"}})).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::UnknownSchemaVersion(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"meta": {{"config_spec": "{CURRENT_VERSION}"}}, "soft": {{"run_minimum_cut": "on", "minimum_value": 1}}}}"#
        )
        .unwrap();
        let tree = load_tree_from_file(file.path()).unwrap();
        assert_eq!(tree.config_spec(), CURRENT_VERSION);

        assert!(matches!(
            load_tree_from_str("{not json"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_upgrade_stale_document() {
        let tree = upgrade(&json!({
            "meta": {"config_spec": "smeargle-masking-1"},
            "echo383": {"run": true, "row_list": "1, 3"}
        }))
        .unwrap();
        assert_eq!(tree.config_spec(), CURRENT_VERSION);
        assert_eq!(tree.schema_version(), CURRENT_VERSION);
    }
}
