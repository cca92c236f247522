//! Schema revisions shipped with the crate.

use smeargle_core::{ConfigurationError, Result};

use crate::schema::Schema;

/// Version token of the schema the pipeline runs against.
pub const CURRENT_VERSION: &str = "smeargle-masking-2";

const MASKING_V1: &str = include_str!("../schemas/smeargle-masking-1.json");
const MASKING_V2: &str = include_str!("../schemas/smeargle-masking-2.json");

/// `(version, document)` for every built-in revision, oldest first.
const REVISIONS: [(&str, &str); 2] = [
    ("smeargle-masking-1", MASKING_V1),
    (CURRENT_VERSION, MASKING_V2),
];

/// Version tokens of all built-in revisions, oldest first.
#[must_use]
pub fn known_versions() -> Vec<&'static str> {
    REVISIONS.iter().map(|(version, _)| *version).collect()
}

/// Parses the built-in schema with the given version token.
pub fn schema_for(version: &str) -> Result<Schema> {
    let (_, document) = REVISIONS
        .iter()
        .find(|(known, _)| *known == version.trim())
        .ok_or_else(|| ConfigurationError::UnknownSchemaVersion(version.to_string()))?;
    Ok(Schema::from_json(document)?)
}

/// Parses the current schema.
pub fn current_schema() -> Result<Schema> {
    schema_for(CURRENT_VERSION)
}

/// Parses every built-in schema, oldest first.
pub fn builtin_schemas() -> Result<Vec<Schema>> {
    REVISIONS
        .iter()
        .map(|(_, document)| Schema::from_json(document).map_err(Into::into))
        .collect()
}
