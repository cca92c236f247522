//! Error types for smeargle.
//!
//! Three failure families exist. [`SchemaError`] is raised while a
//! configuration tree is validated, [`ConfigurationError`] while a validated
//! tree is resolved into filters, and [`BoundsError`] when a filter index
//! falls outside the grid. [`Error`] wraps all of them.

use std::fmt;

use thiserror::Error;

use crate::path::KeyPath;

/// Result type alias for smeargle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Grid axis, used to give bounds errors context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => f.write_str("row"),
            Axis::Column => f.write_str("column"),
        }
    }
}

/// Validation failures of a configuration tree against its schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A key without default that is not optional is absent.
    #[error("missing required key `{path}`")]
    MissingRequiredKey { path: KeyPath },

    /// A value could not be converted to the declared type.
    #[error("key `{path}`: expected {expected}, found {found}")]
    TypeMismatch {
        path: KeyPath,
        expected: String,
        found: String,
    },

    /// A value has the right type but violates a declared constraint.
    #[error("key `{path}`: {reason}")]
    ConstraintViolation { path: KeyPath, reason: String },

    /// The schema document itself is malformed.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Failures while resolving a validated tree into filter parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A key path does not exist in the tree.
    #[error("configuration key path `{path}` does not exist")]
    MissingKey { path: KeyPath },

    /// The leaf exists but holds a different type than requested.
    #[error("configuration key `{path}` holds {found}, expected {expected}")]
    TypeMismatch {
        path: KeyPath,
        expected: &'static str,
        found: &'static str,
    },

    /// A parameter value is invalid for its filter.
    #[error("filter `{filter}`: {reason}")]
    InvalidParameter { filter: &'static str, reason: String },

    /// Two parallel index lists differ in length.
    #[error("filter `{filter}`: {left} has {left_len} entries but {right} has {right_len}")]
    MismatchedLengths {
        filter: &'static str,
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    /// An enumerated method name is not recognised.
    #[error("configuration key `{path}`: unknown method `{method}`")]
    UnknownMethod { path: KeyPath, method: String },

    /// A supplied mask does not match the grid shape.
    #[error("filter `{filter}`: mask shape {found:?} does not match grid shape {expected:?}")]
    ShapeMismatch {
        filter: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// The tree was written for a different schema revision.
    #[error(
        "configuration declares schema `{found}` but the pipeline expects `{expected}`; \
         migrate the configuration first"
    )]
    StaleSchema { found: String, expected: String },

    /// No known schema carries this version token.
    #[error("unknown configuration schema version `{0}`")]
    UnknownSchemaVersion(String),
}

/// A filter index outside the grid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("filter `{filter}`: {axis} index {index} is outside the grid (0..{len})")]
pub struct BoundsError {
    pub filter: &'static str,
    pub axis: Axis,
    pub index: i64,
    pub len: usize,
}

/// Umbrella error for smeargle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Schema validation error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration resolution error.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Index outside the grid.
    #[error("bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// A configuration or settings document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_key_path() {
        let err = SchemaError::MissingRequiredKey {
            path: KeyPath::from(["filter", "sigma_multiple"]),
        };
        assert_eq!(
            err.to_string(),
            "missing required key `filter->sigma_multiple`"
        );

        let err = BoundsError {
            filter: "rows",
            axis: Axis::Row,
            index: 9,
            len: 4,
        };
        assert!(err.to_string().contains("row index 9"));
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: Error = ConfigurationError::UnknownSchemaVersion("v0".into()).into();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::UnknownSchemaVersion(_))
        ));
    }
}
