//! Non-fatal diagnostics collected during validation, migration and
//! composition.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Axis;
use crate::path::KeyPath;

/// A recoverable condition worth reporting to the user.
///
/// Warnings are returned alongside results and also forwarded to the `log`
/// facade via [`Warning::emit`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Warning {
    /// A configuration key is not declared by the schema and was ignored.
    UnknownKey { path: KeyPath },
    /// A range list had more than two entries; first and last were used.
    AmbiguousRange {
        filter: String,
        axis: Axis,
        endpoints: Vec<i64>,
    },
    /// Every pixel of the grid is masked.
    FullyMasked { pixels: usize },
    /// An enabled filter flagged nothing new.
    EmptyFilter { filter: String },
    /// An old configuration key has no counterpart in the new schema.
    MigrationDropped { path: KeyPath },
    /// An old value could not be carried over; the new default was kept.
    MigrationIncompatible { path: KeyPath, reason: String },
    /// A fallback value trim found no usable parameters and did nothing.
    TrimSkipped { filter: String },
}

impl Warning {
    /// Forwards the warning to the logger.
    pub fn emit(&self) {
        log::warn!("{self}");
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownKey { path } => {
                write!(f, "configuration key `{path}` is not part of the schema; ignored")
            }
            Warning::AmbiguousRange {
                filter,
                axis,
                endpoints,
            } => write!(
                f,
                "filter `{filter}`: {axis} range has {} entries {endpoints:?}; \
                 using the first and last as endpoints",
                endpoints.len()
            ),
            Warning::FullyMasked { pixels } => {
                write!(f, "all {pixels} pixels are masked")
            }
            Warning::EmptyFilter { filter } => {
                write!(f, "filter `{filter}` flagged no additional pixels")
            }
            Warning::MigrationDropped { path } => write!(
                f,
                "configuration key `{path}` has no counterpart in the new schema; dropped"
            ),
            Warning::MigrationIncompatible { path, reason } => write!(
                f,
                "configuration key `{path}` could not be migrated ({reason}); default kept"
            ),
            Warning::TrimSkipped { filter } => write!(
                f,
                "filter `{filter}`: no usable trim parameters; nothing trimmed"
            ),
        }
    }
}
