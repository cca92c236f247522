//! Runtime settings of the pipeline itself.
#![allow(clippy::missing_errors_doc)]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use smeargle_core::{ConfigurationError, Error, Result};

/// Settings shared by every mask computation of a run.
///
/// Unlike a configuration tree these are not versioned; missing fields in
/// a settings document take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Absolute tolerance for exact-value comparisons (default: 1e-8).
    pub float_equality_tolerance: f64,
    /// Directory, relative to the output root, that masks are written to.
    pub mask_subdirectory: String,
    /// Warn when an enabled filter flags no additional pixels.
    pub warn_on_empty_filter: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            float_equality_tolerance: 1e-8,
            mask_subdirectory: "masks".to_string(),
            warn_on_empty_filter: false,
        }
    }
}

impl Settings {
    /// Load settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).map_err(|e| Error::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let settings: Self =
            serde_json::from_reader(reader).map_err(|e| Error::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Set the exact-value tolerance.
    #[must_use]
    pub fn with_float_equality_tolerance(mut self, tolerance: f64) -> Self {
        self.float_equality_tolerance = tolerance;
        self
    }

    /// Set the mask output subdirectory.
    #[must_use]
    pub fn with_mask_subdirectory(mut self, subdirectory: impl Into<String>) -> Self {
        self.mask_subdirectory = subdirectory.into();
        self
    }

    /// Enable or disable empty-filter warnings.
    #[must_use]
    pub fn with_warn_on_empty_filter(mut self, warn: bool) -> Self {
        self.warn_on_empty_filter = warn;
        self
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if !self.float_equality_tolerance.is_finite() || self.float_equality_tolerance < 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                filter: "settings",
                reason: format!(
                    "float_equality_tolerance must be finite and non-negative, got {}",
                    self.float_equality_tolerance
                ),
            });
        }
        if self.mask_subdirectory.trim().is_empty() {
            return Err(ConfigurationError::InvalidParameter {
                filter: "settings",
                reason: "mask_subdirectory must not be empty".into(),
            });
        }
        Ok(())
    }
}
