//! Pipeline dispatch: configuration tree + grid -> composite mask.
#![allow(clippy::missing_errors_doc, clippy::cast_precision_loss)]

use smeargle_config::{current_schema, Schema, Settings, ValidatedTree};
use smeargle_core::{ConfigurationError, DataGrid, Mask, ProvenanceRecord, Result, Warning};

use crate::compose::MaskComposer;
use crate::config::MaskingConfig;
use crate::filter::ResolvedFilters;

/// Outcome of one dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchReport {
    /// Composite mask, `true` = excluded.
    pub mask: Mask,
    /// Filters invoked and the pixels each newly flagged.
    pub provenance: ProvenanceRecord,
    /// Warnings from filter resolution and composition.
    pub warnings: Vec<Warning>,
    /// Excluded pixel count.
    pub masked_count: usize,
    /// Total pixel count of the grid.
    pub total_pixels: usize,
}

impl DispatchReport {
    /// Fraction of excluded pixels; 0 for an empty grid.
    #[must_use]
    pub fn masked_fraction(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.masked_count as f64 / self.total_pixels as f64
        }
    }
}

/// Runs configured mask compositions for one schema revision.
///
/// A dispatcher holds no per-grid state and can be shared across threads;
/// each call reads the tree and the grid without modifying either.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    schema_version: String,
    composer: MaskComposer,
}

impl Dispatcher {
    /// Create a dispatcher accepting trees written for `schema`.
    #[must_use]
    pub fn new(schema: &Schema, settings: Settings) -> Self {
        Self {
            schema_version: schema.version().to_string(),
            composer: MaskComposer::new(settings),
        }
    }

    /// Create a dispatcher for the current built-in schema.
    pub fn current(settings: Settings) -> Result<Self> {
        Ok(Self::new(&current_schema()?, settings))
    }

    /// Schema version trees must declare.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Settings passed to filters.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.composer.settings()
    }

    /// Refuses trees written for another schema revision.
    pub fn check_version(&self, tree: &ValidatedTree) -> std::result::Result<(), ConfigurationError> {
        if tree.config_spec() != self.schema_version {
            return Err(ConfigurationError::StaleSchema {
                found: tree.config_spec().to_string(),
                expected: self.schema_version.clone(),
            });
        }
        Ok(())
    }

    /// Resolves the enabled filters and checks every one of them against
    /// the grid. Nothing is computed.
    pub fn resolve(
        &self,
        tree: &ValidatedTree,
        grid: &DataGrid,
        bad_pixel_map: Option<&Mask>,
    ) -> Result<ResolvedFilters> {
        self.check_version(tree)?;
        let config = MaskingConfig::from_tree(tree)?;
        let resolved = config.resolve(bad_pixel_map)?;
        for descriptor in &resolved.descriptors {
            descriptor.filter.validate(grid)?;
        }
        Ok(resolved)
    }

    /// Computes the composite mask of `grid` as configured by `tree`.
    pub fn run(&self, tree: &ValidatedTree, grid: &DataGrid) -> Result<DispatchReport> {
        self.dispatch(tree, grid, None)
    }

    /// Like [`Dispatcher::run`], supplying the bad pixel map used when
    /// `fundamental.run_bad_pixel_map` is enabled.
    pub fn run_with_bad_pixels(
        &self,
        tree: &ValidatedTree,
        grid: &DataGrid,
        bad_pixel_map: &Mask,
    ) -> Result<DispatchReport> {
        self.dispatch(tree, grid, Some(bad_pixel_map))
    }

    fn dispatch(
        &self,
        tree: &ValidatedTree,
        grid: &DataGrid,
        bad_pixel_map: Option<&Mask>,
    ) -> Result<DispatchReport> {
        let resolved = self.resolve(tree, grid, bad_pixel_map)?;
        for warning in &resolved.warnings {
            warning.emit();
        }

        let composition = self.composer.compose(grid, &resolved.descriptors)?;
        let masked_count = composition.masked_count();
        let total_pixels = grid.len();
        log::info!(
            "masked {masked_count}/{total_pixels} pixels with {} filters",
            composition.provenance.len()
        );

        let mut warnings = resolved.warnings;
        warnings.extend(composition.warnings);
        Ok(DispatchReport {
            mask: composition.mask,
            provenance: composition.provenance,
            warnings,
            masked_count,
            total_pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use serde_json::json;
    use smeargle_config::{schema_for, validate};
    use smeargle_core::Error;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_dispatcher_is_shareable() {
        assert_send_sync::<Dispatcher>();
        assert_send_sync::<ValidatedTree>();
    }

    #[test]
    fn test_stale_tree_is_refused() {
        let v1 = schema_for("smeargle-masking-1").unwrap();
        let tree = validate(&json!({"echo399": {"run": true}}), &v1).unwrap();
        let dispatcher = Dispatcher::current(Settings::default()).unwrap();
        let grid = DataGrid::new(Array2::zeros((2, 2)));
        assert!(matches!(
            dispatcher.run(&tree, &grid),
            Err(Error::Configuration(ConfigurationError::StaleSchema { .. }))
        ));
    }

    #[test]
    fn test_report_counts() {
        let tree = validate(
            &json!({"geometric": {"run_mask_columns": true, "column_list": [0]}}),
            &current_schema().unwrap(),
        )
        .unwrap();
        let dispatcher = Dispatcher::current(Settings::default()).unwrap();
        let report = dispatcher
            .run(&tree, &DataGrid::new(Array2::zeros((3, 4))))
            .unwrap();
        assert_eq!(report.masked_count, 3);
        assert_eq!(report.total_pixels, 12);
        assert_relative_eq!(report.masked_fraction(), 0.25);
        assert_eq!(report.provenance.filter_names(), vec!["columns"]);
    }
}
