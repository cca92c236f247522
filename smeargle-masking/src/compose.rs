//! Mask composition: ordered, OR-only accumulation of filter masks.
#![allow(clippy::missing_errors_doc)]

use ndarray::Zip;
use smeargle_config::Settings;
use smeargle_core::{
    blank_mask, count_masked, DataGrid, Mask, ProvenanceEntry, ProvenanceRecord, Result, Warning,
};

use crate::filter::FilterDescriptor;

/// Result of one composition run.
#[derive(Clone, Debug, PartialEq)]
pub struct Composition {
    /// Union of every enabled filter's mask.
    pub mask: Mask,
    /// One entry per invoked filter, in invocation order.
    pub provenance: ProvenanceRecord,
    /// Advisory warnings raised while composing.
    pub warnings: Vec<Warning>,
}

impl Composition {
    /// Number of excluded pixels in the composite.
    #[must_use]
    pub fn masked_count(&self) -> usize {
        count_masked(&self.mask)
    }
}

/// Applies filter descriptors to a grid in fixed precedence order.
///
/// Enabled descriptors run sorted by [`crate::FilterKind`], which orders
/// by mask class first. Accumulation starts all-valid and only ever sets
/// pixels. The first filter error aborts the run and no partial mask is
/// returned.
#[derive(Clone, Debug, Default)]
pub struct MaskComposer {
    settings: Settings,
}

impl MaskComposer {
    /// Create with custom settings.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Settings used by filters that need them.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Composes the enabled descriptors into one mask.
    pub fn compose(&self, grid: &DataGrid, descriptors: &[FilterDescriptor]) -> Result<Composition> {
        let mut enabled: Vec<&FilterDescriptor> =
            descriptors.iter().filter(|d| d.enabled).collect();
        enabled.sort_by_key(|d| d.kind());

        let mut mask = blank_mask(grid.shape());
        let mut provenance = ProvenanceRecord::new();
        let mut warnings = Vec::new();

        for descriptor in enabled {
            let kind = descriptor.kind();
            let filter_mask = descriptor.filter.apply(grid, &self.settings)?;

            let mut newly_flagged = 0usize;
            Zip::from(&mut mask)
                .and(&filter_mask)
                .for_each(|composite, &flagged| {
                    if flagged && !*composite {
                        *composite = true;
                        newly_flagged += 1;
                    }
                });
            let flagged = count_masked(&filter_mask);

            log::debug!(
                "{} ({}): flagged {flagged}, {newly_flagged} new",
                kind.name(),
                kind.class()
            );
            if newly_flagged == 0 && self.settings.warn_on_empty_filter {
                warnings.push(Warning::EmptyFilter {
                    filter: kind.name().to_string(),
                });
            }
            provenance.push(ProvenanceEntry {
                filter: kind.name().to_string(),
                class: kind.class(),
                newly_flagged,
                flagged,
            });
        }

        let masked = count_masked(&mask);
        if !grid.is_empty() && masked == grid.len() {
            warnings.push(Warning::FullyMasked { pixels: masked });
        }
        for warning in &warnings {
            warning.emit();
        }

        Ok(Composition {
            mask,
            provenance,
            warnings,
        })
    }
}

/// Composes with default settings.
pub fn compose(grid: &DataGrid, descriptors: &[FilterDescriptor]) -> Result<Composition> {
    MaskComposer::default().compose(grid, descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use ndarray::{array, Array2};
    use smeargle_core::MaskClass;

    fn grid() -> DataGrid {
        DataGrid::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
    }

    #[test]
    fn test_no_enabled_filters() {
        let result = compose(&grid(), &[FilterDescriptor::disabled(Filter::Everything)]).unwrap();
        assert_eq!(result.mask, blank_mask((2, 3)));
        assert!(result.provenance.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invocation_follows_class_order() {
        let descriptors = vec![
            FilterDescriptor::enabled(Filter::Rows(vec![0])),
            FilterDescriptor::enabled(Filter::MaximumCut(5.0)),
            FilterDescriptor::enabled(Filter::MinimumCut(2.0)),
        ];
        let result = compose(&grid(), &descriptors).unwrap();
        assert_eq!(
            result.provenance.filter_names(),
            vec!["minimum_cut", "maximum_cut", "rows"]
        );
        let classes: Vec<MaskClass> = result.provenance.iter().map(|e| e.class).collect();
        assert_eq!(classes, vec![MaskClass::Soft, MaskClass::Soft, MaskClass::Arbitrary]);

        // Rows flags 3 pixels; one of them was already cut by the minimum.
        let rows = &result.provenance.entries()[2];
        assert_eq!(rows.flagged, 3);
        assert_eq!(rows.newly_flagged, 2);
        assert_eq!(result.provenance.total_newly_flagged(), result.masked_count());
    }

    #[test]
    fn test_fully_masked_warning() {
        let result = compose(&grid(), &[FilterDescriptor::enabled(Filter::Everything)]).unwrap();
        assert_eq!(result.masked_count(), 6);
        assert_eq!(result.warnings, vec![Warning::FullyMasked { pixels: 6 }]);
    }

    #[test]
    fn test_empty_filter_warning_is_opt_in() {
        let descriptors = [FilterDescriptor::enabled(Filter::Nothing)];
        assert!(compose(&grid(), &descriptors).unwrap().warnings.is_empty());

        let composer = MaskComposer::new(Settings::default().with_warn_on_empty_filter(true));
        let result = composer.compose(&grid(), &descriptors).unwrap();
        assert_eq!(
            result.warnings,
            vec![Warning::EmptyFilter {
                filter: "nothing".into()
            }]
        );
    }

    #[test]
    fn test_error_aborts() {
        let descriptors = [
            FilterDescriptor::enabled(Filter::Nothing),
            FilterDescriptor::enabled(Filter::Columns(vec![7])),
        ];
        assert!(compose(&grid(), &descriptors).is_err());
    }

    #[test]
    fn test_empty_grid_is_not_fully_masked() {
        let empty = DataGrid::new(Array2::zeros((0, 4)));
        let result = compose(&empty, &[FilterDescriptor::enabled(Filter::Everything)]).unwrap();
        assert!(result.warnings.is_empty());
    }
}
