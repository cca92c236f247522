//! Filter registry and parameterized filter invocations.
#![allow(clippy::missing_errors_doc)]

use std::fmt;

use smeargle_core::{Axis, ConfigurationError, DataGrid, Mask, MaskClass, Result, Warning};
use smeargle_config::Settings;

use crate::geometric::{self, checked_index, checked_rect, Rect};
use crate::statistical::{self, check_hard_cut, check_rank_counts, SigmaClip};

/// Every filter the library knows, declared in application order.
///
/// The derived ordering sorts by mask class first, then by the fixed
/// position of the filter within its class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FilterKind {
    /// Mask carried by the grid from upstream processing.
    PriorMask,
    /// Caller-supplied bad pixel map.
    BadPixelMap,
    /// Everything outside the readout subarray.
    SubarrayRestriction,
    /// Percentile or hard-cut trim of extreme values.
    ValueTrim,
    /// Values strictly below a minimum.
    MinimumCut,
    /// Values strictly above a maximum.
    MaximumCut,
    /// Individual pixels.
    SinglePixels,
    /// An inclusive rectangle.
    Rectangle,
    /// Everything outside an inclusive rectangle.
    Subarray,
    /// Whole columns.
    Columns,
    /// Whole rows.
    Rows,
    /// No pixel.
    Nothing,
    /// Every pixel.
    Everything,
    /// Iterative sigma clip.
    SigmaClip,
    /// Highest and lowest fractions of pixels.
    PercentTruncation,
    /// Highest and lowest counts of pixels.
    CountTruncation,
    /// Values equal to a target within tolerance.
    ExactValue,
    /// NaN and infinite values.
    InvalidValues,
}

impl FilterKind {
    /// All kinds in application order.
    pub const ALL: [FilterKind; 18] = [
        FilterKind::PriorMask,
        FilterKind::BadPixelMap,
        FilterKind::SubarrayRestriction,
        FilterKind::ValueTrim,
        FilterKind::MinimumCut,
        FilterKind::MaximumCut,
        FilterKind::SinglePixels,
        FilterKind::Rectangle,
        FilterKind::Subarray,
        FilterKind::Columns,
        FilterKind::Rows,
        FilterKind::Nothing,
        FilterKind::Everything,
        FilterKind::SigmaClip,
        FilterKind::PercentTruncation,
        FilterKind::CountTruncation,
        FilterKind::ExactValue,
        FilterKind::InvalidValues,
    ];

    /// Owning mask class.
    #[must_use]
    pub fn class(self) -> MaskClass {
        match self {
            FilterKind::PriorMask | FilterKind::BadPixelMap => MaskClass::Fundamental,
            FilterKind::SubarrayRestriction | FilterKind::ValueTrim => MaskClass::Anomalous,
            FilterKind::MinimumCut | FilterKind::MaximumCut => MaskClass::Soft,
            _ => MaskClass::Arbitrary,
        }
    }

    /// Stable identifier used in provenance and logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::PriorMask => "prior_mask",
            FilterKind::BadPixelMap => "bad_pixel_map",
            FilterKind::SubarrayRestriction => "subarray_restriction",
            FilterKind::ValueTrim => "value_trim",
            FilterKind::MinimumCut => "minimum_cut",
            FilterKind::MaximumCut => "maximum_cut",
            FilterKind::SinglePixels => "single_pixels",
            FilterKind::Rectangle => "rectangle",
            FilterKind::Subarray => "subarray",
            FilterKind::Columns => "columns",
            FilterKind::Rows => "rows",
            FilterKind::Nothing => "nothing",
            FilterKind::Everything => "everything",
            FilterKind::SigmaClip => "sigma_clip",
            FilterKind::PercentTruncation => "percent_truncation",
            FilterKind::CountTruncation => "count_truncation",
            FilterKind::ExactValue => "exact_value",
            FilterKind::InvalidValues => "invalid_values",
        }
    }

    /// Looks a kind up by its identifier.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the anomalous value trim picks its bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueTrim {
    /// Trim the highest `top` and lowest `bottom` fractions of pixels.
    Percentile {
        /// Fraction trimmed from the top.
        top: f64,
        /// Fraction trimmed from the bottom.
        bottom: f64,
    },
    /// Trim values outside `[lower, upper]`.
    HardCut {
        /// Lowest kept value.
        lower: f64,
        /// Highest kept value.
        upper: f64,
    },
    /// Nothing usable was configured; trims nothing.
    Skip,
}

/// A filter together with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// The grid's own upstream mask.
    PriorMask,
    /// An externally supplied mask.
    BadPixelMap(Mask),
    /// Flag everything outside the rectangle.
    SubarrayRestriction(Rect),
    /// Trim extreme values.
    ValueTrim(ValueTrim),
    /// Flag values below the minimum.
    MinimumCut(f64),
    /// Flag values above the maximum.
    MaximumCut(f64),
    /// Flag pixels at parallel column and row index lists.
    SinglePixels {
        /// Column of each pixel.
        columns: Vec<i64>,
        /// Row of each pixel.
        rows: Vec<i64>,
    },
    /// Flag an inclusive rectangle.
    Rectangle(Rect),
    /// Flag everything outside an inclusive rectangle.
    Subarray(Rect),
    /// Flag whole columns.
    Columns(Vec<i64>),
    /// Flag whole rows.
    Rows(Vec<i64>),
    /// Flag no pixel.
    Nothing,
    /// Flag every pixel.
    Everything,
    /// Iterative sigma clip.
    SigmaClip(SigmaClip),
    /// Fractions of highest and lowest pixels.
    PercentTruncation {
        /// Fraction flagged from the top.
        top: f64,
        /// Fraction flagged from the bottom.
        bottom: f64,
    },
    /// Counts of highest and lowest pixels.
    CountTruncation {
        /// Number flagged from the top.
        top: usize,
        /// Number flagged from the bottom.
        bottom: usize,
    },
    /// Values equal to a target within the configured tolerance.
    ExactValue(f64),
    /// NaN and infinite values.
    InvalidValues,
}

impl Filter {
    /// The registry entry of this filter.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::PriorMask => FilterKind::PriorMask,
            Filter::BadPixelMap(_) => FilterKind::BadPixelMap,
            Filter::SubarrayRestriction(_) => FilterKind::SubarrayRestriction,
            Filter::ValueTrim(_) => FilterKind::ValueTrim,
            Filter::MinimumCut(_) => FilterKind::MinimumCut,
            Filter::MaximumCut(_) => FilterKind::MaximumCut,
            Filter::SinglePixels { .. } => FilterKind::SinglePixels,
            Filter::Rectangle(_) => FilterKind::Rectangle,
            Filter::Subarray(_) => FilterKind::Subarray,
            Filter::Columns(_) => FilterKind::Columns,
            Filter::Rows(_) => FilterKind::Rows,
            Filter::Nothing => FilterKind::Nothing,
            Filter::Everything => FilterKind::Everything,
            Filter::SigmaClip(_) => FilterKind::SigmaClip,
            Filter::PercentTruncation { .. } => FilterKind::PercentTruncation,
            Filter::CountTruncation { .. } => FilterKind::CountTruncation,
            Filter::ExactValue(_) => FilterKind::ExactValue,
            Filter::InvalidValues => FilterKind::InvalidValues,
        }
    }

    /// Checks parameters against the grid without computing a mask.
    pub fn validate(&self, grid: &DataGrid) -> Result<()> {
        let name = self.kind().name();
        match self {
            Filter::PriorMask => {
                if grid.prior_mask().is_none() {
                    return Err(ConfigurationError::InvalidParameter {
                        filter: name,
                        reason: "the grid carries no prior mask".into(),
                    }
                    .into());
                }
            }
            Filter::BadPixelMap(map) => {
                if map.dim() != grid.shape() {
                    return Err(ConfigurationError::ShapeMismatch {
                        filter: name,
                        expected: grid.shape(),
                        found: map.dim(),
                    }
                    .into());
                }
            }
            Filter::SubarrayRestriction(rect) | Filter::Rectangle(rect) | Filter::Subarray(rect) => {
                checked_rect(name, grid, rect)?;
            }
            Filter::ValueTrim(trim) => match *trim {
                ValueTrim::Percentile { top, bottom } => check_fractions(name, top, bottom)?,
                ValueTrim::HardCut { lower, upper } => check_hard_cut(lower, upper)?,
                ValueTrim::Skip => {}
            },
            Filter::MinimumCut(v) | Filter::MaximumCut(v) | Filter::ExactValue(v) => {
                if !v.is_finite() {
                    return Err(ConfigurationError::InvalidParameter {
                        filter: name,
                        reason: format!("threshold {v} is not finite"),
                    }
                    .into());
                }
            }
            Filter::SinglePixels { columns, rows } => {
                if columns.len() != rows.len() {
                    return Err(ConfigurationError::MismatchedLengths {
                        filter: name,
                        left: "column indexes",
                        left_len: columns.len(),
                        right: "row indexes",
                        right_len: rows.len(),
                    }
                    .into());
                }
                check_indexes(name, Axis::Column, columns, grid.columns())?;
                check_indexes(name, Axis::Row, rows, grid.rows())?;
            }
            Filter::Columns(columns) => {
                check_indexes(name, Axis::Column, columns, grid.columns())?;
            }
            Filter::Rows(rows) => {
                check_indexes(name, Axis::Row, rows, grid.rows())?;
            }
            Filter::SigmaClip(clip) => clip.validate()?,
            Filter::PercentTruncation { top, bottom } => check_fractions(name, *top, *bottom)?,
            Filter::CountTruncation { top, bottom } => {
                check_rank_counts(grid, *top, *bottom, name)?;
            }
            Filter::Nothing | Filter::Everything | Filter::InvalidValues => {}
        }
        Ok(())
    }

    /// Computes this filter's mask. The grid is never modified.
    pub fn apply(&self, grid: &DataGrid, settings: &Settings) -> Result<Mask> {
        let name = self.kind().name();
        let mask = match self {
            Filter::PriorMask => grid.prior_mask().cloned().ok_or_else(|| {
                ConfigurationError::InvalidParameter {
                    filter: name,
                    reason: "the grid carries no prior mask".into(),
                }
            })?,
            Filter::BadPixelMap(map) => {
                if map.dim() != grid.shape() {
                    return Err(ConfigurationError::ShapeMismatch {
                        filter: name,
                        expected: grid.shape(),
                        found: map.dim(),
                    }
                    .into());
                }
                map.clone()
            }
            Filter::SubarrayRestriction(rect) => geometric::outside(grid, rect, name)?,
            Filter::ValueTrim(trim) => match *trim {
                ValueTrim::Percentile { top, bottom } => {
                    statistical::percent_truncation(grid, top, bottom)?
                }
                ValueTrim::HardCut { lower, upper } => statistical::hard_cut(grid, lower, upper)?,
                ValueTrim::Skip => geometric::nothing(grid),
            },
            Filter::MinimumCut(minimum) => statistical::minimum_cut(grid, *minimum),
            Filter::MaximumCut(maximum) => statistical::maximum_cut(grid, *maximum),
            Filter::SinglePixels { columns, rows } => geometric::single_pixels(grid, columns, rows)?,
            Filter::Rectangle(rect) => geometric::rectangle(grid, rect)?,
            Filter::Subarray(rect) => geometric::subarray(grid, rect)?,
            Filter::Columns(columns) => geometric::columns(grid, columns)?,
            Filter::Rows(rows) => geometric::rows(grid, rows)?,
            Filter::Nothing => geometric::nothing(grid),
            Filter::Everything => geometric::everything(grid),
            Filter::SigmaClip(clip) => statistical::sigma_clip(grid, clip)?,
            Filter::PercentTruncation { top, bottom } => {
                statistical::percent_truncation(grid, *top, *bottom)?
            }
            Filter::CountTruncation { top, bottom } => {
                statistical::count_truncation(grid, *top, *bottom)?
            }
            Filter::ExactValue(value) => {
                statistical::exact_value(grid, *value, settings.float_equality_tolerance)
            }
            Filter::InvalidValues => statistical::invalid_values(grid),
        };
        Ok(mask)
    }
}

fn check_indexes(
    filter: &'static str,
    axis: Axis,
    indexes: &[i64],
    len: usize,
) -> Result<()> {
    for &index in indexes {
        checked_index(filter, axis, index, len)?;
    }
    Ok(())
}

fn check_fractions(filter: &'static str, top: f64, bottom: f64) -> Result<()> {
    for (name, fraction) in [("top", top), ("bottom", bottom)] {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigurationError::InvalidParameter {
                filter,
                reason: format!("{name} fraction must lie in [0, 1], got {fraction}"),
            }
            .into());
        }
    }
    Ok(())
}

/// A filter and whether it takes part in a composition run.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterDescriptor {
    /// The parameterized filter.
    pub filter: Filter,
    /// Disabled descriptors are neither invoked nor recorded.
    pub enabled: bool,
}

impl FilterDescriptor {
    /// An enabled descriptor.
    #[must_use]
    pub fn enabled(filter: Filter) -> Self {
        Self {
            filter,
            enabled: true,
        }
    }

    /// A disabled descriptor.
    #[must_use]
    pub fn disabled(filter: Filter) -> Self {
        Self {
            filter,
            enabled: false,
        }
    }

    /// Registry entry of the wrapped filter.
    #[must_use]
    pub fn kind(&self) -> FilterKind {
        self.filter.kind()
    }

    /// Owning mask class of the wrapped filter.
    #[must_use]
    pub fn class(&self) -> MaskClass {
        self.filter.kind().class()
    }
}

/// Resolved filter list plus warnings raised while resolving it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedFilters {
    /// Descriptors in configuration order.
    pub descriptors: Vec<FilterDescriptor>,
    /// Advisory warnings (ambiguous ranges, skipped trims).
    pub warnings: Vec<Warning>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometric::InclusiveRange;
    use ndarray::Array2;
    use smeargle_core::{blank_mask, Error};

    #[test]
    fn test_kind_order_follows_class_order() {
        let mut sorted = FilterKind::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, FilterKind::ALL.to_vec());
        for pair in FilterKind::ALL.windows(2) {
            assert!(pair[0].class() <= pair[1].class());
        }
    }

    #[test]
    fn test_names_round_trip() {
        for kind in FilterKind::ALL {
            assert_eq!(FilterKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FilterKind::from_name("echo399"), None);
    }

    #[test]
    fn test_validate_catches_bounds_without_running() {
        let grid = DataGrid::new(Array2::zeros((4, 4)));
        let rect = Rect::new(
            InclusiveRange::new(0, 4).unwrap(),
            InclusiveRange::new(0, 1).unwrap(),
        );
        assert!(matches!(
            Filter::Rectangle(rect).validate(&grid),
            Err(Error::Bounds(_))
        ));
        assert!(Filter::Rows(vec![3]).validate(&grid).is_ok());
        assert!(Filter::PriorMask.validate(&grid).is_err());
        assert!(matches!(
            Filter::BadPixelMap(blank_mask((2, 2))).validate(&grid),
            Err(Error::Configuration(ConfigurationError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_validate_checks_rank_counts() {
        let mut values = Array2::<f64>::zeros((3, 4));
        values[[1, 1]] = f64::NAN;
        let grid = DataGrid::new(values);

        let too_many = Filter::CountTruncation { top: 12, bottom: 0 };
        assert!(matches!(
            too_many.validate(&grid),
            Err(Error::Configuration(ConfigurationError::InvalidParameter {
                filter: "count_truncation",
                ..
            }))
        ));
        assert!(Filter::CountTruncation { top: 0, bottom: 12 }
            .validate(&grid)
            .is_err());
        assert!(Filter::CountTruncation { top: 11, bottom: 11 }
            .validate(&grid)
            .is_ok());
    }

    #[test]
    fn test_value_trim_skip_flags_nothing() {
        let grid = DataGrid::new(Array2::from_elem((2, 2), 1.0));
        let mask = Filter::ValueTrim(ValueTrim::Skip)
            .apply(&grid, &Settings::default())
            .unwrap();
        assert_eq!(mask, blank_mask((2, 2)));
    }

    #[test]
    fn test_exact_value_reads_tolerance_from_settings() {
        let grid = DataGrid::new(Array2::from_elem((1, 2), 1.0005));
        let loose = Settings::default().with_float_equality_tolerance(1e-3);
        let filter = Filter::ExactValue(1.0);
        assert!(filter.apply(&grid, &loose).unwrap()[[0, 0]]);
        assert!(!filter.apply(&grid, &Settings::default()).unwrap()[[0, 0]]);
    }
}
