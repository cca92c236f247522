//! Typed view of a masking configuration tree.
//!
//! [`MaskingConfig::from_tree`] reads every key the pipeline understands
//! out of a validated tree; [`MaskingConfig::resolve`] turns the enabled
//! switches into parameterized filters.
#![allow(
    missing_docs,
    clippy::missing_errors_doc,
    clippy::struct_excessive_bools
)]

use std::fmt;
use std::str::FromStr;

use smeargle_config::{extract_as, extract_optional, FromConfigValue, ValidatedTree};
use smeargle_core::{Axis, ConfigurationError, KeyPath, Mask, Warning};

use crate::filter::{Filter, FilterDescriptor, ResolvedFilters, ValueTrim};
use crate::geometric::{InclusiveRange, Rect};
use crate::statistical::SigmaClip;

type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

/// How an enabled value trim chooses its bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrimMethod {
    /// Rank-based trim by fraction.
    Percentile,
    /// Fixed lower and upper bounds.
    HardCut,
    /// Percentile if configured, else hard cut if configured, else nothing.
    Fallback,
}

impl TrimMethod {
    /// Configuration literal.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TrimMethod::Percentile => "percentile",
            TrimMethod::HardCut => "hard_cut",
            TrimMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for TrimMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrimMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentile" => Ok(TrimMethod::Percentile),
            "hard_cut" => Ok(TrimMethod::HardCut),
            "fallback" => Ok(TrimMethod::Fallback),
            other => Err(other.to_string()),
        }
    }
}

/// Externally supplied masks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FundamentalConfig {
    pub run_prior_mask: bool,
    pub run_bad_pixel_map: bool,
}

/// Readout anomalies.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnomalousConfig {
    pub run_subarray: bool,
    pub subarray_column_range: Option<Vec<i64>>,
    pub subarray_row_range: Option<Vec<i64>>,
    pub run_value_trim: bool,
    pub trim_method: Option<TrimMethod>,
    pub trim_top_percent: Option<f64>,
    pub trim_bottom_percent: Option<f64>,
    pub trim_lower_value: Option<f64>,
    pub trim_upper_value: Option<f64>,
}

/// Soft thresholds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SoftConfig {
    pub run_minimum_cut: bool,
    pub minimum_value: Option<f64>,
    pub run_maximum_cut: bool,
    pub maximum_value: Option<f64>,
}

/// Position-based filters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometricConfig {
    pub run_mask_single_pixels: bool,
    pub pixel_column_indexes: Vec<i64>,
    pub pixel_row_indexes: Vec<i64>,
    pub run_mask_rectangle: bool,
    pub rectangle_column_range: Option<Vec<i64>>,
    pub rectangle_row_range: Option<Vec<i64>>,
    pub run_mask_subarray: bool,
    pub subarray_column_range: Option<Vec<i64>>,
    pub subarray_row_range: Option<Vec<i64>>,
    pub run_mask_columns: bool,
    pub column_list: Vec<i64>,
    pub run_mask_rows: bool,
    pub row_list: Vec<i64>,
    pub run_mask_nothing: bool,
    pub run_mask_everything: bool,
}

/// Value-based filters.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticalConfig {
    pub run_sigma_clip: bool,
    pub sigma_multiple: Option<Vec<f64>>,
    pub sigma_iterations: usize,
    pub run_percent_truncation: bool,
    pub top_percent: f64,
    pub bottom_percent: f64,
    pub run_count_truncation: bool,
    pub top_count: usize,
    pub bottom_count: usize,
    pub run_exact_value: bool,
    pub exact_value: Option<f64>,
    pub run_invalid_values: bool,
}

impl Default for StatisticalConfig {
    fn default() -> Self {
        Self {
            run_sigma_clip: false,
            sigma_multiple: None,
            sigma_iterations: 1,
            run_percent_truncation: false,
            top_percent: 0.0,
            bottom_percent: 0.0,
            run_count_truncation: false,
            top_count: 0,
            bottom_count: 0,
            run_exact_value: false,
            exact_value: None,
            run_invalid_values: false,
        }
    }
}

/// Every masking switch and parameter of a configuration tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaskingConfig {
    pub fundamental: FundamentalConfig,
    pub anomalous: AnomalousConfig,
    pub soft: SoftConfig,
    pub geometric: GeometricConfig,
    pub statistical: StatisticalConfig,
}

/// Reads keys of one top-level section.
struct Section<'a> {
    tree: &'a ValidatedTree,
    name: &'static str,
}

impl Section<'_> {
    fn path(&self, key: &str) -> KeyPath {
        KeyPath::from([self.name, key])
    }

    fn get<T: FromConfigValue>(&self, key: &str) -> ConfigResult<T> {
        extract_as(self.tree, &self.path(key))
    }

    fn optional<T: FromConfigValue>(&self, key: &str) -> ConfigResult<Option<T>> {
        extract_optional(self.tree, &self.path(key))
    }
}

const FUNDAMENTAL: &str = "fundamental";
const ANOMALOUS: &str = "anomalous";
const SOFT: &str = "soft";
const GEOMETRIC: &str = "geometric";
const FILTER: &str = "filter";

fn missing(section: &str, key: &str) -> ConfigurationError {
    ConfigurationError::MissingKey {
        path: KeyPath::from([section, key]),
    }
}

fn required<T>(value: Option<T>, section: &str, key: &str) -> ConfigResult<T> {
    value.ok_or_else(|| missing(section, key))
}

impl MaskingConfig {
    /// Extracts the typed configuration from a validated tree.
    pub fn from_tree(tree: &ValidatedTree) -> ConfigResult<Self> {
        let fundamental = Section {
            tree,
            name: FUNDAMENTAL,
        };
        let anomalous = Section {
            tree,
            name: ANOMALOUS,
        };
        let soft = Section { tree, name: SOFT };
        let geometric = Section {
            tree,
            name: GEOMETRIC,
        };
        let filter = Section { tree, name: FILTER };

        let trim_method = anomalous
            .optional::<String>("trim_method")?
            .map(|method| {
                method
                    .parse::<TrimMethod>()
                    .map_err(|method| ConfigurationError::UnknownMethod {
                        path: anomalous.path("trim_method"),
                        method,
                    })
            })
            .transpose()?;

        Ok(Self {
            fundamental: FundamentalConfig {
                run_prior_mask: fundamental.get("run_prior_mask")?,
                run_bad_pixel_map: fundamental.get("run_bad_pixel_map")?,
            },
            anomalous: AnomalousConfig {
                run_subarray: anomalous.get("run_subarray")?,
                subarray_column_range: anomalous.optional("subarray_column_range")?,
                subarray_row_range: anomalous.optional("subarray_row_range")?,
                run_value_trim: anomalous.get("run_value_trim")?,
                trim_method,
                trim_top_percent: anomalous.optional("trim_top_percent")?,
                trim_bottom_percent: anomalous.optional("trim_bottom_percent")?,
                trim_lower_value: anomalous.optional("trim_lower_value")?,
                trim_upper_value: anomalous.optional("trim_upper_value")?,
            },
            soft: SoftConfig {
                run_minimum_cut: soft.get("run_minimum_cut")?,
                minimum_value: soft.optional("minimum_value")?,
                run_maximum_cut: soft.get("run_maximum_cut")?,
                maximum_value: soft.optional("maximum_value")?,
            },
            geometric: GeometricConfig {
                run_mask_single_pixels: geometric.get("run_mask_single_pixels")?,
                pixel_column_indexes: geometric.get("pixel_column_indexes")?,
                pixel_row_indexes: geometric.get("pixel_row_indexes")?,
                run_mask_rectangle: geometric.get("run_mask_rectangle")?,
                rectangle_column_range: geometric.optional("rectangle_column_range")?,
                rectangle_row_range: geometric.optional("rectangle_row_range")?,
                run_mask_subarray: geometric.get("run_mask_subarray")?,
                subarray_column_range: geometric.optional("subarray_column_range")?,
                subarray_row_range: geometric.optional("subarray_row_range")?,
                run_mask_columns: geometric.get("run_mask_columns")?,
                column_list: geometric.get("column_list")?,
                run_mask_rows: geometric.get("run_mask_rows")?,
                row_list: geometric.get("row_list")?,
                run_mask_nothing: geometric.get("run_mask_nothing")?,
                run_mask_everything: geometric.get("run_mask_everything")?,
            },
            statistical: StatisticalConfig {
                run_sigma_clip: filter.get("run_filter_sigma_value")?,
                sigma_multiple: filter.optional("sigma_multiple")?,
                sigma_iterations: filter.get("sigma_iterations")?,
                run_percent_truncation: filter.get("run_filter_percent_truncation")?,
                top_percent: filter.get("top_percent")?,
                bottom_percent: filter.get("bottom_percent")?,
                run_count_truncation: filter.get("run_filter_pixel_truncation")?,
                top_count: filter.get("top_count")?,
                bottom_count: filter.get("bottom_count")?,
                run_exact_value: filter.get("run_filter_exact_value")?,
                exact_value: filter.optional("exact_value")?,
                run_invalid_values: filter.get("run_filter_invalid_value")?,
            },
        })
    }

    /// Builds a descriptor for every enabled filter.
    ///
    /// Parameters of disabled filters are never read. An enabled filter
    /// whose parameters are missing is an error.
    pub fn resolve(&self, bad_pixel_map: Option<&Mask>) -> ConfigResult<ResolvedFilters> {
        let mut warnings = Vec::new();
        let mut filters = Vec::new();

        let fundamental = &self.fundamental;
        if fundamental.run_prior_mask {
            filters.push(Filter::PriorMask);
        }
        if fundamental.run_bad_pixel_map {
            let map = bad_pixel_map.ok_or_else(|| ConfigurationError::InvalidParameter {
                filter: "bad_pixel_map",
                reason: "enabled but no bad pixel map was supplied".into(),
            })?;
            filters.push(Filter::BadPixelMap(map.clone()));
        }

        let anomalous = &self.anomalous;
        if anomalous.run_subarray {
            let rect = rect_from(
                "subarray_restriction",
                ANOMALOUS,
                ("subarray_column_range", anomalous.subarray_column_range.as_deref()),
                ("subarray_row_range", anomalous.subarray_row_range.as_deref()),
                &mut warnings,
            )?;
            filters.push(Filter::SubarrayRestriction(rect));
        }
        if anomalous.run_value_trim {
            filters.push(Filter::ValueTrim(self.value_trim(&mut warnings)?));
        }

        let soft = &self.soft;
        if soft.run_minimum_cut {
            let minimum = required(soft.minimum_value, SOFT, "minimum_value")?;
            filters.push(Filter::MinimumCut(minimum));
        }
        if soft.run_maximum_cut {
            let maximum = required(soft.maximum_value, SOFT, "maximum_value")?;
            filters.push(Filter::MaximumCut(maximum));
        }

        let geometric = &self.geometric;
        if geometric.run_mask_single_pixels {
            filters.push(Filter::SinglePixels {
                columns: geometric.pixel_column_indexes.clone(),
                rows: geometric.pixel_row_indexes.clone(),
            });
        }
        if geometric.run_mask_rectangle {
            let rect = rect_from(
                "rectangle",
                GEOMETRIC,
                ("rectangle_column_range", geometric.rectangle_column_range.as_deref()),
                ("rectangle_row_range", geometric.rectangle_row_range.as_deref()),
                &mut warnings,
            )?;
            filters.push(Filter::Rectangle(rect));
        }
        if geometric.run_mask_subarray {
            let rect = rect_from(
                "subarray",
                GEOMETRIC,
                ("subarray_column_range", geometric.subarray_column_range.as_deref()),
                ("subarray_row_range", geometric.subarray_row_range.as_deref()),
                &mut warnings,
            )?;
            filters.push(Filter::Subarray(rect));
        }
        if geometric.run_mask_columns {
            filters.push(Filter::Columns(geometric.column_list.clone()));
        }
        if geometric.run_mask_rows {
            filters.push(Filter::Rows(geometric.row_list.clone()));
        }
        if geometric.run_mask_nothing {
            filters.push(Filter::Nothing);
        }
        if geometric.run_mask_everything {
            filters.push(Filter::Everything);
        }

        let statistical = &self.statistical;
        if statistical.run_sigma_clip {
            let multiples = required(statistical.sigma_multiple.as_deref(), FILTER, "sigma_multiple")?;
            let clip = SigmaClip::from_multiples(multiples, statistical.sigma_iterations)?;
            filters.push(Filter::SigmaClip(clip));
        }
        if statistical.run_percent_truncation {
            filters.push(Filter::PercentTruncation {
                top: statistical.top_percent,
                bottom: statistical.bottom_percent,
            });
        }
        if statistical.run_count_truncation {
            filters.push(Filter::CountTruncation {
                top: statistical.top_count,
                bottom: statistical.bottom_count,
            });
        }
        if statistical.run_exact_value {
            let value = required(statistical.exact_value, FILTER, "exact_value")?;
            filters.push(Filter::ExactValue(value));
        }
        if statistical.run_invalid_values {
            filters.push(Filter::InvalidValues);
        }

        Ok(ResolvedFilters {
            descriptors: filters.into_iter().map(FilterDescriptor::enabled).collect(),
            warnings,
        })
    }

    fn value_trim(&self, warnings: &mut Vec<Warning>) -> ConfigResult<ValueTrim> {
        let anomalous = &self.anomalous;
        let method = required(anomalous.trim_method, ANOMALOUS, "trim_method")?;

        let percentile = match (anomalous.trim_top_percent, anomalous.trim_bottom_percent) {
            (None, None) => None,
            (top, bottom) => Some(ValueTrim::Percentile {
                top: top.unwrap_or(0.0),
                bottom: bottom.unwrap_or(0.0),
            }),
        };
        let hard_cut = match (anomalous.trim_lower_value, anomalous.trim_upper_value) {
            (Some(lower), Some(upper)) => Ok(ValueTrim::HardCut { lower, upper }),
            (None, _) => Err(missing(ANOMALOUS, "trim_lower_value")),
            (_, None) => Err(missing(ANOMALOUS, "trim_upper_value")),
        };

        match method {
            TrimMethod::Percentile => percentile.ok_or_else(|| missing(ANOMALOUS, "trim_top_percent")),
            TrimMethod::HardCut => hard_cut,
            TrimMethod::Fallback => Ok(percentile.or_else(|| hard_cut.ok()).unwrap_or_else(|| {
                warnings.push(Warning::TrimSkipped {
                    filter: "value_trim".into(),
                });
                ValueTrim::Skip
            })),
        }
    }
}

fn rect_from(
    filter: &'static str,
    section: &str,
    columns: (&str, Option<&[i64]>),
    rows: (&str, Option<&[i64]>),
    warnings: &mut Vec<Warning>,
) -> ConfigResult<Rect> {
    let column_endpoints = required(columns.1, section, columns.0)?;
    let row_endpoints = required(rows.1, section, rows.0)?;
    Ok(Rect::new(
        InclusiveRange::from_endpoints(filter, Axis::Column, column_endpoints, warnings)?,
        InclusiveRange::from_endpoints(filter, Axis::Row, row_endpoints, warnings)?,
    ))
}
