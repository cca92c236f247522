//! Value-based filters: thresholds, sigma clipping, rank truncation.
//!
//! Non-finite pixels never take part in statistics or ranking and are left
//! unflagged by every filter here except [`invalid_values`].
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]

use ndarray::Zip;
use smeargle_core::{blank_mask, ConfigurationError, DataGrid, Mask, Result};

/// Slack applied before flooring `n * percent`, so that e.g.
/// `10 * 0.3 = 2.9999999999999996` still yields 3.
const PERCENT_ROUNDING_GUARD: f64 = 1e-9;

/// Flags pixels strictly below `minimum`; equal values are kept.
#[must_use]
pub fn minimum_cut(grid: &DataGrid, minimum: f64) -> Mask {
    grid.values().mapv(|v| v < minimum)
}

/// Flags pixels strictly above `maximum`; equal values are kept.
#[must_use]
pub fn maximum_cut(grid: &DataGrid, maximum: f64) -> Mask {
    grid.values().mapv(|v| v > maximum)
}

/// Flags pixels below `lower` or above `upper`. Requires `lower < upper`.
pub fn hard_cut(grid: &DataGrid, lower: f64, upper: f64) -> Result<Mask> {
    check_hard_cut(lower, upper)?;
    Ok(grid.values().mapv(|v| v < lower || v > upper))
}

pub(crate) fn check_hard_cut(
    lower: f64,
    upper: f64,
) -> std::result::Result<(), ConfigurationError> {
    if lower.is_nan() || upper.is_nan() || lower >= upper {
        return Err(ConfigurationError::InvalidParameter {
            filter: "hard_cut",
            reason: format!("lower bound {lower} must be below upper bound {upper}"),
        });
    }
    Ok(())
}

/// Parameters of an iterative sigma clip.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SigmaClip {
    /// Multiple of the standard deviation below the mean.
    pub bottom: f64,
    /// Multiple of the standard deviation above the mean.
    pub top: f64,
    /// Number of clipping passes, at least 1.
    pub iterations: usize,
}

impl SigmaClip {
    /// A symmetric clip with a single pass.
    #[must_use]
    pub fn symmetric(multiple: f64) -> Self {
        Self {
            bottom: multiple,
            top: multiple,
            iterations: 1,
        }
    }

    /// Builds a clip from one symmetric multiple or a `[bottom, top]` pair.
    pub fn from_multiples(
        multiples: &[f64],
        iterations: usize,
    ) -> std::result::Result<Self, ConfigurationError> {
        let (bottom, top) = match multiples {
            [m] => (*m, *m),
            [bottom, top] => (*bottom, *top),
            _ => {
                return Err(ConfigurationError::InvalidParameter {
                    filter: "sigma_clip",
                    reason: format!(
                        "expected one multiple or a [bottom, top] pair, got {} values",
                        multiples.len()
                    ),
                })
            }
        };
        let clip = Self {
            bottom,
            top,
            iterations,
        };
        clip.validate()?;
        Ok(clip)
    }

    /// Set the number of passes.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        for (name, multiple) in [("bottom", self.bottom), ("top", self.top)] {
            if !multiple.is_finite() || multiple < 0.0 {
                return Err(ConfigurationError::InvalidParameter {
                    filter: "sigma_clip",
                    reason: format!("{name} multiple must be finite and non-negative, got {multiple}"),
                });
            }
        }
        if self.iterations == 0 {
            return Err(ConfigurationError::InvalidParameter {
                filter: "sigma_clip",
                reason: "iterations must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Population mean and standard deviation of finite, unflagged pixels.
fn unflagged_stats(grid: &DataGrid, mask: &Mask) -> Option<(f64, f64)> {
    let mut count = 0usize;
    let mut sum = 0.0;
    Zip::from(grid.values()).and(mask).for_each(|&v, &flagged| {
        if !flagged && v.is_finite() {
            count += 1;
            sum += v;
        }
    });
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;

    let mut squares = 0.0;
    Zip::from(grid.values()).and(mask).for_each(|&v, &flagged| {
        if !flagged && v.is_finite() {
            squares += (v - mean) * (v - mean);
        }
    });
    Some((mean, (squares / count as f64).sqrt()))
}

/// Iterative sigma clip.
///
/// Each pass recomputes the mean and population standard deviation over
/// finite pixels not yet flagged, then flags pixels outside
/// `[mean - bottom * std, mean + top * std]`. Stops early once a pass
/// flags nothing new.
pub fn sigma_clip(grid: &DataGrid, params: &SigmaClip) -> Result<Mask> {
    params.validate()?;
    let mut mask = blank_mask(grid.shape());

    for pass in 0..params.iterations {
        let Some((mean, std)) = unflagged_stats(grid, &mask) else {
            break;
        };
        if !mean.is_finite() || !std.is_finite() {
            return Err(ConfigurationError::InvalidParameter {
                filter: "sigma_clip",
                reason: format!(
                    "statistics overflowed on pass {} (mean={mean}, std={std})",
                    pass + 1
                ),
            }
            .into());
        }
        let low = mean - params.bottom * std;
        let high = mean + params.top * std;

        let mut newly = 0usize;
        Zip::from(&mut mask)
            .and(grid.values())
            .for_each(|flagged, &v| {
                if !*flagged && v.is_finite() && (v < low || v > high) {
                    *flagged = true;
                    newly += 1;
                }
            });
        log::debug!(
            "sigma clip pass {}: mean={mean:.6} std={std:.6} flagged {newly}",
            pass + 1
        );
        if newly == 0 {
            break;
        }
    }
    Ok(mask)
}

fn check_fraction(name: &str, fraction: f64) -> std::result::Result<(), ConfigurationError> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(ConfigurationError::InvalidParameter {
            filter: "percent_truncation",
            reason: format!("{name} must lie in [0, 1], got {fraction}"),
        });
    }
    Ok(())
}

/// Number of pixels a fraction of `n` selects.
#[must_use]
pub fn percent_count(n: usize, fraction: f64) -> usize {
    ((n as f64) * fraction + PERCENT_ROUNDING_GUARD).floor() as usize
}

/// Flags the highest `top_percent` and lowest `bottom_percent` of finite
/// pixels. The two selections are independent and may overlap.
pub fn percent_truncation(grid: &DataGrid, top_percent: f64, bottom_percent: f64) -> Result<Mask> {
    check_fraction("top_percent", top_percent)?;
    check_fraction("bottom_percent", bottom_percent)?;
    let finite = finite_count(grid);
    rank_truncation(
        grid,
        percent_count(finite, top_percent),
        percent_count(finite, bottom_percent),
        "percent_truncation",
    )
}

/// Flags the `top_count` highest and `bottom_count` lowest finite pixels.
///
/// Ties are broken by row-major position: the earlier pixel is selected
/// first. Asking for more pixels than are finite is an error.
pub fn count_truncation(grid: &DataGrid, top_count: usize, bottom_count: usize) -> Result<Mask> {
    rank_truncation(grid, top_count, bottom_count, "count_truncation")
}

fn finite_count(grid: &DataGrid) -> usize {
    grid.values().iter().filter(|v| v.is_finite()).count()
}

/// Fails when either count exceeds the number of finite pixels.
pub(crate) fn check_rank_counts(
    grid: &DataGrid,
    top_count: usize,
    bottom_count: usize,
    filter: &'static str,
) -> std::result::Result<(), ConfigurationError> {
    let available = finite_count(grid);
    for (name, count) in [("top_count", top_count), ("bottom_count", bottom_count)] {
        if count > available {
            return Err(ConfigurationError::InvalidParameter {
                filter,
                reason: format!("{name} {count} exceeds the {available} rankable pixels"),
            });
        }
    }
    Ok(())
}

fn rank_truncation(
    grid: &DataGrid,
    top_count: usize,
    bottom_count: usize,
    filter: &'static str,
) -> Result<Mask> {
    check_rank_counts(grid, top_count, bottom_count, filter)?;
    let mut ranked: Vec<((usize, usize), f64)> = grid
        .values()
        .indexed_iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(index, &v)| (index, v))
        .collect();

    let mut mask = blank_mask(grid.shape());
    if bottom_count > 0 {
        // Stable sort keeps row-major order among equal values.
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        for &(index, _) in &ranked[..bottom_count] {
            mask[index] = true;
        }
    }
    if top_count > 0 {
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        for &(index, _) in &ranked[..top_count] {
            mask[index] = true;
        }
    }
    Ok(mask)
}

/// Flags pixels within `tolerance` (absolute) of `value`.
#[must_use]
pub fn exact_value(grid: &DataGrid, value: f64, tolerance: f64) -> Mask {
    grid.values().mapv(|v| (v - value).abs() <= tolerance)
}

/// Flags NaN and infinite pixels.
#[must_use]
pub fn invalid_values(grid: &DataGrid) -> Mask {
    grid.values().mapv(|v| !v.is_finite())
}
