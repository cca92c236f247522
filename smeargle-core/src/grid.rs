//! Data grids and boolean masks.

use ndarray::{Array2, ArrayView2};

use crate::error::ConfigurationError;

/// A boolean mask: `true` marks an excluded pixel, `false` a valid one.
pub type Mask = Array2<bool>;

/// Creates an all-valid mask of the given `(rows, columns)` shape.
#[must_use]
pub fn blank_mask(shape: (usize, usize)) -> Mask {
    Array2::from_elem(shape, false)
}

/// Counts excluded pixels in a mask.
#[must_use]
pub fn count_masked(mask: &Mask) -> usize {
    mask.iter().filter(|&&flagged| flagged).count()
}

/// A single exposure frame.
///
/// The shape is fixed for the lifetime of a mask computation. A grid may
/// carry a mask produced by upstream processing; it is read-only here and
/// only enters the composite when the prior-mask filter is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGrid {
    values: Array2<f64>,
    prior_mask: Option<Mask>,
}

impl DataGrid {
    /// Wraps an array of pixel values.
    #[must_use]
    pub fn new(values: Array2<f64>) -> Self {
        Self {
            values,
            prior_mask: None,
        }
    }

    /// Builds a grid from row-major data.
    pub fn from_shape_vec(
        rows: usize,
        columns: usize,
        data: Vec<f64>,
    ) -> Result<Self, ConfigurationError> {
        let len = data.len();
        let values = Array2::from_shape_vec((rows, columns), data).map_err(|_| {
            ConfigurationError::InvalidParameter {
                filter: "grid",
                reason: format!("{len} values cannot fill a {rows}x{columns} grid"),
            }
        })?;
        Ok(Self::new(values))
    }

    /// Attaches an upstream mask. The shape must match the grid.
    pub fn with_prior_mask(mut self, mask: Mask) -> Result<Self, ConfigurationError> {
        if mask.dim() != self.values.dim() {
            return Err(ConfigurationError::ShapeMismatch {
                filter: "prior_mask",
                expected: self.values.dim(),
                found: mask.dim(),
            });
        }
        self.prior_mask = Some(mask);
        Ok(self)
    }

    /// Pixel values.
    #[must_use]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// The upstream mask, if one was attached.
    #[must_use]
    pub fn prior_mask(&self) -> Option<&Mask> {
        self.prior_mask.as_ref()
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.values.ncols()
    }

    /// Total pixel count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Array2<f64>> for DataGrid {
    fn from(values: Array2<f64>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_vec() {
        let grid = DataGrid::from_shape_vec(2, 3, vec![0.0; 6]).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.columns(), 3);
        assert_eq!(grid.len(), 6);

        assert!(DataGrid::from_shape_vec(2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn test_prior_mask_shape_is_checked() {
        let grid = DataGrid::new(Array2::zeros((3, 3)));
        let err = grid.clone().with_prior_mask(blank_mask((3, 4))).unwrap_err();
        assert!(matches!(err, ConfigurationError::ShapeMismatch { .. }));

        let grid = grid.with_prior_mask(blank_mask((3, 3))).unwrap();
        assert!(grid.prior_mask().is_some());
    }

    #[test]
    fn test_count_masked() {
        let mut mask = blank_mask((2, 2));
        assert_eq!(count_masked(&mask), 0);
        mask[[0, 1]] = true;
        mask[[1, 1]] = true;
        assert_eq!(count_masked(&mask), 2);
    }
}
