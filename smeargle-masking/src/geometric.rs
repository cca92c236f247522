//! Geometric filters: masks that depend on pixel position only.
#![allow(clippy::missing_errors_doc)]

use ndarray::{s, Array2};
use smeargle_core::{
    blank_mask, Axis, BoundsError, ConfigurationError, DataGrid, Mask, Result, Warning,
};

/// An inclusive index range along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InclusiveRange {
    /// First index, inclusive.
    pub start: i64,
    /// Last index, inclusive.
    pub end: i64,
}

impl InclusiveRange {
    /// Creates a range; `start` must not exceed `end`.
    pub fn new(start: i64, end: i64) -> std::result::Result<Self, ConfigurationError> {
        if start > end {
            return Err(ConfigurationError::InvalidParameter {
                filter: "range",
                reason: format!("range start {start} exceeds end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Interprets a configured endpoint list.
    ///
    /// One entry is a single index. Two entries are the endpoints. With more
    /// than two, the first and last are used and a
    /// [`Warning::AmbiguousRange`] is pushed.
    pub fn from_endpoints(
        filter: &'static str,
        axis: Axis,
        endpoints: &[i64],
        warnings: &mut Vec<Warning>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let (start, end) = match endpoints {
            [] => {
                return Err(ConfigurationError::InvalidParameter {
                    filter,
                    reason: format!("{axis} range is empty"),
                })
            }
            [only] => (*only, *only),
            [start, end] => (*start, *end),
            [start, .., end] => {
                warnings.push(Warning::AmbiguousRange {
                    filter: filter.to_string(),
                    axis,
                    endpoints: endpoints.to_vec(),
                });
                (*start, *end)
            }
        };
        if start > end {
            return Err(ConfigurationError::InvalidParameter {
                filter,
                reason: format!("{axis} range [{start}, {end}] is reversed"),
            });
        }
        Ok(Self { start, end })
    }

    /// Number of indices covered.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.abs_diff(self.start) + 1
    }

    /// Always false; a range covers at least one index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// An inclusive rectangle of pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// Column (x) range.
    pub columns: InclusiveRange,
    /// Row (y) range.
    pub rows: InclusiveRange,
}

impl Rect {
    /// Creates a rectangle from its column and row ranges.
    #[must_use]
    pub fn new(columns: InclusiveRange, rows: InclusiveRange) -> Self {
        Self { columns, rows }
    }
}

pub(crate) fn checked_index(
    filter: &'static str,
    axis: Axis,
    index: i64,
    len: usize,
) -> std::result::Result<usize, BoundsError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(BoundsError {
            filter,
            axis,
            index,
            len,
        })
}

/// Checks a rectangle against the grid, returning `(row, column)` slices
/// bounds as `usize`.
pub(crate) fn checked_rect(
    filter: &'static str,
    grid: &DataGrid,
    rect: &Rect,
) -> std::result::Result<((usize, usize), (usize, usize)), BoundsError> {
    let (rows, columns) = grid.shape();
    let row_start = checked_index(filter, Axis::Row, rect.rows.start, rows)?;
    let row_end = checked_index(filter, Axis::Row, rect.rows.end, rows)?;
    let col_start = checked_index(filter, Axis::Column, rect.columns.start, columns)?;
    let col_end = checked_index(filter, Axis::Column, rect.columns.end, columns)?;
    Ok(((row_start, row_end), (col_start, col_end)))
}

/// Flags no pixel.
#[must_use]
pub fn nothing(grid: &DataGrid) -> Mask {
    blank_mask(grid.shape())
}

/// Flags every pixel.
#[must_use]
pub fn everything(grid: &DataGrid) -> Mask {
    Array2::from_elem(grid.shape(), true)
}

/// Flags the pixels at `(column_indexes[i], row_indexes[i])`.
pub fn single_pixels(grid: &DataGrid, column_indexes: &[i64], row_indexes: &[i64]) -> Result<Mask> {
    const FILTER: &str = "single_pixels";
    if column_indexes.len() != row_indexes.len() {
        return Err(ConfigurationError::MismatchedLengths {
            filter: FILTER,
            left: "column indexes",
            left_len: column_indexes.len(),
            right: "row indexes",
            right_len: row_indexes.len(),
        }
        .into());
    }

    let (rows, columns) = grid.shape();
    let mut mask = blank_mask(grid.shape());
    for (&column, &row) in column_indexes.iter().zip(row_indexes) {
        let c = checked_index(FILTER, Axis::Column, column, columns)?;
        let r = checked_index(FILTER, Axis::Row, row, rows)?;
        mask[[r, c]] = true;
    }
    Ok(mask)
}

pub(crate) fn inside(grid: &DataGrid, rect: &Rect, filter: &'static str) -> Result<Mask> {
    let ((r0, r1), (c0, c1)) = checked_rect(filter, grid, rect)?;
    let mut mask = blank_mask(grid.shape());
    mask.slice_mut(s![r0..=r1, c0..=c1]).fill(true);
    Ok(mask)
}

pub(crate) fn outside(grid: &DataGrid, rect: &Rect, filter: &'static str) -> Result<Mask> {
    Ok(inside(grid, rect, filter)?.mapv(|flagged| !flagged))
}

/// Flags every pixel inside the rectangle, edges included.
pub fn rectangle(grid: &DataGrid, rect: &Rect) -> Result<Mask> {
    inside(grid, rect, "rectangle")
}

/// Flags every pixel outside the rectangle; the exact complement of
/// [`rectangle`] over the same bounds.
pub fn subarray(grid: &DataGrid, rect: &Rect) -> Result<Mask> {
    outside(grid, rect, "subarray")
}

/// Flags whole columns.
pub fn columns(grid: &DataGrid, column_list: &[i64]) -> Result<Mask> {
    let mut mask = blank_mask(grid.shape());
    for &column in column_list {
        let c = checked_index("columns", Axis::Column, column, grid.columns())?;
        mask.column_mut(c).fill(true);
    }
    Ok(mask)
}

/// Flags whole rows.
pub fn rows(grid: &DataGrid, row_list: &[i64]) -> Result<Mask> {
    let mut mask = blank_mask(grid.shape());
    for &row in row_list {
        let r = checked_index("rows", Axis::Row, row, grid.rows())?;
        mask.row_mut(r).fill(true);
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smeargle_core::{count_masked, Error};

    fn grid(rows: usize, columns: usize) -> DataGrid {
        DataGrid::new(Array2::zeros((rows, columns)))
    }

    fn rect(columns: (i64, i64), rows: (i64, i64)) -> Rect {
        Rect::new(
            InclusiveRange::new(columns.0, columns.1).unwrap(),
            InclusiveRange::new(rows.0, rows.1).unwrap(),
        )
    }

    #[test]
    fn test_rectangle_is_inclusive() {
        let mask = rectangle(&grid(10, 10), &rect((2, 4), (3, 5))).unwrap();
        assert_eq!(count_masked(&mask), 9);
        assert!(mask[[3, 2]]);
        assert!(mask[[5, 4]]);
        assert!(!mask[[6, 4]]);
        assert!(!mask[[5, 5]]);
    }

    #[test]
    fn test_subarray_complements_rectangle() {
        let g = grid(6, 8);
        let r = rect((1, 3), (2, 4));
        let inner = rectangle(&g, &r).unwrap();
        let outer = subarray(&g, &r).unwrap();
        for (a, b) in inner.iter().zip(outer.iter()) {
            assert_ne!(a, b);
        }
        assert_eq!(count_masked(&outer), 48 - 9);
    }

    #[test]
    fn test_single_pixels() {
        let mask = single_pixels(&grid(4, 5), &[0, 4], &[3, 1]).unwrap();
        assert!(mask[[3, 0]]);
        assert!(mask[[1, 4]]);
        assert_eq!(count_masked(&mask), 2);

        let err = single_pixels(&grid(4, 5), &[0, 1], &[0]).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MismatchedLengths { .. })
        ));
    }

    #[test]
    fn test_out_of_bounds() {
        let err = rows(&grid(4, 5), &[4]).unwrap_err();
        assert!(matches!(
            err,
            Error::Bounds(BoundsError {
                axis: Axis::Row,
                index: 4,
                ..
            })
        ));
        assert!(columns(&grid(4, 5), &[-1]).is_err());
        assert!(rectangle(&grid(4, 5), &rect((0, 5), (0, 1))).is_err());
    }

    #[test]
    fn test_rows_and_columns() {
        let g = grid(4, 5);
        assert_eq!(count_masked(&rows(&g, &[0, 2]).unwrap()), 10);
        assert_eq!(count_masked(&columns(&g, &[1, 1]).unwrap()), 4);
        assert_eq!(count_masked(&nothing(&g)), 0);
        assert_eq!(count_masked(&everything(&g)), 20);
    }

    #[test]
    fn test_range_from_endpoints() {
        let mut warnings = Vec::new();
        let single = InclusiveRange::from_endpoints("rows", Axis::Row, &[3], &mut warnings).unwrap();
        assert_eq!(single, InclusiveRange { start: 3, end: 3 });
        assert!(warnings.is_empty());

        let wide =
            InclusiveRange::from_endpoints("rectangle", Axis::Column, &[1, 5, 9], &mut warnings)
                .unwrap();
        assert_eq!(wide, InclusiveRange { start: 1, end: 9 });
        assert_eq!(warnings.len(), 1);

        assert!(InclusiveRange::from_endpoints("r", Axis::Row, &[], &mut warnings).is_err());
        assert!(InclusiveRange::from_endpoints("r", Axis::Row, &[5, 2], &mut warnings).is_err());
    }
}
