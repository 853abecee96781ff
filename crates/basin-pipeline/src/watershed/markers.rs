//! Marker detection: seed one region per local minimum.
//!
//! A pixel is a marker when no in-bounds 8-connected neighbor has a
//! strictly smaller magnitude. Equal neighbors do not disqualify it, so a
//! flat minimum yields one marker per pixel.
//!
//! The test is local. Any plateau pixel whose neighbors are all on the
//! plateau or above it is a marker, wherever the plateau sits: a field
//! that is flat at 10 around a single 0-valued pit seeds the pit and
//! every 10 not adjacent to it. Only pixels with a strictly lower
//! neighbor are left for flooding. That over-segmentation is part of the
//! observable behavior and is kept as is.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::neighbors::Grid;
use super::order::PriorityOrder;
use crate::types::{GradientField, LabelBuffer, PipelineError};

/// Order in which markers receive their labels.
///
/// Both orders find the same marker pixels. Only the numbering differs,
/// and because flooding compares labels for equality alone, the final
/// partition is the same up to relabeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkerOrder {
    /// Label markers in raster order (row, then column), starting at 1.
    #[default]
    Raster,
    /// Label markers in ascending-gradient order, so the deepest basin
    /// gets label 1.
    Elevation,
}

impl fmt::Display for MarkerOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster => f.write_str("Raster"),
            Self::Elevation => f.write_str("Elevation"),
        }
    }
}

/// Returns `true` if no in-bounds neighbor of `index` is strictly lower.
fn is_local_minimum(values: &[f32], grid: Grid, index: usize) -> bool {
    let center = values[index];
    grid.neighbors(index).all(|n| values[n] >= center)
}

/// Label every local minimum visited by `visit`, in visiting order.
fn seed(field: &GradientField, visit: impl Iterator<Item = usize>) -> LabelBuffer {
    let grid = Grid::new(field.dimensions());
    let values = field.as_slice();
    let mut labels = LabelBuffer::unassigned(field.dimensions());
    let cells = labels.as_mut_slice();

    let mut next_label = 1;
    for index in visit {
        if is_local_minimum(values, grid, index) {
            cells[index] = next_label;
            next_label += 1;
        }
    }

    debug!(
        "detected {} markers in {}x{} field",
        next_label - 1,
        field.width(),
        field.height(),
    );
    labels
}

/// Seed a label buffer with one marker per local minimum.
///
/// Markers are numbered in raster order starting at 1; every other pixel
/// stays [`UNASSIGNED`](crate::types::UNASSIGNED). An empty field yields
/// an empty buffer.
#[must_use = "returns the seeded label buffer"]
pub fn detect_markers(field: &GradientField) -> LabelBuffer {
    seed(field, 0..field.len())
}

/// Seed a label buffer, numbering markers in the requested order.
///
/// `order` must have been built from `field`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `order` was built
/// from a field of different dimensions.
pub fn detect_markers_ordered(
    field: &GradientField,
    order: &PriorityOrder,
    marker_order: MarkerOrder,
) -> Result<LabelBuffer, PipelineError> {
    if order.dimensions() != field.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            width: field.width(),
            height: field.height(),
            len: order.len(),
        });
    }
    Ok(seed_in_order(field, order, marker_order))
}

/// [`detect_markers_ordered`] for an order known to match `field`.
pub(crate) fn seed_in_order(
    field: &GradientField,
    order: &PriorityOrder,
    marker_order: MarkerOrder,
) -> LabelBuffer {
    match marker_order {
        MarkerOrder::Raster => seed(field, 0..field.len()),
        MarkerOrder::Elevation => seed(field, order.iter()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::UNASSIGNED;

    #[test]
    fn uniform_field_marks_every_pixel_in_raster_order() {
        let field = GradientField::new(3, 3, vec![0.0; 9]).unwrap();
        let labels = detect_markers(&field);
        assert_eq!(labels.as_slice(), &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn cone_has_a_single_marker() {
        // Every pixel off the apex has a strictly lower neighbor.
        let field = GradientField::from_fn(5, 5, |x, y| {
            f32::from(u8::try_from(x.abs_diff(2).max(y.abs_diff(2))).unwrap())
        })
        .unwrap();
        let labels = detect_markers(&field);
        assert_eq!(labels.get(2, 2), Some(1));
        assert_eq!(labels.unassigned_count(), 24);
    }

    #[test]
    fn plateau_without_lower_neighbor_seeds_markers() {
        // A single pit in a flat 10-valued field. Pixels more than one
        // step from the pit only see other 10s, so each is a marker.
        let field = GradientField::from_fn(5, 5, |x, y| {
            if (x, y) == (2, 2) { 0.0 } else { 10.0 }
        })
        .unwrap();
        let labels = detect_markers(&field);
        #[rustfmt::skip]
        let expected = [
             1,  2,  3,  4,  5,
             6, -1, -1, -1,  7,
             8, -1,  9, -1, 10,
            11, -1, -1, -1, 12,
            13, 14, 15, 16, 17,
        ];
        assert_eq!(labels.as_slice(), &expected);
    }

    #[test]
    fn equal_neighbor_does_not_disqualify() {
        // Two adjacent equal minima are both markers.
        let field = GradientField::new(4, 1, vec![5.0, 1.0, 1.0, 5.0]).unwrap();
        let labels = detect_markers(&field);
        assert_eq!(labels.as_slice(), &[UNASSIGNED, 1, 2, UNASSIGNED]);
    }

    #[test]
    fn strictly_lower_neighbor_disqualifies() {
        let field = GradientField::new(3, 1, vec![2.0, 1.0, 0.0]).unwrap();
        let labels = detect_markers(&field);
        assert_eq!(labels.as_slice(), &[UNASSIGNED, UNASSIGNED, 1]);
    }

    #[test]
    fn diagonal_neighbor_counts() {
        // (1,1) is lower than (0,0) only diagonally.
        let field = GradientField::new(2, 2, vec![3.0, 3.0, 3.0, 1.0]).unwrap();
        let labels = detect_markers(&field);
        assert_eq!(labels.as_slice(), &[UNASSIGNED, UNASSIGNED, UNASSIGNED, 1]);
    }

    #[test]
    fn single_pixel_is_a_marker() {
        let field = GradientField::new(1, 1, vec![42.0]).unwrap();
        assert_eq!(detect_markers(&field).as_slice(), &[1]);
    }

    #[test]
    fn empty_field_gives_empty_buffer() {
        let field = GradientField::new(0, 0, Vec::new()).unwrap();
        assert!(detect_markers(&field).as_slice().is_empty());
    }

    #[test]
    fn elevation_order_numbers_deepest_first() {
        // Minima at index 0 (value 4) and index 4 (value 1).
        let field = GradientField::new(5, 1, vec![4.0, 5.0, 6.0, 5.0, 1.0]).unwrap();
        let order = PriorityOrder::new(&field);

        let raster = detect_markers_ordered(&field, &order, MarkerOrder::Raster).unwrap();
        assert_eq!(raster.get(0, 0), Some(1));
        assert_eq!(raster.get(4, 0), Some(2));

        let elevation = detect_markers_ordered(&field, &order, MarkerOrder::Elevation).unwrap();
        assert_eq!(elevation.get(4, 0), Some(1));
        assert_eq!(elevation.get(0, 0), Some(2));
    }

    #[test]
    fn ordered_detection_rejects_foreign_order() {
        let field = GradientField::new(2, 2, vec![0.0; 4]).unwrap();
        let other = GradientField::new(4, 1, vec![0.0; 4]).unwrap();
        let order = PriorityOrder::new(&other);
        let result = detect_markers_ordered(&field, &order, MarkerOrder::Raster);
        assert!(matches!(
            result,
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn marker_order_display() {
        assert_eq!(MarkerOrder::Raster.to_string(), "Raster");
        assert_eq!(MarkerOrder::Elevation.to_string(), "Elevation");
    }
}
