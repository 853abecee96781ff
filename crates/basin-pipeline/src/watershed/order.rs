//! The one-time elevation ordering of pixels.

use std::cmp::Ordering;

use crate::types::{Dimensions, GradientField};

/// Every pixel index of a field, sorted by ascending gradient magnitude.
///
/// Equal magnitudes keep raster order (row, then column). The order is
/// built once before flooding and never changes; flooding sweeps it
/// repeatedly rather than popping from a live queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityOrder {
    dimensions: Dimensions,
    indices: Vec<usize>,
}

impl PriorityOrder {
    /// Sort the pixels of `field` by elevation.
    #[must_use]
    pub fn new(field: &GradientField) -> Self {
        let values = field.as_slice();
        let mut indices: Vec<usize> = (0..values.len()).collect();
        // Stable sort: ties stay in raster order. Values are finite, so
        // `partial_cmp` never returns `None`.
        indices.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(Ordering::Equal)
        });
        Self {
            dimensions: field.dimensions(),
            indices,
        }
    }

    /// Dimensions of the field this order was built from.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Pixel indices, lowest elevation first.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    /// Number of pixels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` for an order over an empty field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate pixel indices, lowest elevation first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }
}
