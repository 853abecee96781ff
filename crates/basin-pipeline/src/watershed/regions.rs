//! Region reporting over a flooded label buffer.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{BOUNDARY, LabelBuffer, UNASSIGNED};

/// Number of distinct positive labels in `labels`.
///
/// Returns 0 for a buffer with no regions. Does not modify the buffer.
#[must_use]
pub fn count_regions(labels: &LabelBuffer) -> usize {
    labels
        .as_slice()
        .iter()
        .filter(|&&l| l > BOUNDARY)
        .collect::<HashSet<_>>()
        .len()
}

/// Pixel accounting for a label buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
    /// Number of distinct positive labels.
    pub region_count: usize,
    /// Pixels labeled as watershed lines.
    pub boundary_pixels: usize,
    /// Pixels still unassigned (0 after flooding).
    pub unassigned_pixels: usize,
    /// `(label, area)` pairs in ascending label order.
    pub areas: Vec<(i32, usize)>,
    /// Area of the largest region, 0 if there is none.
    pub largest_area: usize,
    /// Area of the smallest region, 0 if there is none.
    pub smallest_area: usize,
}

/// Count boundary, unassigned, and per-region pixels.
#[must_use]
pub fn summarize(labels: &LabelBuffer) -> RegionSummary {
    let mut areas: BTreeMap<i32, usize> = BTreeMap::new();
    let mut boundary_pixels = 0;
    let mut unassigned_pixels = 0;

    for &label in labels.as_slice() {
        match label {
            BOUNDARY => boundary_pixels += 1,
            UNASSIGNED => unassigned_pixels += 1,
            l if l > BOUNDARY => *areas.entry(l).or_default() += 1,
            // Other negative values are not produced by flooding.
            _ => {}
        }
    }

    let largest_area = areas.values().copied().max().unwrap_or(0);
    let smallest_area = areas.values().copied().min().unwrap_or(0);
    RegionSummary {
        region_count: areas.len(),
        boundary_pixels,
        unassigned_pixels,
        areas: areas.into_iter().collect(),
        largest_area,
        smallest_area,
    }
}
