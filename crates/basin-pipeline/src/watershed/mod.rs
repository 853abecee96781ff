//! Marker-controlled watershed segmentation.
//!
//! Treats a gradient field as a relief and floods it from its local
//! minima. Regions grow outward from their markers; where two regions
//! would merge, a one-pixel watershed line (label `0`) is left instead.
//!
//! The work is split into three stages over plain buffers:
//!
//! 1. [`markers`]: every local minimum gets its own positive label.
//! 2. [`flood`]: labels spread over a fixed elevation order until no
//!    pixel changes.
//! 3. [`regions`]: the distinct regions are counted.
//!
//! [`segment_gradient`] runs all three. No stage keeps state between
//! calls, and everything is single-threaded and synchronous.

pub mod flood;
pub mod markers;
mod neighbors;
pub mod order;
pub mod regions;

pub use flood::{
    Assignment, FloodObserver, FloodOutcome, NeighborLabels, Resolution, flood_observed,
};
pub use markers::{MarkerOrder, detect_markers, detect_markers_ordered};
pub use order::PriorityOrder;
pub use regions::{RegionSummary, count_regions, summarize};

use log::debug;

use crate::types::{GradientField, LabelBuffer, PipelineError};

/// Output of a complete watershed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// Final labels: `0` on watershed lines, positive inside regions.
    pub labels: LabelBuffer,
    /// Number of markers seeded before flooding.
    pub marker_count: usize,
    /// Number of distinct regions after flooding.
    pub region_count: usize,
    /// Flooding statistics.
    pub flood: FloodOutcome,
}

/// Segment a gradient field: detect markers, flood, count regions.
///
/// # Errors
///
/// Returns [`PipelineError::ConvergenceExceeded`] if flooding fails to
/// settle, which indicates broken invariants rather than bad input.
pub fn segment_gradient(
    field: &GradientField,
    marker_order: MarkerOrder,
) -> Result<Segmentation, PipelineError> {
    let order = PriorityOrder::new(field);
    let mut labels = detect_markers_ordered(field, &order, marker_order)?;
    let marker_count = count_regions(&labels);
    let outcome = flood::flood(field, &order, &mut labels)?;
    let region_count = count_regions(&labels);
    debug!("watershed: {marker_count} markers -> {region_count} regions");
    Ok(Segmentation {
        labels,
        marker_count,
        region_count,
        flood: outcome,
    })
}
