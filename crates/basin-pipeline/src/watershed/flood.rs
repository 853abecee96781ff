//! Priority flooding: grow marker labels over the whole buffer.
//!
//! Flooding sweeps the fixed [`PriorityOrder`] again and again. On each
//! sweep, every still-unassigned pixel looks at the positive labels among
//! its 8 neighbors:
//!
//! - none: the pixel stays unassigned for this sweep,
//! - exactly one: the pixel joins that region,
//! - two or more: the pixel becomes a watershed line (`0`).
//!
//! Writes happen in place, so a pixel resolved early in a sweep is already
//! visible to the pixels after it. Sweeping stops once a sweep changes
//! nothing or no pixel is left unassigned. Pixels that no region ever
//! reaches are then forced to boundary.
//!
//! This is a fixed-point relaxation, not heap-based immersion:
//! propagation distance per sweep depends on the sweep order, and boundary
//! placement on plateaus differs from a priority-queue watershed. Both
//! transitions out of `-1` are terminal.
//!
//! # Cost
//!
//! Each sweep is O(pixels) and resolves at least one pixel, so the worst
//! case is O(pixels²). A lone marker on a large plateau approaches that
//! bound. That is slow, not wrong.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use super::neighbors::Grid;
use super::order::PriorityOrder;
use crate::types::{BOUNDARY, GradientField, LabelBuffer, PipelineError, UNASSIGNED};

/// Distinct positive labels around one pixel.
///
/// A pixel has at most 8 neighbors, so the set lives in a fixed array
/// and never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborLabels {
    labels: [i32; 8],
    len: u8,
}

/// What a set of neighbor labels decides for an unassigned pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No labeled neighbor yet.
    Unreached,
    /// Exactly one region touches the pixel.
    Region(i32),
    /// Two or more regions meet at the pixel.
    Boundary,
}

impl NeighborLabels {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            labels: [0; 8],
            len: 0,
        }
    }

    /// Add `label` if it is positive and not already present.
    ///
    /// Returns `true` if the set grew. Unassigned and boundary labels
    /// are ignored.
    pub fn insert(&mut self, label: i32) -> bool {
        if label <= BOUNDARY || self.as_slice().contains(&label) {
            return false;
        }
        let Some(slot) = self.labels.get_mut(usize::from(self.len)) else {
            return false;
        };
        *slot = label;
        self.len += 1;
        true
    }

    /// The distinct labels, in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.labels[..usize::from(self.len)]
    }

    /// Number of distinct labels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` if no labeled neighbor was seen.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decide the fate of the pixel these labels surround.
    #[must_use]
    pub fn resolve(&self) -> Resolution {
        match self.as_slice() {
            [] => Resolution::Unreached,
            [only] => Resolution::Region(*only),
            _ => Resolution::Boundary,
        }
    }
}

/// Counters describing one flooding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FloodOutcome {
    /// Full sweeps over the priority order. Zero when the buffer had
    /// nothing left to assign.
    pub passes: usize,
    /// Pixels that joined a region.
    pub regions_grown: usize,
    /// Pixels that became watershed lines because regions met there.
    pub boundaries: usize,
    /// Pixels no region reached, forced to boundary after the last sweep.
    pub forced_boundaries: usize,
}

/// A single `-1 -> label` transition, reported to a [`FloodObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Row-major pixel index.
    pub index: usize,
    /// 1-based sweep number. Forced assignments carry the number of the
    /// last sweep.
    pub pass: usize,
    /// The label written.
    pub label: i32,
    /// Positive neighbor labels seen when the decision was made.
    pub neighbors: NeighborLabels,
    /// `true` for pixels forced to boundary after flooding settled.
    pub forced: bool,
}

/// Receives every state transition made by [`flood_observed`].
pub trait FloodObserver {
    /// Called right after a pixel leaves the unassigned state.
    fn assigned(&mut self, _assignment: &Assignment) {}

    /// Called after each sweep with the number of pixels it resolved.
    fn pass_finished(&mut self, _pass: usize, _changed: usize) {}
}

/// The no-op observer.
impl FloodObserver for () {}

/// Flood `labels` in place until every pixel is a region or a boundary.
///
/// `labels` is normally the output of marker detection, but any buffer
/// mixing `-1`, `0`, and positive labels is accepted; only `-1` pixels
/// are ever written.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `labels` or `order`
/// does not match the dimensions of `field`, and
/// [`PipelineError::ConvergenceExceeded`] if the sweep budget of
/// `pixels + 1` is exhausted.
pub fn flood(
    field: &GradientField,
    order: &PriorityOrder,
    labels: &mut LabelBuffer,
) -> Result<FloodOutcome, PipelineError> {
    flood_observed(field, order, labels, &mut ())
}

/// [`flood`] with an observer notified of every transition.
///
/// # Errors
///
/// Same as [`flood`].
pub fn flood_observed<O: FloodObserver + ?Sized>(
    field: &GradientField,
    order: &PriorityOrder,
    labels: &mut LabelBuffer,
    observer: &mut O,
) -> Result<FloodOutcome, PipelineError> {
    let max_passes = field.dimensions().pixel_count() + 1;
    flood_bounded(field, order, labels, observer, max_passes)
}

/// The flooding loop, failing once `max_passes` sweeps have run without
/// settling.
fn flood_bounded<O: FloodObserver + ?Sized>(
    field: &GradientField,
    order: &PriorityOrder,
    labels: &mut LabelBuffer,
    observer: &mut O,
    max_passes: usize,
) -> Result<FloodOutcome, PipelineError> {
    let dimensions = field.dimensions();
    if labels.dimensions() != dimensions {
        return Err(PipelineError::DimensionMismatch {
            width: dimensions.width,
            height: dimensions.height,
            len: labels.as_slice().len(),
        });
    }
    if order.dimensions() != dimensions {
        return Err(PipelineError::DimensionMismatch {
            width: dimensions.width,
            height: dimensions.height,
            len: order.len(),
        });
    }

    let grid = Grid::new(dimensions);
    let mut outcome = FloodOutcome::default();
    let mut remaining = labels.unassigned_count();
    let cells = labels.as_mut_slice();

    while remaining > 0 {
        if outcome.passes >= max_passes {
            return Err(PipelineError::ConvergenceExceeded {
                passes: outcome.passes,
            });
        }
        outcome.passes += 1;
        let pass = outcome.passes;

        let mut changed = 0;
        for &index in order.as_slice() {
            if cells[index] != UNASSIGNED {
                continue;
            }

            let mut neighbors = NeighborLabels::new();
            for n in grid.neighbors(index) {
                neighbors.insert(cells[n]);
            }

            let label = match neighbors.resolve() {
                Resolution::Unreached => continue,
                Resolution::Region(label) => {
                    outcome.regions_grown += 1;
                    label
                }
                Resolution::Boundary => {
                    outcome.boundaries += 1;
                    BOUNDARY
                }
            };
            cells[index] = label;
            changed += 1;
            observer.assigned(&Assignment {
                index,
                pass,
                label,
                neighbors,
                forced: false,
            });
        }

        remaining -= changed;
        trace!("flood pass {pass}: {changed} resolved, {remaining} unassigned");
        observer.pass_finished(pass, changed);

        if changed == 0 {
            break;
        }
    }

    if remaining > 0 {
        warn!("{remaining} pixels unreachable from any marker, forcing to boundary");
        for (index, cell) in cells.iter_mut().enumerate() {
            if *cell != UNASSIGNED {
                continue;
            }
            *cell = BOUNDARY;
            outcome.forced_boundaries += 1;
            observer.assigned(&Assignment {
                index,
                pass: outcome.passes,
                label: BOUNDARY,
                neighbors: NeighborLabels::new(),
                forced: true,
            });
        }
    }

    debug!(
        "flooding settled after {} passes: {} grown, {} boundary, {} forced",
        outcome.passes, outcome.regions_grown, outcome.boundaries, outcome.forced_boundaries,
    );
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;
    use crate::watershed::markers::detect_markers;

    // --- NeighborLabels ---

    #[test]
    fn empty_set_is_unreached() {
        assert_eq!(NeighborLabels::new().resolve(), Resolution::Unreached);
    }

    #[test]
    fn ignores_unassigned_and_boundary() {
        let mut set = NeighborLabels::new();
        assert!(!set.insert(UNASSIGNED));
        assert!(!set.insert(BOUNDARY));
        assert!(set.is_empty());
    }

    #[test]
    fn deduplicates_labels() {
        let mut set = NeighborLabels::new();
        assert!(set.insert(4));
        assert!(!set.insert(4));
        assert_eq!(set.len(), 1);
        assert_eq!(set.resolve(), Resolution::Region(4));
    }

    #[test]
    fn two_labels_resolve_to_boundary() {
        let mut set = NeighborLabels::new();
        set.insert(1);
        set.insert(2);
        assert_eq!(set.as_slice(), &[1, 2]);
        assert_eq!(set.resolve(), Resolution::Boundary);
    }

    #[test]
    fn holds_eight_distinct_labels() {
        let mut set = NeighborLabels::new();
        for label in 1..=8 {
            assert!(set.insert(label));
        }
        assert!(!set.insert(9));
        assert_eq!(set.len(), 8);
    }

    // --- flood ---

    fn run(field: &GradientField) -> (LabelBuffer, FloodOutcome) {
        let order = PriorityOrder::new(field);
        let mut labels = detect_markers(field);
        let outcome = flood(field, &order, &mut labels).unwrap();
        (labels, outcome)
    }

    #[test]
    fn already_resolved_buffer_takes_zero_passes() {
        let field = GradientField::new(3, 3, vec![0.0; 9]).unwrap();
        let (labels, outcome) = run(&field);
        assert_eq!(outcome.passes, 0);
        assert_eq!(labels.as_slice(), &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn ramp_floods_from_single_marker() {
        // Strictly increasing ramp: one marker at the low end.
        let field = GradientField::new(5, 1, vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let (labels, outcome) = run(&field);
        assert_eq!(labels.as_slice(), &[1; 5]);
        // In-place writes let the whole ramp resolve in one sweep.
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.regions_grown, 4);
    }

    #[test]
    fn reverse_sweep_needs_more_passes() {
        // Sweep order runs away from the marker, so each pass advances
        // the front by one pixel.
        let field = GradientField::new(4, 1, vec![9.0, 8.0, 7.0, 0.0]).unwrap();
        let order = PriorityOrder::new(&field);
        // Marker at the left end even though it is not a minimum.
        let mut labels = LabelBuffer::from_raw(4, 1, vec![1, -1, -1, -1]).unwrap();
        let outcome = flood(&field, &order, &mut labels).unwrap();
        assert_eq!(labels.as_slice(), &[1, 1, 1, 1]);
        assert_eq!(outcome.passes, 3);
    }

    #[test]
    fn meeting_regions_leave_a_boundary() {
        // Two pits at the ends of a row with a ridge in the middle.
        let field = GradientField::new(5, 1, vec![0.0, 1.0, 2.0, 1.0, 0.0]).unwrap();
        let (labels, outcome) = run(&field);
        // Order: 0, 4, 1, 3, 2. Pixels 1 and 3 join their pits, and the
        // ridge pixel then sees both regions.
        assert_eq!(labels.as_slice(), &[1, 1, 0, 2, 2]);
        assert_eq!(outcome.boundaries, 1);
        assert_eq!(outcome.passes, 1);
    }

    #[test]
    fn plateau_between_pits_is_already_split_by_markers() {
        // The middle 5 has only equal neighbors, so it is a marker of its
        // own and both pixels beside it become watershed lines.
        let field = GradientField::new(5, 1, vec![0.0, 5.0, 5.0, 5.0, 0.0]).unwrap();
        let (labels, outcome) = run(&field);
        assert_eq!(labels.as_slice(), &[1, 0, 2, 0, 3]);
        assert_eq!(outcome.boundaries, 2);
        assert_eq!(outcome.regions_grown, 0);
    }

    /// A descending row with a marker placed at its high end. The sweep
    /// runs away from the marker, so each pass resolves exactly one pixel.
    fn longest_chain(len: u32) -> (GradientField, LabelBuffer) {
        let field = GradientField::from_fn(len, 1, |x, _| {
            f32::from(u16::try_from(len - 1 - x).unwrap())
        })
        .unwrap();
        let mut raw = vec![UNASSIGNED; len as usize];
        raw[0] = 1;
        let labels = LabelBuffer::from_raw(len, 1, raw).unwrap();
        (field, labels)
    }

    #[test]
    fn longest_chain_settles_within_the_pass_budget() {
        let (field, mut labels) = longest_chain(64);
        let order = PriorityOrder::new(&field);
        let outcome = flood(&field, &order, &mut labels).unwrap();
        assert_eq!(labels.as_slice(), &[1; 64]);
        assert_eq!(outcome.passes, 63);
        assert!(outcome.passes <= field.len() + 1);
        assert_eq!(outcome.regions_grown, 63);
    }

    #[test]
    fn exhausted_pass_budget_is_an_error() {
        let (field, mut labels) = longest_chain(8);
        let order = PriorityOrder::new(&field);
        let result = flood_bounded(&field, &order, &mut labels, &mut (), 3);
        assert!(matches!(
            result,
            Err(PipelineError::ConvergenceExceeded { passes: 3 })
        ));
        // Exactly enough budget succeeds.
        let (field, mut labels) = longest_chain(8);
        let outcome = flood_bounded(&field, &order, &mut labels, &mut (), 7).unwrap();
        assert_eq!(outcome.passes, 7);
    }

    #[test]
    fn enclosed_pixel_is_forced_to_boundary() {
        let field = GradientField::new(5, 5, vec![1.0; 25]).unwrap();
        let order = PriorityOrder::new(&field);
        #[rustfmt::skip]
        let mut labels = LabelBuffer::from_raw(5, 5, vec![
            1, 1, 1, 1, 1,
            1, 0, 0, 0, 1,
            1, 0, -1, 0, 1,
            1, 0, 0, 0, 1,
            1, 1, 1, 1, 1,
        ])
        .unwrap();
        let outcome = flood(&field, &order, &mut labels).unwrap();
        assert_eq!(labels.get(2, 2), Some(BOUNDARY));
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.forced_boundaries, 1);
        assert!(labels.is_resolved());
    }

    #[test]
    fn buffer_without_markers_is_all_boundary() {
        let field = GradientField::new(3, 2, vec![1.0; 6]).unwrap();
        let order = PriorityOrder::new(&field);
        let mut labels = LabelBuffer::unassigned(field.dimensions());
        let outcome = flood(&field, &order, &mut labels).unwrap();
        assert_eq!(labels.as_slice(), &[BOUNDARY; 6]);
        assert_eq!(outcome.forced_boundaries, 6);
    }

    #[test]
    fn rejects_mismatched_label_buffer() {
        let field = GradientField::new(3, 3, vec![0.0; 9]).unwrap();
        let order = PriorityOrder::new(&field);
        let mut labels = LabelBuffer::unassigned(Dimensions::new(9, 1));
        let result = flood(&field, &order, &mut labels);
        assert!(matches!(
            result,
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_order() {
        let field = GradientField::new(3, 3, vec![0.0; 9]).unwrap();
        let other = GradientField::new(1, 9, vec![0.0; 9]).unwrap();
        let order = PriorityOrder::new(&other);
        let mut labels = detect_markers(&field);
        let result = flood(&field, &order, &mut labels);
        assert!(matches!(
            result,
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_field_is_a_no_op() {
        let field = GradientField::new(0, 0, Vec::new()).unwrap();
        let (labels, outcome) = run(&field);
        assert!(labels.as_slice().is_empty());
        assert_eq!(outcome, FloodOutcome::default());
    }

    #[derive(Default)]
    struct Recorder {
        assignments: Vec<Assignment>,
        passes: Vec<(usize, usize)>,
    }

    impl FloodObserver for Recorder {
        fn assigned(&mut self, assignment: &Assignment) {
            self.assignments.push(*assignment);
        }

        fn pass_finished(&mut self, pass: usize, changed: usize) {
            self.passes.push((pass, changed));
        }
    }

    #[test]
    fn observer_sees_every_transition() {
        let field = GradientField::new(5, 1, vec![0.0, 1.0, 2.0, 1.0, 0.0]).unwrap();
        let order = PriorityOrder::new(&field);
        let mut labels = detect_markers(&field);
        let mut recorder = Recorder::default();
        let outcome = flood_observed(&field, &order, &mut labels, &mut recorder).unwrap();

        let indices: Vec<usize> = recorder.assignments.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![1, 3, 2]);
        assert_eq!(recorder.passes, vec![(1, 3)]);
        assert_eq!(outcome.passes, 1);

        let boundary = recorder.assignments[2];
        assert_eq!(boundary.label, BOUNDARY);
        assert_eq!(boundary.neighbors.as_slice(), &[1, 2]);
        assert!(!boundary.forced);
    }
}
