//! 8-connected neighborhood on a row-major pixel grid.

use crate::types::Dimensions;

/// Offsets of the 8 neighbors, in raster order around the center.
const OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Index arithmetic for a `width x height` row-major buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grid {
    width: usize,
    height: usize,
}

impl Grid {
    pub(crate) const fn new(dimensions: Dimensions) -> Self {
        Self {
            width: dimensions.width as usize,
            height: dimensions.height as usize,
        }
    }

    /// In-bounds 8-connected neighbors of `index`, excluding `index`
    /// itself. Border pixels yield fewer than 8.
    pub(crate) fn neighbors(self, index: usize) -> impl Iterator<Item = usize> {
        let x = index % self.width;
        let y = index / self.width;
        OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            (nx < self.width && ny < self.height).then_some(ny * self.width + nx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbors_of(width: u32, height: u32, index: usize) -> Vec<usize> {
        Grid::new(Dimensions::new(width, height))
            .neighbors(index)
            .collect()
    }

    #[test]
    fn interior_pixel_has_eight_neighbors() {
        assert_eq!(neighbors_of(3, 3, 4), vec![0, 1, 2, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn corner_pixel_has_three_neighbors() {
        assert_eq!(neighbors_of(3, 3, 0), vec![1, 3, 4]);
        assert_eq!(neighbors_of(3, 3, 8), vec![4, 5, 7]);
    }

    #[test]
    fn edge_pixel_has_five_neighbors() {
        assert_eq!(neighbors_of(3, 3, 1), vec![0, 2, 3, 4, 5]);
    }

    #[test]
    fn single_pixel_has_no_neighbors() {
        assert!(neighbors_of(1, 1, 0).is_empty());
    }

    #[test]
    fn row_does_not_wrap() {
        // Rightmost pixel of row 0 must not see the leftmost of row 1
        // as a horizontal neighbor.
        assert_eq!(neighbors_of(4, 2, 3), vec![2, 6, 7]);
    }
}
