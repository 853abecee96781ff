//! Sobel gradient magnitude.
//!
//! The magnitude `sqrt(gx² + gy²)` of the 3×3 Sobel response is the
//! relief the watershed floods: flat areas are valleys, edges are ridges.

use std::fmt;

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, GradientField};

/// How the Sobel operator treats the one-pixel image border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientBorder {
    /// Border pixels are not evaluated and hold magnitude 0.
    ///
    /// Images narrower or shorter than 3 pixels have no interior, so the
    /// whole field is 0.
    #[default]
    Zero,
    /// Out-of-bounds taps replicate the nearest edge pixel, so every
    /// pixel gets a real response.
    Clamp,
}

impl fmt::Display for GradientBorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => f.write_str("Zero"),
            Self::Clamp => f.write_str("Clamp"),
        }
    }
}

/// Compute the Sobel gradient magnitude of a grayscale image.
#[must_use = "returns the gradient field"]
pub fn sobel_magnitude(image: &GrayImage, border: GradientBorder) -> GradientField {
    let (w, h) = image.dimensions();
    let dimensions = Dimensions::new(w, h);

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    let mut data: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(&x, &y)| f32::from(x).hypot(f32::from(y)))
        .collect();

    if border == GradientBorder::Zero {
        zero_border(&mut data, w as usize, h as usize);
    }

    GradientField::from_trusted(dimensions, data)
}

/// Clear the one-pixel frame of a row-major `width x height` buffer.
fn zero_border(data: &mut [f32], width: usize, height: usize) {
    if width < 3 || height < 3 {
        data.fill(0.0);
        return;
    }
    for (y, row) in data.chunks_exact_mut(width).enumerate() {
        if y == 0 || y == height - 1 {
            row.fill(0.0);
        } else {
            row[0] = 0.0;
            row[width - 1] = 0.0;
        }
    }
}
