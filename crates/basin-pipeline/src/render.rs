//! Rasterize segmentation results for display.
//!
//! All three renderers are pure and deterministic: the same input always
//! yields byte-identical images.

use std::hash::Hasher;

use image::{GrayImage, Luma, Rgba, RgbaImage};
use siphasher::sip::SipHasher13;

use crate::types::{BOUNDARY, GradientField, LabelBuffer, UNASSIGNED};

/// Fixed keys so region colors are stable across runs and builds.
const COLOR_KEYS: (u64, u64) = (0x6261_7369_6e5f_636f, 0x6c6f_7572_735f_7631);

/// Watershed-line pixel in region renderings.
const BOUNDARY_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Pixel no region reached.
const UNASSIGNED_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Render watershed lines: boundary pixels white, everything else black.
#[must_use]
pub fn render_boundaries(labels: &LabelBuffer) -> GrayImage {
    GrayImage::from_fn(labels.width(), labels.height(), |x, y| {
        let label = labels.get(x, y).unwrap_or(UNASSIGNED);
        Luma([if label == BOUNDARY { 255 } else { 0 }])
    })
}

/// Deterministic color for a positive region label.
///
/// Channels are kept in `32..=159` so regions never collide with the
/// white boundary color or the black unassigned color.
#[must_use]
pub fn region_color(label: i32) -> Rgba<u8> {
    let mut hasher = SipHasher13::new_with_keys(COLOR_KEYS.0, COLOR_KEYS.1);
    hasher.write(&label.to_le_bytes());
    let [r, g, b, ..] = hasher.finish().to_le_bytes();
    Rgba([(r >> 1) + 32, (g >> 1) + 32, (b >> 1) + 32, 255])
}

/// Render each region in its own color, boundaries white.
#[must_use]
pub fn render_regions(labels: &LabelBuffer) -> RgbaImage {
    RgbaImage::from_fn(labels.width(), labels.height(), |x, y| {
        match labels.get(x, y).unwrap_or(UNASSIGNED) {
            BOUNDARY => BOUNDARY_COLOR,
            label if label > 0 => region_color(label),
            _ => UNASSIGNED_COLOR,
        }
    })
}

/// Rescale magnitudes linearly so the field maximum maps to 255.
///
/// A field with no positive magnitude renders black.
#[must_use]
pub fn render_gradient(field: &GradientField) -> GrayImage {
    let max = field.range().map_or(0.0, |(_, hi)| hi);
    GrayImage::from_fn(field.width(), field.height(), |x, y| {
        let v = field.get(x, y).unwrap_or(0.0);
        if max <= 0.0 {
            return Luma([0]);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let level = (v / max * 255.0).round().clamp(0.0, 255.0) as u8;
        Luma([level])
    })
}
