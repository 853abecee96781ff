//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP), decodes them with the
//! `image` crate, and reduces color to a single luminance channel for the
//! gradient stage.

use image::{DynamicImage, GrayImage, Luma};

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert a decoded image to 8-bit RGBA.
#[must_use]
pub fn to_rgba(image: &DynamicImage) -> RgbaImage {
    image.to_rgba8()
}

/// Luminance of an RGBA image: `0.299*R + 0.587*G + 0.114*B`, rounded.
///
/// Alpha is ignored.
#[must_use = "returns the grayscale image"]
pub fn luminance(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        let luma = 0.114_f32.mul_add(
            f32::from(b),
            0.299_f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
        );
        // Weights sum to 1.0, so the result stays within 0..=255.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = luma.round().clamp(0.0, 255.0) as u8;
        Luma([value])
    })
}
