//! PNG encoding of rendered segmentation images.

use basin_pipeline::render::{render_boundaries, render_gradient, render_regions};
use basin_pipeline::types::{GrayImage, RgbaImage};
use basin_pipeline::{GradientField, LabelBuffer};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Errors raised while encoding output images.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The PNG encoder rejected the image.
    #[error("failed to encode PNG: {0}")]
    Png(#[from] image::ImageError),
}

fn encode(
    raw: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(raw, width, height, color)?;
    Ok(buf)
}

/// Encode an 8-bit grayscale image as PNG.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails, e.g. for a zero-sized
/// image.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)
}

/// Encode an 8-bit RGBA image as PNG.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails.
pub fn encode_rgba_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
}

/// Watershed lines as a black-and-white PNG.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails.
pub fn boundaries_png(labels: &LabelBuffer) -> Result<Vec<u8>, ExportError> {
    encode_gray_png(&render_boundaries(labels))
}

/// Regions in distinct colors as an RGBA PNG.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails.
pub fn regions_png(labels: &LabelBuffer) -> Result<Vec<u8>, ExportError> {
    encode_rgba_png(&render_regions(labels))
}

/// Gradient magnitude preview as a grayscale PNG.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails.
pub fn gradient_png(field: &GradientField) -> Result<Vec<u8>, ExportError> {
    encode_gray_png(&render_gradient(field))
}
