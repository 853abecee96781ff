//! Working-resolution cap.
//!
//! Flooding sweeps the whole image once per pass, and on plateau-heavy
//! input the pass count grows with the image size. Reducing the decoded
//! image so its longest axis fits `working_resolution` keeps large photos
//! tractable. Images already within the cap pass through untouched.

use std::fmt;

use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling filter used when downsampling.
///
/// Ordered from fastest to sharpest, with [`None`](Self::None) to skip
/// downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: keep the full decoded resolution.
    None,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes.
    Lanczos3,
}

impl DownsampleFilter {
    /// The `image` crate filter, or `Option::None` when disabled.
    const fn to_image_filter(self) -> Option<FilterType> {
        match self {
            Self::None => Option::None,
            Self::Nearest => Some(FilterType::Nearest),
            Self::Triangle => Some(FilterType::Triangle),
            Self::CatmullRom => Some(FilterType::CatmullRom),
            Self::Gaussian => Some(FilterType::Gaussian),
            Self::Lanczos3 => Some(FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "None",
            Self::Nearest => "Nearest",
            Self::Triangle => "Triangle",
            Self::CatmullRom => "CatmullRom",
            Self::Gaussian => "Gaussian",
            Self::Lanczos3 => "Lanczos3",
        })
    }
}

/// Shrink `image` so its longest axis is at most `max_dimension`.
///
/// Aspect ratio is preserved. Returns the (possibly unchanged) image and
/// whether resampling happened.
#[must_use]
pub fn downsample(
    image: &DynamicImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (DynamicImage, bool) {
    let Some(image_filter) = filter.to_image_filter() else {
        return (image.clone(), false);
    };

    if image.width().max(image.height()) <= max_dimension {
        return (image.clone(), false);
    }

    (image.resize(max_dimension, max_dimension, image_filter), true)
}
