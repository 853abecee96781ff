//! Shared types for the basin segmentation pipeline.

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;
use crate::gradient::GradientBorder;
use crate::watershed::MarkerOrder;
use crate::watershed::flood::FloodOutcome;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// original decoded image without depending on `image` directly.
pub use image::RgbaImage;

/// Label value of a pixel that no region has claimed yet.
pub const UNASSIGNED: i32 = -1;

/// Label value of a watershed-line pixel.
pub const BOUNDARY: i32 = 0;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions value.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn check_len(self, len: usize) -> Result<(), PipelineError> {
        if len == self.pixel_count() {
            Ok(())
        } else {
            Err(PipelineError::DimensionMismatch {
                width: self.width,
                height: self.height,
                len,
            })
        }
    }
}

/// Row-major field of gradient magnitudes.
///
/// Every value is finite and non-negative; [`GradientField::new`]
/// enforces this so the flooding stages never see NaN orderings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGradientField")]
pub struct GradientField {
    dimensions: Dimensions,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawGradientField {
    dimensions: Dimensions,
    data: Vec<f32>,
}

impl TryFrom<RawGradientField> for GradientField {
    type Error = PipelineError;

    fn try_from(raw: RawGradientField) -> Result<Self, Self::Error> {
        Self::new(raw.dimensions.width, raw.dimensions.height, raw.data)
    }
}

impl GradientField {
    /// Wrap a row-major buffer of magnitudes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `data.len()` is not
    /// `width * height`, and [`PipelineError::InvalidGradient`] for the
    /// first value that is negative, infinite, or NaN.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions::new(width, height);
        dimensions.check_len(data.len())?;
        if let Some((index, &value)) = data
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(PipelineError::InvalidGradient { index, value });
        }
        Ok(Self { dimensions, data })
    }

    /// Wrap a buffer the caller already knows to be well formed.
    pub(crate) fn from_trusted(dimensions: Dimensions, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), dimensions.pixel_count());
        debug_assert!(data.iter().all(|v| v.is_finite() && *v >= 0.0));
        Self { dimensions, data }
    }

    /// Build a field by evaluating `f(x, y)` for every pixel.
    ///
    /// # Errors
    ///
    /// Same as [`GradientField::new`].
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> f32,
    ) -> Result<Self, PipelineError> {
        let mut data = Vec::with_capacity(Dimensions::new(width, height).pixel_count());
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// Field dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Number of pixels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the field holds no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Magnitude at `(x, y)`, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.data.get(y as usize * self.width() as usize + x as usize).copied()
    }

    /// Row-major magnitudes.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Smallest and largest magnitude, or `None` for an empty field.
    #[must_use]
    pub fn range(&self) -> Option<(f32, f32)> {
        let first = *self.data.first()?;
        Some(
            self.data
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }
}

/// Row-major buffer of pixel labels.
///
/// `-1` ([`UNASSIGNED`]) marks a pixel no region has claimed, `0`
/// ([`BOUNDARY`]) a watershed line, and any positive value a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLabelBuffer")]
pub struct LabelBuffer {
    dimensions: Dimensions,
    labels: Vec<i32>,
}

#[derive(Deserialize)]
struct RawLabelBuffer {
    dimensions: Dimensions,
    labels: Vec<i32>,
}

impl TryFrom<RawLabelBuffer> for LabelBuffer {
    type Error = PipelineError;

    fn try_from(raw: RawLabelBuffer) -> Result<Self, Self::Error> {
        Self::from_raw(raw.dimensions.width, raw.dimensions.height, raw.labels)
    }
}

impl LabelBuffer {
    /// A buffer with every pixel [`UNASSIGNED`].
    #[must_use]
    pub fn unassigned(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            labels: vec![UNASSIGNED; dimensions.pixel_count()],
        }
    }

    /// Wrap a row-major label vector.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `labels.len()` is
    /// not `width * height`.
    pub fn from_raw(width: u32, height: u32, labels: Vec<i32>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions::new(width, height);
        dimensions.check_len(labels.len())?;
        Ok(Self { dimensions, labels })
    }

    /// Buffer dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Label at `(x, y)`, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<i32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.labels
            .get(y as usize * self.width() as usize + x as usize)
            .copied()
    }

    /// Row-major labels.
    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.labels
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.labels
    }

    /// Consumes the buffer and returns the row-major label vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<i32> {
        self.labels
    }

    /// Number of pixels still [`UNASSIGNED`].
    #[must_use]
    pub fn unassigned_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == UNASSIGNED).count()
    }

    /// Returns `true` once no pixel is [`UNASSIGNED`].
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.labels.contains(&UNASSIGNED)
    }

    /// Iterate rows as slices, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // `chunks_exact(0)` panics, and a zero-width buffer has no rows.
        let width = (self.width() as usize).max(1);
        self.labels.chunks_exact(width)
    }
}

/// Configuration for the segmentation pipeline.
///
/// The defaults reproduce the plain watershed flow: no pre-blur,
/// Sobel magnitude with an unevaluated (zero) border, raster-ordered
/// marker labels. Only the working-resolution cap is added on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest image axis after downsampling, in pixels.
    ///
    /// Flooding cost grows with the square of the pixel count on
    /// plateau-heavy images, so large photos are reduced first.
    pub working_resolution: u32,

    /// Resampling filter used for downsampling.
    pub downsample_filter: DownsampleFilter,

    /// Gaussian blur sigma applied to the grayscale image before the
    /// gradient. Values `<= 0` skip the blur.
    pub blur_sigma: f32,

    /// How the Sobel operator treats the one-pixel image border.
    pub gradient_border: GradientBorder,

    /// Order in which detected markers receive their labels.
    pub marker_order: MarkerOrder,
}

impl PipelineConfig {
    /// Default working resolution (longest axis, pixels).
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 512;
    /// Default downsampling filter.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;
    /// Default blur sigma (disabled).
    pub const DEFAULT_BLUR_SIGMA: f32 = 0.0;
    /// Default Sobel border policy.
    pub const DEFAULT_GRADIENT_BORDER: GradientBorder = GradientBorder::Zero;
    /// Default marker numbering.
    pub const DEFAULT_MARKER_ORDER: MarkerOrder = MarkerOrder::Raster;

    /// Check the configuration for values no stage can work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `working_resolution`
    /// is zero or `blur_sigma` is not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.working_resolution == 0 {
            return Err(PipelineError::InvalidConfig(
                "working_resolution must be at least 1".to_string(),
            ));
        }
        if !self.blur_sigma.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_sigma must be finite, got {}",
                self.blur_sigma
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            gradient_border: Self::DEFAULT_GRADIENT_BORDER,
            marker_order: Self::DEFAULT_MARKER_ORDER,
        }
    }
}

/// Result of running the full segmentation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentResult {
    /// Final labels: `0` for watershed lines, positive for regions.
    pub labels: LabelBuffer,
    /// Number of distinct regions in `labels`.
    pub region_count: usize,
    /// Dimensions of the working image in pixels.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
///
/// Does not derive serde traits: the raster intermediates are `image`
/// buffers, and callers that need to ship results across a boundary
/// serialize [`SegmentResult`] instead.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: original decoded RGBA image.
    pub original: RgbaImage,
    /// Stage 1: image at working resolution.
    pub downsampled: RgbaImage,
    /// Stage 2: grayscale luminance.
    pub grayscale: GrayImage,
    /// Stage 3: blurred grayscale (identical to `grayscale` when the blur
    /// is disabled).
    pub blurred: GrayImage,
    /// Stage 4: Sobel gradient magnitude.
    pub gradient: GradientField,
    /// Stage 5: marker seeds before flooding.
    pub markers: LabelBuffer,
    /// Number of markers detected.
    pub marker_count: usize,
    /// Stage 6: fully flooded labels.
    pub labels: LabelBuffer,
    /// Flooding statistics.
    pub flood: FloodOutcome,
    /// Number of distinct regions in `labels`.
    pub region_count: usize,
    /// Working image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the intermediates and keep only the final segmentation.
    #[must_use]
    pub fn into_segment_result(self) -> SegmentResult {
        SegmentResult {
            labels: self.labels,
            region_count: self.region_count,
            dimensions: self.dimensions,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A buffer length does not match the dimensions it was paired with.
    #[error("buffer of {len} pixels does not match {width}x{height}")]
    DimensionMismatch {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Actual buffer length.
        len: usize,
    },

    /// A gradient magnitude is negative or not finite.
    #[error("gradient value {value} at index {index} is not a finite non-negative number")]
    InvalidGradient {
        /// Row-major pixel index.
        index: usize,
        /// Offending value.
        value: f32,
    },

    /// Flooding did not reach a fixed point within its pass budget.
    ///
    /// Each productive pass resolves at least one pixel, so this only
    /// fires if the flooding invariants are broken.
    #[error("flooding did not converge after {passes} passes")]
    ConvergenceExceeded {
        /// Passes executed before giving up.
        passes: usize,
    },
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
    DimensionMismatch { width: u32, height: u32, len: usize },
    InvalidGradient { index: usize, value: f32 },
    ConvergenceExceeded { passes: usize },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::DimensionMismatch { width, height, len } => {
                PipelineErrorProxy::DimensionMismatch {
                    width: *width,
                    height: *height,
                    len: *len,
                }
            }
            Self::InvalidGradient { index, value } => PipelineErrorProxy::InvalidGradient {
                index: *index,
                value: *value,
            },
            Self::ConvergenceExceeded { passes } => {
                PipelineErrorProxy::ConvergenceExceeded { passes: *passes }
            }
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::DimensionMismatch { width, height, len } => {
                Self::DimensionMismatch { width, height, len }
            }
            PipelineErrorProxy::InvalidGradient { index, value } => {
                Self::InvalidGradient { index, value }
            }
            PipelineErrorProxy::ConvergenceExceeded { passes } => {
                Self::ConvergenceExceeded { passes }
            }
        })
    }
}
