//! Step-by-step segmentation: advance one stage at a time and inspect
//! each intermediate before continuing.
//!
//! ```rust
//! # use basin_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .downsample()
//!     .grayscale()
//!     .blur()
//!     .gradient()
//!     .seed()
//!     .flood()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered. Every state carries the
//! intermediates computed so far; [`Flooded::into_result`] hands all of
//! them over as a [`StagedResult`].
//!
//! Callers that only need the labels should use [`crate::process`],
//! which drops the raster intermediates.

use image::DynamicImage;
use log::debug;

use crate::diagnostics::StageMetrics;
use crate::types::{
    Dimensions, GradientField, GrayImage, LabelBuffer, PipelineConfig, PipelineError, RgbaImage,
    StagedResult,
};
use crate::watershed::flood::{self, FloodOutcome};
use crate::watershed::markers::seed_in_order;
use crate::watershed::{PriorityOrder, RegionSummary, count_regions, summarize};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Source bytes and config, nothing processed yet.
#[must_use = "pipeline stages are consumed by advancing, call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// The configuration the pipeline will run with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate the config, decode the source, and advance to [`Decoded`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config fails
    /// [`PipelineConfig::validate`], [`PipelineError::EmptyInput`] for
    /// empty source bytes, and [`PipelineError::ImageDecode`] if the
    /// bytes are not a supported image.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let image = crate::grayscale::decode(&self.source)?;
        let original = crate::grayscale::to_rgba(&image);
        debug!(
            "decoded {source_len} bytes to {}x{}",
            original.width(),
            original.height()
        );
        Ok(Decoded {
            config: self.config,
            image,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// The source image decoded and converted to RGBA.
#[must_use = "pipeline stages are consumed by advancing, call .downsample() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    image: DynamicImage,
    original: RgbaImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded RGBA image at full resolution.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Metrics for the decode step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.original.width(),
            height: self.original.height(),
            pixel_count: u64::from(self.original.width()) * u64::from(self.original.height()),
        }
    }

    /// Cap the image at the working resolution.
    pub fn downsample(self) -> Downsampled {
        let (resized, applied) = crate::downsample::downsample(
            &self.image,
            self.config.working_resolution,
            self.config.downsample_filter,
        );
        let rgba = crate::grayscale::to_rgba(&resized);
        if applied {
            debug!(
                "downsampled {}x{} -> {}x{} ({})",
                self.original.width(),
                self.original.height(),
                rgba.width(),
                rgba.height(),
                self.config.downsample_filter,
            );
        }
        Downsampled {
            config: self.config,
            original: self.original,
            rgba,
            applied,
        }
    }
}

// ───────────────────────── Stage 2: Downsampled ──────────────────────

/// The image at working resolution.
#[must_use = "pipeline stages are consumed by advancing, call .grayscale() to continue"]
#[allow(clippy::struct_field_names)]
pub struct Downsampled {
    config: PipelineConfig,
    original: RgbaImage,
    rgba: RgbaImage,
    applied: bool,
}

impl Downsampled {
    /// The working-resolution RGBA image.
    #[must_use]
    pub const fn downsampled(&self) -> &RgbaImage {
        &self.rgba
    }

    /// Whether the image was actually resized.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Metrics for the downsample step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Downsample {
            original_width: self.original.width(),
            original_height: self.original.height(),
            width: self.rgba.width(),
            height: self.rgba.height(),
            max_dimension: self.config.working_resolution,
            filter: self.config.downsample_filter.to_string(),
            applied: self.applied,
        }
    }

    /// Convert to luminance.
    pub fn grayscale(self) -> Grayscaled {
        let gray = crate::grayscale::luminance(&self.rgba);
        Grayscaled {
            config: self.config,
            original: self.original,
            downsampled: self.rgba,
            gray,
        }
    }
}

// ───────────────────────── Stage 3: Grayscaled ───────────────────────

/// Single-channel luminance of the working image.
#[must_use = "pipeline stages are consumed by advancing, call .blur() to continue"]
pub struct Grayscaled {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    gray: GrayImage,
}

impl Grayscaled {
    /// The luminance image.
    #[must_use]
    pub const fn luminance(&self) -> &GrayImage {
        &self.gray
    }

    /// Metrics for the grayscale step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.gray.width(),
            height: self.gray.height(),
        }
    }

    /// Apply the optional Gaussian pre-blur.
    pub fn blur(self) -> Blurred {
        let smooth = crate::blur::gaussian_blur(&self.gray, self.config.blur_sigma);
        Blurred {
            config: self.config,
            original: self.original,
            downsampled: self.downsampled,
            gray: self.gray,
            smooth,
        }
    }
}

// ───────────────────────── Stage 4: Blurred ──────────────────────────

/// Luminance after the optional blur.
#[must_use = "pipeline stages are consumed by advancing, call .gradient() to continue"]
pub struct Blurred {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    gray: GrayImage,
    smooth: GrayImage,
}

impl Blurred {
    /// The blurred luminance image, identical to the input when the
    /// blur is disabled.
    #[must_use]
    pub const fn blurred(&self) -> &GrayImage {
        &self.smooth
    }

    /// Metrics for the blur step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Blur {
            sigma: self.config.blur_sigma,
            applied: self.config.blur_sigma > 0.0,
        }
    }

    /// Compute the Sobel gradient magnitude.
    pub fn gradient(self) -> GradientComputed {
        let field = crate::gradient::sobel_magnitude(&self.smooth, self.config.gradient_border);
        GradientComputed {
            config: self.config,
            original: self.original,
            downsampled: self.downsampled,
            gray: self.gray,
            blurred: self.smooth,
            field,
        }
    }
}

// ───────────────────────── Stage 5: GradientComputed ─────────────────

/// The relief to be flooded.
#[must_use = "pipeline stages are consumed by advancing, call .seed() to continue"]
pub struct GradientComputed {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    gray: GrayImage,
    blurred: GrayImage,
    field: GradientField,
}

impl GradientComputed {
    /// The gradient magnitude field.
    #[must_use]
    pub const fn gradient(&self) -> &GradientField {
        &self.field
    }

    /// Metrics for the gradient step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = self.field.range().unwrap_or((0.0, 0.0));
        #[allow(clippy::cast_precision_loss)]
        let mean = if self.field.is_empty() {
            0.0
        } else {
            self.field.as_slice().iter().map(|&v| f64::from(v)).sum::<f64>()
                / self.field.len() as f64
        };
        StageMetrics::Gradient {
            border: self.config.gradient_border.to_string(),
            min,
            max,
            mean,
        }
    }

    /// Sort pixels by elevation and place one marker per local minimum.
    pub fn seed(self) -> Seeded {
        let order = PriorityOrder::new(&self.field);
        let markers = seed_in_order(&self.field, &order, self.config.marker_order);
        let marker_count = count_regions(&markers);
        Seeded {
            config: self.config,
            original: self.original,
            downsampled: self.downsampled,
            gray: self.gray,
            blurred: self.blurred,
            field: self.field,
            order,
            markers,
            marker_count,
        }
    }
}

// ───────────────────────── Stage 6: Seeded ───────────────────────────

/// Markers placed, flooding not started.
#[must_use = "pipeline stages are consumed by advancing, call .flood() to continue"]
pub struct Seeded {
    config: PipelineConfig,
    original: RgbaImage,
    downsampled: RgbaImage,
    gray: GrayImage,
    blurred: GrayImage,
    field: GradientField,
    order: PriorityOrder,
    markers: LabelBuffer,
    marker_count: usize,
}

impl Seeded {
    /// Marker labels; every non-marker pixel is unassigned.
    #[must_use]
    pub const fn markers(&self) -> &LabelBuffer {
        &self.markers
    }

    /// Number of markers placed.
    #[must_use]
    pub const fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// Pixel indices in ascending elevation order.
    #[must_use]
    pub const fn order(&self) -> &PriorityOrder {
        &self.order
    }

    /// Metrics for the marker step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Markers {
            marker_count: self.marker_count,
            marker_order: self.config.marker_order.to_string(),
        }
    }

    /// Flood from the markers until every pixel is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConvergenceExceeded`] if flooding does
    /// not settle within its pass budget.
    pub fn flood(self) -> Result<Flooded, PipelineError> {
        let mut labels = self.markers.clone();
        let outcome = flood::flood(&self.field, &self.order, &mut labels)?;
        let region_count = count_regions(&labels);
        let dimensions = self.field.dimensions();
        Ok(Flooded {
            original: self.original,
            downsampled: self.downsampled,
            gray: self.gray,
            blurred: self.blurred,
            field: self.field,
            markers: self.markers,
            marker_count: self.marker_count,
            labels,
            outcome,
            region_count,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 7: Flooded ──────────────────────────

/// Every pixel resolved to a region or a watershed line.
#[must_use = "call .into_result() to take the staged intermediates"]
pub struct Flooded {
    original: RgbaImage,
    downsampled: RgbaImage,
    gray: GrayImage,
    blurred: GrayImage,
    field: GradientField,
    markers: LabelBuffer,
    marker_count: usize,
    labels: LabelBuffer,
    outcome: FloodOutcome,
    region_count: usize,
    dimensions: Dimensions,
}

impl Flooded {
    /// Final labels.
    #[must_use]
    pub const fn labels(&self) -> &LabelBuffer {
        &self.labels
    }

    /// Flooding statistics.
    #[must_use]
    pub const fn outcome(&self) -> FloodOutcome {
        self.outcome
    }

    /// Number of distinct regions.
    #[must_use]
    pub const fn region_count(&self) -> usize {
        self.region_count
    }

    /// Working image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Per-region pixel accounting of the final labels.
    #[must_use]
    pub fn summary(&self) -> RegionSummary {
        summarize(&self.labels)
    }

    /// Metrics for the flood step.
    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Flood {
            passes: self.outcome.passes,
            regions_grown: self.outcome.regions_grown,
            boundaries: self.outcome.boundaries,
            forced_boundaries: self.outcome.forced_boundaries,
        }
    }

    /// Consume the pipeline and return every intermediate.
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            downsampled: self.downsampled,
            grayscale: self.gray,
            blurred: self.blurred,
            gradient: self.field,
            markers: self.markers,
            marker_count: self.marker_count,
            labels: self.labels,
            flood: self.outcome,
            region_count: self.region_count,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental segmentation pipeline.
///
/// [`Pipeline::new`] only stores its inputs; see the
/// [module docs](self) for the stage chain.
pub struct Pipeline;

impl Pipeline {
    /// Store the source bytes and config without processing anything.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::BOUNDARY;

    /// Encode an RGBA image as PNG bytes.
    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    /// Black background with a white square in the middle.
    fn square_png(size: u32) -> Vec<u8> {
        let lo = size / 4;
        let hi = size - size / 4;
        let img = RgbaImage::from_fn(size, size, |x, y| {
            if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        png_bytes(&img)
    }

    #[test]
    fn full_chain_produces_resolved_labels() {
        let staged = Pipeline::new(square_png(16), PipelineConfig::default())
            .decode()
            .unwrap()
            .downsample()
            .grayscale()
            .blur()
            .gradient()
            .seed()
            .flood()
            .unwrap()
            .into_result();

        assert_eq!(staged.dimensions, Dimensions::new(16, 16));
        assert!(staged.labels.is_resolved());
        assert!(staged.region_count >= 1);
        assert!(staged.marker_count >= staged.region_count);
        assert!(staged.labels.as_slice().contains(&BOUNDARY));
    }

    #[test]
    fn decode_validates_config_first() {
        let config = PipelineConfig {
            working_resolution: 0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(square_png(8), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn decode_rejects_empty_input() {
        let result = Pipeline::new(Vec::new(), PipelineConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = Pipeline::new(vec![1, 2, 3, 4], PipelineConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn downsample_respects_working_resolution() {
        let config = PipelineConfig {
            working_resolution: 8,
            ..PipelineConfig::default()
        };
        let stage = Pipeline::new(square_png(32), config)
            .decode()
            .unwrap()
            .downsample();
        assert!(stage.applied());
        assert_eq!(stage.downsampled().dimensions(), (8, 8));
    }

    #[test]
    fn seeded_markers_are_unflooded() {
        let seeded = Pipeline::new(square_png(12), PipelineConfig::default())
            .decode()
            .unwrap()
            .downsample()
            .grayscale()
            .blur()
            .gradient()
            .seed();
        assert!(seeded.marker_count() > 0);
        assert!(!seeded.markers().is_resolved());
        assert_eq!(seeded.order().len(), 144);
    }

    #[test]
    fn staged_intermediates_share_dimensions() {
        let staged = Pipeline::new(square_png(10), PipelineConfig::default())
            .decode()
            .unwrap()
            .downsample()
            .grayscale()
            .blur()
            .gradient()
            .seed()
            .flood()
            .unwrap()
            .into_result();
        assert_eq!(staged.grayscale.dimensions(), (10, 10));
        assert_eq!(staged.blurred, staged.grayscale);
        assert_eq!(staged.gradient.dimensions(), staged.dimensions);
        assert_eq!(staged.markers.dimensions(), staged.dimensions);
    }

    #[test]
    fn flood_metrics_match_outcome() {
        let flooded = Pipeline::new(square_png(12), PipelineConfig::default())
            .decode()
            .unwrap()
            .downsample()
            .grayscale()
            .blur()
            .gradient()
            .seed()
            .flood()
            .unwrap();
        let outcome = flooded.outcome();
        assert!(matches!(
            flooded.metrics(),
            StageMetrics::Flood { passes, .. } if passes == outcome.passes
        ));
        assert_eq!(flooded.summary().region_count, flooded.region_count());
    }
}
