//! basin-pipeline: marker-controlled watershed segmentation (sans-IO).
//!
//! Turns a raster image into a label map through:
//! decode -> downsample -> grayscale -> blur -> Sobel gradient ->
//! markers -> flooding -> region report.
//!
//! The crate has no I/O of its own. It takes encoded image bytes and
//! returns in-memory buffers; reading files and writing PNGs lives in
//! `basin-export` and `basin-bench`. Logging goes through the `log`
//! facade and is silent unless the host installs a logger.

pub mod blur;
pub mod diagnostics;
pub mod downsample;
pub mod gradient;
pub mod grayscale;
pub mod pipeline;
pub mod render;
pub mod types;
pub mod watershed;

pub use downsample::DownsampleFilter;
pub use gradient::GradientBorder;
pub use pipeline::Pipeline;
pub use types::{
    BOUNDARY, Dimensions, GradientField, LabelBuffer, PipelineConfig, PipelineError,
    SegmentResult, StagedResult, UNASSIGNED,
};
pub use watershed::{MarkerOrder, PriorityOrder, Segmentation, segment_gradient};

/// Run the full segmentation pipeline.
///
/// Takes encoded image bytes (PNG, JPEG, BMP, WebP) and returns the final
/// labels with their region count. Intermediate rasters are dropped as
/// soon as the next stage no longer needs them; use [`process_staged`]
/// to keep them.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation, [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// and [`PipelineError::ImageDecode`] if the bytes are not a supported
/// image.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<SegmentResult, PipelineError> {
    config.validate()?;

    let decoded = grayscale::decode(image_bytes)?;
    let (working, _) =
        downsample::downsample(&decoded, config.working_resolution, config.downsample_filter);
    drop(decoded);

    let gray = grayscale::luminance(&grayscale::to_rgba(&working));
    let blurred = blur::gaussian_blur(&gray, config.blur_sigma);
    let field = gradient::sobel_magnitude(&blurred, config.gradient_border);

    let segmentation = segment_gradient(&field, config.marker_order)?;
    Ok(SegmentResult {
        labels: segmentation.labels,
        region_count: segmentation.region_count,
        dimensions: field.dimensions(),
    })
}

/// Run the full pipeline and keep every intermediate.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .downsample()
        .grayscale()
        .blur()
        .gradient()
        .seed()
        .flood()?
        .into_result())
}
