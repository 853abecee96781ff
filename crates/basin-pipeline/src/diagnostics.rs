//! Per-stage timing and counts for a pipeline run.
//!
//! [`process_staged_with_diagnostics`] drives the [`Pipeline`] one stage
//! at a time, timing each transition with a caller-supplied [`Clock`] and
//! collecting the stage's [`StageMetrics`]. The crate itself never reads
//! the system time, so it stays usable where `std::time::Instant` is not.
//!
//! Durations serialize as fractional seconds (`f64`) since
//! `std::time::Duration` has no serde support of its own.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{PipelineConfig, PipelineError, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| serde::de::Error::custom("duration must be finite and non-negative seconds"))
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding.
    pub decode: StageDiagnostics,
    /// Working-resolution cap.
    pub downsample: StageDiagnostics,
    /// Luminance conversion.
    pub grayscale: StageDiagnostics,
    /// Gaussian pre-blur.
    pub blur: StageDiagnostics,
    /// Sobel gradient magnitude.
    pub gradient: StageDiagnostics,
    /// Priority order and marker detection.
    pub markers: StageDiagnostics,
    /// Flooding.
    pub flood: StageDiagnostics,
    /// Region reporting.
    pub regions: StageDiagnostics,
    /// Wall-clock duration of the whole run.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Headline counts.
    pub summary: PipelineSummary,
}

/// Diagnostics for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of the stage.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding.
    Decode {
        /// Size of the encoded input.
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
        /// `width * height`.
        pixel_count: u64,
    },
    /// Working-resolution cap.
    Downsample {
        /// Width before resizing.
        original_width: u32,
        /// Height before resizing.
        original_height: u32,
        /// Width after resizing.
        width: u32,
        /// Height after resizing.
        height: u32,
        /// Configured longest-axis cap.
        max_dimension: u32,
        /// Resampling filter name.
        filter: String,
        /// Whether the image was resized.
        applied: bool,
    },
    /// Luminance conversion.
    Grayscale {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Gaussian pre-blur.
    Blur {
        /// Configured sigma.
        sigma: f32,
        /// `false` when sigma disabled the blur.
        applied: bool,
    },
    /// Sobel gradient magnitude.
    Gradient {
        /// Border policy name.
        border: String,
        /// Smallest magnitude.
        min: f32,
        /// Largest magnitude.
        max: f32,
        /// Mean magnitude.
        mean: f64,
    },
    /// Marker detection.
    Markers {
        /// Markers placed.
        marker_count: usize,
        /// Marker numbering name.
        marker_order: String,
    },
    /// Flooding.
    Flood {
        /// Sweeps over the priority order.
        passes: usize,
        /// Pixels that joined a region.
        regions_grown: usize,
        /// Pixels that became watershed lines.
        boundaries: usize,
        /// Unreached pixels forced to boundary.
        forced_boundaries: usize,
    },
    /// Region reporting.
    Regions {
        /// Distinct regions.
        region_count: usize,
        /// Watershed-line pixels.
        boundary_pixels: usize,
        /// Area of the largest region.
        largest_area: usize,
        /// Area of the smallest region.
        smallest_area: usize,
    },
}

/// Headline counts for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Working image pixel count.
    pub pixel_count: u64,
    /// Markers placed.
    pub marker_count: usize,
    /// Regions after flooding.
    pub region_count: usize,
    /// Flooding sweeps.
    pub passes: usize,
}

impl PipelineDiagnostics {
    /// Stages in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 8] {
        [
            ("Decode", &self.decode),
            ("Downsample", &self.downsample),
            ("Grayscale", &self.grayscale),
            ("Blur", &self.blur),
            ("Gradient", &self.gradient),
            ("Markers", &self.markers),
            ("Flood", &self.flood),
            ("Regions", &self.regions),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Markers: {}  |  Regions: {}  |  Passes: {}",
            self.summary.marker_count, self.summary.region_count, self.summary.passes,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Compact one-line rendering of stage metrics.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Downsample {
            original_width,
            original_height,
            width,
            height,
            filter,
            applied,
            ..
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} ({filter})")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Blur { sigma, applied } => {
            if *applied {
                format!("sigma={sigma:.2}")
            } else {
                "skipped".to_string()
            }
        }
        StageMetrics::Gradient {
            border,
            min,
            max,
            mean,
        } => format!("{border} border, min={min:.1} max={max:.1} mean={mean:.2}"),
        StageMetrics::Markers {
            marker_count,
            marker_order,
        } => format!("{marker_count} markers ({marker_order})"),
        StageMetrics::Flood {
            passes,
            regions_grown,
            boundaries,
            forced_boundaries,
        } => format!(
            "{passes} passes, grown={regions_grown} boundary={boundaries} forced={forced_boundaries}"
        ),
        StageMetrics::Regions {
            region_count,
            boundary_pixels,
            largest_area,
            smallest_area,
        } => format!(
            "{region_count} regions, {boundary_pixels} boundary px (area {smallest_area}..={largest_area})"
        ),
    }
}

/// Time `f` with `clock`, returning its output and the elapsed duration.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let run_start = clock.now();

    let pending = Pipeline::new(image_bytes.to_vec(), config.clone());
    let (decoded, decode_time) = timed(clock, || pending.decode());
    let decoded = decoded?;
    let decode = StageDiagnostics {
        duration: decode_time,
        metrics: decoded.metrics(),
    };

    let (downsampled, duration) = timed(clock, || decoded.downsample());
    let downsample = StageDiagnostics {
        duration,
        metrics: downsampled.metrics(),
    };

    let (grayscaled, duration) = timed(clock, || downsampled.grayscale());
    let grayscale = StageDiagnostics {
        duration,
        metrics: grayscaled.metrics(),
    };

    let (blurred, duration) = timed(clock, || grayscaled.blur());
    let blur = StageDiagnostics {
        duration,
        metrics: blurred.metrics(),
    };

    let (with_gradient, duration) = timed(clock, || blurred.gradient());
    let gradient = StageDiagnostics {
        duration,
        metrics: with_gradient.metrics(),
    };

    let (seeded, duration) = timed(clock, || with_gradient.seed());
    let markers = StageDiagnostics {
        duration,
        metrics: seeded.metrics(),
    };

    let (flooded, duration) = timed(clock, || seeded.flood());
    let flooded = flooded?;
    let flood = StageDiagnostics {
        duration,
        metrics: flooded.metrics(),
    };

    let (region_summary, duration) = timed(clock, || flooded.summary());
    let regions = StageDiagnostics {
        duration,
        metrics: StageMetrics::Regions {
            region_count: region_summary.region_count,
            boundary_pixels: region_summary.boundary_pixels,
            largest_area: region_summary.largest_area,
            smallest_area: region_summary.smallest_area,
        },
    };

    let staged = flooded.into_result();
    let total_duration = clock.elapsed(&run_start);

    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: u64::from(staged.dimensions.width) * u64::from(staged.dimensions.height),
        marker_count: staged.marker_count,
        region_count: staged.region_count,
        passes: staged.flood.passes,
    };
    debug!(
        "pipeline finished in {:.3}ms: {} regions",
        duration_ms(total_duration),
        summary.region_count
    );

    Ok((
        staged,
        PipelineDiagnostics {
            decode,
            downsample,
            grayscale,
            blur,
            gradient,
            markers,
            flood,
            regions,
            total_duration,
            summary,
        },
    ))
}
