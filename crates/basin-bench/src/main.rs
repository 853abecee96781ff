//! basin-bench: run watershed segmentation on an image file and report
//! per-stage diagnostics.
//!
//! Useful for:
//!
//! - Seeing how blur sigma and working resolution change marker and
//!   region counts
//! - Measuring per-stage durations, flooding in particular
//! - Writing boundary, region, and gradient images for inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin basin-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use basin_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use basin_pipeline::{
    DownsampleFilter, GradientBorder, MarkerOrder, PipelineConfig, StagedResult,
};
use clap::{ArgAction, Parser, ValueEnum};
use log::{LevelFilter, info};

/// Watershed segmentation diagnostics for basin.
///
/// Segments the given image with configurable parameters and prints
/// per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "basin-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Working resolution (max dimension in pixels after downsampling).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WORKING_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: u32,

    /// Downsample filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Gaussian blur sigma applied before the gradient (0 disables).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// How the Sobel operator treats the image border.
    #[arg(long, value_enum, default_value_t = Border::Zero)]
    gradient_border: Border,

    /// Order in which markers are numbered.
    #[arg(long, value_enum, default_value_t = Order::Raster)]
    marker_order: Order,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Write watershed lines (white on black) as PNG.
    #[arg(long)]
    boundaries: Option<PathBuf>,

    /// Write colored regions as PNG.
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Write the gradient magnitude preview as PNG.
    #[arg(long)]
    gradient: Option<PathBuf>,

    /// Write the label grid as text, one row per line.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: keep the full decoded resolution.
    Disabled,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes (sharpest).
    Lanczos3,
}

/// Sobel border policy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Border {
    /// Border pixels hold magnitude 0.
    Zero,
    /// Replicate edge pixels and evaluate every pixel.
    Clamp,
}

/// Marker numbering selection.
#[derive(Clone, Copy, ValueEnum)]
enum Order {
    /// Raster order (row, then column).
    Raster,
    /// Ascending gradient, deepest basin first.
    Elevation,
}

/// Maps a [`DownsampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::None => Filter::Disabled,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// Derived from [`PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER`] so the two
/// cannot drift apart.
const CLI_DEFAULT_FILTER: Filter =
    filter_from_pipeline(PipelineConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` wins over the individual flags when present.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        working_resolution: cli.working_resolution,
        downsample_filter: match cli.downsample_filter {
            Filter::Disabled => DownsampleFilter::None,
            Filter::Nearest => DownsampleFilter::Nearest,
            Filter::Triangle => DownsampleFilter::Triangle,
            Filter::CatmullRom => DownsampleFilter::CatmullRom,
            Filter::Gaussian => DownsampleFilter::Gaussian,
            Filter::Lanczos3 => DownsampleFilter::Lanczos3,
        },
        blur_sigma: cli.blur_sigma,
        gradient_border: match cli.gradient_border {
            Border::Zero => GradientBorder::Zero,
            Border::Clamp => GradientBorder::Clamp,
        },
        marker_order: match cli.marker_order {
            Order::Raster => MarkerOrder::Raster,
            Order::Elevation => MarkerOrder::Elevation,
        },
    })
}

/// Install the logger: `warn` by default, raised by `-v`, and
/// overridden by `RUST_LOG` when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    info!(
        "image {} ({} bytes), {} run(s)",
        cli.image_path.display(),
        image_bytes.len(),
        cli.runs,
    );
    info!("config: {config:?}");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match basin_pipeline::diagnostics::process_staged_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Outputs are identical across runs; write them once.
                if run == 0 && !write_outputs(&cli, &staged) {
                    return ExitCode::FAILURE;
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Write every requested output file. Returns `false` after reporting
/// the first failure.
fn write_outputs(cli: &Cli, staged: &StagedResult) -> bool {
    write_output(cli.boundaries.as_deref(), "boundaries", || {
        basin_export::boundaries_png(&staged.labels).map_err(|e| e.to_string())
    }) && write_output(cli.regions.as_deref(), "regions", || {
        basin_export::regions_png(&staged.labels).map_err(|e| e.to_string())
    }) && write_output(cli.gradient.as_deref(), "gradient", || {
        basin_export::gradient_png(&staged.gradient).map_err(|e| e.to_string())
    }) && write_output(cli.labels.as_deref(), "labels", || {
        Ok(basin_export::to_label_text(&staged.labels).into_bytes())
    })
}

/// Encode one output and write it to `path`, if a path was given.
fn write_output(
    path: Option<&Path>,
    what: &str,
    produce: impl FnOnce() -> Result<Vec<u8>, String>,
) -> bool {
    let Some(path) = path else {
        return true;
    };
    let bytes = match produce() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error encoding {what}: {e}");
            return false;
        }
    };
    match std::fs::write(path, &bytes) {
        Ok(()) => {
            eprintln!("{what} written to {} ({} bytes)", path.display(), bytes.len());
            true
        }
        Err(e) => {
            eprintln!("Error writing {what} to {}: {e}", path.display());
            false
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    for (i, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[i].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("basin-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_pipeline_config() {
        let cli = parse(&["image.png"]);
        assert_eq!(config_from_cli(&cli).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&[
            "image.png",
            "--working-resolution",
            "64",
            "--downsample-filter",
            "disabled",
            "--blur-sigma",
            "1.5",
            "--gradient-border",
            "clamp",
            "--marker-order",
            "elevation",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.working_resolution, 64);
        assert_eq!(config.downsample_filter, DownsampleFilter::None);
        assert!((config.blur_sigma - 1.5).abs() < f32::EPSILON);
        assert_eq!(config.gradient_border, GradientBorder::Clamp);
        assert_eq!(config.marker_order, MarkerOrder::Elevation);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "image.png",
            "--blur-sigma",
            "3.0",
            "--config-json",
            r#"{"working_resolution":32}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.working_resolution, 32);
        assert!(config.blur_sigma.abs() < f32::EPSILON);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["image.png", "--config-json", "{"]);
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn zero_runs_are_rejected() {
        let result = Cli::try_parse_from(["basin-bench", "image.png", "--runs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn verbosity_counts_repeats() {
        assert_eq!(parse(&["image.png", "-vv"]).verbose, 2);
    }
}
