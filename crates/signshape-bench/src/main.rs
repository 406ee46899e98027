//! signshape-bench: CLI tool for running sign detection on image files.
//!
//! Runs the detection pipeline on a given image file with configurable
//! parameters, printing the per-region verdicts and detailed per-stage
//! diagnostics. Useful for:
//!
//! - Tuning CLAHE, blur and Canny parameters for a set of photographs
//! - Checking which regions survive the area filter and why each one was
//!   (or was not) labelled
//! - Measuring per-stage durations to identify bottlenecks
//! - Dumping every intermediate image for visual inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin signshape-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); use
//! `RUST_LOG=signshape_pipeline=debug` to see per-region vertex counts
//! and circle differences.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use signshape_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use signshape_pipeline::{
    ClassifierConfig, PipelineConfig, ReferenceLibrary, ResizeFilter, StagedResult,
};
use tracing_subscriber::EnvFilter;

/// Traffic-sign shape detection with diagnostics.
///
/// Runs the detection pipeline on a given image with configurable
/// parameters and prints one line per region of interest followed by
/// per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "signshape-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Longest side of the working image in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_DIMENSION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_dimension: u32,

    /// Resize filter (disabled, nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resize_filter: Filter,

    /// CLAHE clip limit.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_CLIP_LIMIT)]
    clip_limit: f32,

    /// CLAHE tiles per axis.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLAHE_TILE_GRID, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    tile_grid: u32,

    /// Gaussian blur sigma applied before Canny.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Canny low threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Minimum enclosed contour area in square pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_REGION_AREA)]
    min_area: f64,

    /// Mean squared signature difference below which a curved outline
    /// counts as a circle.
    #[arg(long, default_value_t = ClassifierConfig::DEFAULT_CIRCLE_THRESHOLD)]
    circle_threshold: f64,

    /// Write every intermediate image as PNG into this directory.
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output region results and diagnostics as one JSON object per run
    /// instead of the human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Resize filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: keep the decoded resolution.
    Disabled,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`ResizeFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: ResizeFilter) -> Filter {
    match f {
        ResizeFilter::Disabled => Filter::Disabled,
        ResizeFilter::Nearest => Filter::Nearest,
        ResizeFilter::Triangle => Filter::Triangle,
        ResizeFilter::CatmullRom => Filter::CatmullRom,
        ResizeFilter::Gaussian => Filter::Gaussian,
        ResizeFilter::Lanczos3 => Filter::Lanczos3,
    }
}

const fn filter_to_pipeline(f: Filter) -> ResizeFilter {
    match f {
        Filter::Disabled => ResizeFilter::Disabled,
        Filter::Nearest => ResizeFilter::Nearest,
        Filter::Triangle => ResizeFilter::Triangle,
        Filter::CatmullRom => ResizeFilter::CatmullRom,
        Filter::Gaussian => ResizeFilter::Gaussian,
        Filter::Lanczos3 => ResizeFilter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`PipelineConfig::DEFAULT_RESIZE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_RESIZE_FILTER);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        max_dimension: cli.max_dimension,
        resize_filter: filter_to_pipeline(cli.resize_filter),
        clahe_clip_limit: cli.clip_limit,
        clahe_tile_grid: cli.tile_grid,
        blur_sigma: cli.blur_sigma,
        canny_low: cli.canny_low,
        canny_high: cli.canny_high,
        min_region_area: cli.min_area,
        classifier: ClassifierConfig {
            circle_threshold: cli.circle_threshold,
            ..ClassifierConfig::default()
        },
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

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

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let library = ReferenceLibrary::build();
    tracing::debug!(shapes = library.entries().len(), "reference library ready");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match signshape_pipeline::diagnostics::process_staged_with_diagnostics(
            &image_bytes,
            &config,
            &library,
            &StdClock,
        ) {
            Ok((staged, diagnostics)) => {
                // Per-region verdicts and image dumps on the first run only.
                if run == 0 {
                    if !cli.json {
                        print_regions(&staged);
                    }
                    if let Some(ref dir) = cli.dump_dir
                        && let Err(e) = dump_stages(&staged, dir)
                    {
                        eprintln!("Error writing images to {}: {e}", dir.display());
                        return ExitCode::FAILURE;
                    }
                }

                if cli.json {
                    match json_report(&staged, &diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing results: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs. In JSON mode stdout carries only
    // the per-run objects.
    if cli.runs > 1 {
        let summary = multi_run_summary(&all_diagnostics);
        if cli.json {
            eprint!("{summary}");
        } else {
            print!("{summary}");
        }
    }

    ExitCode::SUCCESS
}

/// One JSON document holding the per-region results and the run's
/// diagnostics.
fn json_report(
    staged: &StagedResult,
    diagnostics: &PipelineDiagnostics,
) -> Result<String, serde_json::Error> {
    let mut report = serde_json::Map::new();
    report.insert("regions".to_string(), serde_json::to_value(&staged.regions)?);
    report.insert("diagnostics".to_string(), serde_json::to_value(diagnostics)?);
    serde_json::to_string_pretty(&report)
}

/// Print one line per region of interest and the detection count.
fn print_regions(staged: &StagedResult) {
    if staged.regions.is_empty() {
        println!("no regions of interest found");
        println!();
        return;
    }

    for region in &staged.regions {
        match region.label() {
            Some(label) => println!("ROI {}: {label}", region.region_index + 1),
            None => println!("ROI {}: no match", region.region_index + 1),
        }
    }
    let detected = staged.regions.iter().filter(|r| r.label().is_some()).count();
    println!(
        "{detected} of {} regions classified as signs",
        staged.regions.len()
    );
    println!();
}

/// Write every intermediate raster of `staged` into `dir` as PNG.
fn dump_stages(staged: &StagedResult, dir: &Path) -> Result<(), image::ImageError> {
    std::fs::create_dir_all(dir)?;
    staged.resized.save(dir.join("resized.png"))?;
    staged.grayscale.save(dir.join("grayscale.png"))?;
    staged.enhanced.save(dir.join("enhanced.png"))?;
    staged.edges.save(dir.join("edges.png"))?;
    staged.regions_overlay.save(dir.join("regions.png"))?;
    staged.detections_overlay.save(dir.join("detections.png"))?;
    eprintln!("Stage images written to {}", dir.display());
    Ok(())
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

/// Aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) -> String {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    let mut lines = vec![
        String::new(),
        format!("Summary ({} runs)\n{}", all_diagnostics.len(), "=".repeat(60)),
    ];

    let Some(first) = all_diagnostics.first() else {
        lines.push("Warning: no diagnostics to summarize".to_string());
        return lines.join("\n") + "\n";
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    lines.push(format!(
        "Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms"
    ));

    // Per-stage means, in pipeline order.
    lines.push(String::new());
    lines.push(format!("{:<24} {:>12}", "Stage", "Mean (ms)"));
    lines.push("-".repeat(40));

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        lines.push(format!("{name:<24} {stage_mean:>10.3}ms"));
    }

    lines.join("\n") + "\n"
}
