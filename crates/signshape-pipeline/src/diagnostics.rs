//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_staged_with_diagnostics`] runs the staged
//! pipeline and records one [`StageDiagnostics`] per stage.
//!
//! The core performs no I/O, so the time source is supplied by the host
//! through the [`Clock`] trait.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::reference::ReferenceLibrary;
use crate::types::{PipelineConfig, PipelineError, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Host-provided monotonic time source.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 2: resize to working resolution.
    pub resize: StageDiagnostics,
    /// Stage 3: grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 4: CLAHE.
    pub enhance: StageDiagnostics,
    /// Stage 5: blur and Canny.
    pub edge_detection: StageDiagnostics,
    /// Stage 6: contour tracing and area filtering.
    pub region_selection: StageDiagnostics,
    /// Stage 7: per-region classification.
    pub classification: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name as reported by [`PipelineStage::NAME`].
    pub stage: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.), absent for a stage
    /// that did no work.
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes (0 when started from pixels).
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Resize metrics.
    Resize {
        /// Width before resizing.
        original_width: u32,
        /// Height before resizing.
        original_height: u32,
        /// Width after resizing.
        width: u32,
        /// Height after resizing.
        height: u32,
        /// Configured longest side.
        max_dimension: u32,
        /// Resampling filter name.
        filter: String,
        /// Whether the image was scaled.
        applied: bool,
    },
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// CLAHE metrics.
    Enhance {
        /// Clip limit used.
        clip_limit: f32,
        /// Tiles per axis.
        tile_grid: u32,
        /// Intensity standard deviation of the input.
        std_dev_before: f64,
        /// Intensity standard deviation of the output.
        std_dev_after: f64,
    },
    /// Blur and Canny metrics.
    EdgeDetection {
        /// Blur sigma.
        blur_sigma: f32,
        /// Low threshold (after clamping).
        low_threshold: f32,
        /// High threshold (after clamping).
        high_threshold: f32,
        /// Number of edge pixels (value == 255) in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Region selection metrics.
    RegionSelection {
        /// Minimum enclosed area.
        min_area: f64,
        /// Regions kept.
        region_count: usize,
        /// Points across all kept contours.
        total_point_count: usize,
        /// Largest enclosed area among kept regions.
        largest_area: f64,
    },
    /// Classification metrics.
    Classification {
        /// Regions classified.
        region_count: usize,
        /// Regions labelled regulatory.
        regulatory_count: usize,
        /// Regions labelled warning.
        warning_count: usize,
        /// Regions left without a label.
        unclassified_count: usize,
        /// Circle-match threshold in effect.
        circle_threshold: f64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Working image width in pixels.
    pub working_width: u32,
    /// Working image height in pixels.
    pub working_height: u32,
    /// Regions of interest found.
    pub region_count: usize,
    /// Regions that received a label.
    pub detection_count: usize,
}

impl PipelineDiagnostics {
    /// Per-stage entries in pipeline order, paired with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Decode", &self.decode),
            ("Resize", &self.resize),
            ("Grayscale", &self.grayscale),
            ("Enhance (CLAHE)", &self.enhance),
            ("Edge Detection", &self.edge_detection),
            ("Region Selection", &self.region_selection),
            ("Classification", &self.classification),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} -> working {}x{}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.working_width,
            self.summary.working_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
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
            let details = diag.metrics.as_ref().map_or_else(String::new, format_metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Regions: {}  |  Detections: {}",
            self.summary.region_count, self.summary.detection_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Resize {
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
        StageMetrics::Enhance {
            clip_limit,
            tile_grid,
            std_dev_before,
            std_dev_after,
        } => format!(
            "clip={clip_limit:.1} grid={tile_grid} std {std_dev_before:.1}->{std_dev_after:.1}",
        ),
        StageMetrics::EdgeDetection {
            blur_sigma,
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "sigma={blur_sigma:.2} low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::RegionSelection {
            min_area,
            region_count,
            total_point_count,
            largest_area,
        } => format!(
            "{region_count} regions >= {min_area:.0}px², {total_point_count} pts, largest={largest_area:.0}px²",
        ),
        StageMetrics::Classification {
            regulatory_count,
            warning_count,
            unclassified_count,
            circle_threshold,
            ..
        } => format!(
            "regulatory={regulatory_count} warning={warning_count} none={unclassified_count} (circle<{circle_threshold})",
        ),
    }
}

/// Count edge pixels (value == 255) in a grayscale image.
pub(crate) fn count_edge_pixels(image: &image::GrayImage) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == 255)))
        .sum()
}

/// Population standard deviation of pixel intensities.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn intensity_std_dev(image: &image::GrayImage) -> f64 {
    let n = image.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let count = n as f64;
    let mean = image.as_raw().iter().map(|&v| f64::from(v)).sum::<f64>() / count;
    let var = image
        .as_raw()
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / count;
    var.sqrt()
}

/// Time one stage transition.
fn timed<C: Clock, S>(clock: &C, advance: impl FnOnce() -> S) -> (S, Duration) {
    let start = clock.now();
    let stage = advance();
    (stage, clock.elapsed(&start))
}

fn record<S: PipelineStage>(stage: &S, duration: Duration) -> StageDiagnostics {
    StageDiagnostics {
        stage: S::NAME.to_string(),
        duration,
        metrics: stage.metrics(),
    }
}

/// Run the staged pipeline on encoded image bytes, timing every stage.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation, and the decode errors of [`crate::process_staged`].
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    library: &ReferenceLibrary,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let run_start = clock.now();

    let start = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let decode = record(&decoded, clock.elapsed(&start));
    let (image_width, image_height) = decoded.original().dimensions();

    let (resized, t) = timed(clock, || decoded.resize());
    let resize = record(&resized, t);
    let (gray, t) = timed(clock, || resized.to_grayscale());
    let grayscale = record(&gray, t);
    let (enhanced, t) = timed(clock, || gray.enhance());
    let enhance = record(&enhanced, t);
    let (edges, t) = timed(clock, || enhanced.detect_edges());
    let edge_detection = record(&edges, t);
    let (regions, t) = timed(clock, || edges.select_regions());
    let region_selection = record(&regions, t);
    let (classified, t) = timed(clock, || regions.classify(library));
    let classification = record(&classified, t);

    let staged = classified.into_result();
    let total_duration = clock.elapsed(&run_start);

    let summary = PipelineSummary {
        image_width,
        image_height,
        working_width: staged.dimensions.width,
        working_height: staged.dimensions.height,
        region_count: staged.regions.len(),
        detection_count: staged.regions.iter().filter(|r| r.label().is_some()).count(),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            decode,
            resize,
            grayscale,
            enhance,
            edge_detection,
            region_selection,
            classification,
            total_duration,
            summary,
        },
    ))
}
