//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use signshape_pipeline::{Pipeline, PipelineConfig, PipelineError, ReferenceLibrary};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let library = ReferenceLibrary::build();
//! let staged = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .resize()
//!     .to_grayscale()
//!     .enhance()
//!     .detect_edges()
//!     .select_regions()
//!     .classify(&library)
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every previously computed raster forward so the final
//! [`StagedResult`] can show all panels. Callers that only need the
//! per-region verdicts should prefer [`crate::process`].
//!
//! [`RegionsSelected::classify_iter`] yields regions one at a time so a
//! display can pace itself per region without blocking the core.

use crate::annotate;
use crate::classify::ShapeClassifier;
use crate::diagnostics::{StageMetrics, count_edge_pixels, intensity_std_dev};
use crate::reference::ReferenceLibrary;
use crate::types::{
    Contour, Dimensions, GrayImage, PipelineConfig, PipelineError, RegionResult, RgbImage,
    ShapeLabel, StagedResult,
};

fn dimensions_of<P: image::Pixel>(img: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Dimensions {
    Dimensions {
        width: img.width(),
        height: img.height(),
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source bytes are
    /// empty. Returns [`PipelineError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let source_len = self.source.len();
        let original = crate::grayscale::decode(&self.source)?;
        Ok(Decoded {
            config: self.config,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state holding the full-size colour image.
///
/// Call [`resize`](Self::resize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing — call .resize() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    original: RgbImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded colour image.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Advance to the resize stage.
    pub fn resize(self) -> Resized {
        let (resized, applied) = crate::downsample::resize_if_large(
            &self.original,
            self.config.max_dimension,
            self.config.resize_filter,
        );
        Resized {
            config: self.config,
            original: dimensions_of(&self.original),
            resized,
            applied,
        }
    }
}

// ───────────────────────── Stage 2: Resized ──────────────────────────

/// Pipeline state after scaling to the working resolution.
///
/// Call [`to_grayscale`](Self::to_grayscale) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .to_grayscale() to continue"]
pub struct Resized {
    config: PipelineConfig,
    original: Dimensions,
    resized: RgbImage,
    applied: bool,
}

impl Resized {
    /// The working-resolution colour image.
    #[must_use]
    pub const fn resized(&self) -> &RgbImage {
        &self.resized
    }

    /// Whether the image was actually scaled down.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Advance to the grayscale stage.
    pub fn to_grayscale(self) -> Grayscale {
        let gray = crate::grayscale::to_grayscale(&self.resized);
        Grayscale {
            config: self.config,
            resized: self.resized,
            gray,
        }
    }
}

// ───────────────────────── Stage 3: Grayscale ────────────────────────

/// Pipeline state after intensity conversion.
///
/// Call [`enhance`](Self::enhance) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .enhance() to continue"]
pub struct Grayscale {
    config: PipelineConfig,
    resized: RgbImage,
    gray: GrayImage,
}

impl Grayscale {
    /// The single-channel intensity image.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.gray
    }

    /// Advance to the contrast enhancement stage.
    pub fn enhance(self) -> Enhanced {
        let enhanced = crate::clahe::enhance_contrast(
            &self.gray,
            self.config.clahe_clip_limit,
            self.config.clahe_tile_grid,
        );
        Enhanced {
            config: self.config,
            resized: self.resized,
            gray: self.gray,
            enhanced,
        }
    }
}

// ───────────────────────── Stage 4: Enhanced ─────────────────────────

/// Pipeline state after CLAHE.
///
/// Call [`detect_edges`](Self::detect_edges) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .detect_edges() to continue"]
pub struct Enhanced {
    config: PipelineConfig,
    resized: RgbImage,
    gray: GrayImage,
    enhanced: GrayImage,
}

impl Enhanced {
    /// The contrast-enhanced intensity image.
    #[must_use]
    pub const fn enhanced(&self) -> &GrayImage {
        &self.enhanced
    }

    /// Advance to the edge detection stage.
    pub fn detect_edges(self) -> EdgesDetected {
        let edges = crate::edge::extract_edges(
            &self.enhanced,
            self.config.canny_low,
            self.config.canny_high,
            self.config.blur_sigma,
        );
        EdgesDetected {
            config: self.config,
            resized: self.resized,
            gray: self.gray,
            enhanced: self.enhanced,
            edges,
        }
    }
}

// ───────────────────────── Stage 5: EdgesDetected ────────────────────

/// Pipeline state after Canny.
///
/// Call [`select_regions`](Self::select_regions) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .select_regions() to continue"]
pub struct EdgesDetected {
    config: PipelineConfig,
    resized: RgbImage,
    gray: GrayImage,
    enhanced: GrayImage,
    edges: GrayImage,
}

impl EdgesDetected {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Advance to the region selection stage.
    pub fn select_regions(self) -> RegionsSelected {
        let contours = crate::contour::find_regions(&self.edges, self.config.min_region_area);
        let regions_overlay = annotate::regions_overlay(&self.edges, &contours);
        RegionsSelected {
            config: self.config,
            resized: self.resized,
            gray: self.gray,
            enhanced: self.enhanced,
            edges: self.edges,
            contours,
            regions_overlay,
        }
    }
}

// ───────────────────────── Stage 6: RegionsSelected ──────────────────

/// Pipeline state holding the regions of interest.
///
/// Call [`classify`](Self::classify) to advance, or iterate
/// [`classify_iter`](Self::classify_iter) to receive regions one by one.
#[must_use = "pipeline stages are consumed by advancing — call .classify() to continue"]
pub struct RegionsSelected {
    config: PipelineConfig,
    resized: RgbImage,
    gray: GrayImage,
    enhanced: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
    regions_overlay: RgbImage,
}

impl RegionsSelected {
    /// Contours that passed the area filter, in discovery order.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// The edge map with every region outlined.
    #[must_use]
    pub const fn regions_overlay(&self) -> &RgbImage {
        &self.regions_overlay
    }

    /// Classify regions lazily, in discovery order.
    ///
    /// Each item is independent of the others, so a caller may stop
    /// early or pause between items.
    pub fn classify_iter<'a>(
        &'a self,
        library: &'a ReferenceLibrary,
    ) -> impl Iterator<Item = RegionResult> + 'a {
        let classifier = ShapeClassifier::new(library, self.config.classifier.clone());
        self.contours
            .iter()
            .enumerate()
            .map(move |(region_index, contour)| {
                let _span = tracing::debug_span!("region", index = region_index).entered();
                RegionResult {
                    region_index,
                    contour: contour.clone(),
                    classification: classifier.classify(contour),
                }
            })
    }

    /// Classify every region and advance to the [`Classified`] stage.
    pub fn classify(self, library: &ReferenceLibrary) -> Classified {
        let regions: Vec<RegionResult> = self.classify_iter(library).collect();
        let detections_overlay = annotate::detections_overlay(&self.resized, &regions);
        Classified {
            config: self.config,
            resized: self.resized,
            gray: self.gray,
            enhanced: self.enhanced,
            edges: self.edges,
            contours: self.contours,
            regions_overlay: self.regions_overlay,
            regions,
            detections_overlay,
        }
    }
}

// ───────────────────────── Stage 7: Classified ───────────────────────

/// Final pipeline state: every region has a verdict.
///
/// Call [`into_result`](Self::into_result) to collect all intermediates.
#[must_use = "pipeline stages are consumed by advancing — call .into_result() to finish"]
pub struct Classified {
    config: PipelineConfig,
    resized: RgbImage,
    gray: GrayImage,
    enhanced: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
    regions_overlay: RgbImage,
    regions: Vec<RegionResult>,
    detections_overlay: RgbImage,
}

impl Classified {
    /// Per-region results in discovery order.
    #[must_use]
    pub fn regions(&self) -> &[RegionResult] {
        &self.regions
    }

    /// The working image with labelled regions outlined.
    #[must_use]
    pub const fn detections_overlay(&self) -> &RgbImage {
        &self.detections_overlay
    }

    /// The configuration this run used.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Consume the pipeline and return every intermediate.
    pub fn into_result(self) -> StagedResult {
        let dimensions = dimensions_of(&self.resized);
        StagedResult {
            resized: self.resized,
            grayscale: self.gray,
            enhanced: self.enhanced,
            edges: self.edges,
            contours: self.contours,
            regions_overlay: self.regions_overlay,
            regions: self.regions,
            detections_overlay: self.detections_overlay,
            dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait ────────────────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 8;

/// Trait implemented by every pipeline stage, giving uniform access to
/// its name, position and metrics.
pub trait PipelineStage {
    /// Human-readable name of this stage (e.g. `"source"`, `"edges"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `7` for
    /// Classified).
    const INDEX: usize;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for the initial [`Pending`] stage which has not
    /// yet performed any processing.
    fn metrics(&self) -> Option<StageMetrics>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.original.width(),
            height: self.original.height(),
            pixel_count: u64::from(self.original.width()) * u64::from(self.original.height()),
        })
    }
}

impl PipelineStage for Resized {
    const NAME: &str = "resize";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Resize {
            original_width: self.original.width,
            original_height: self.original.height,
            width: self.resized.width(),
            height: self.resized.height(),
            max_dimension: self.config.max_dimension,
            filter: self.config.resize_filter.to_string(),
            applied: self.applied,
        })
    }
}

impl PipelineStage for Grayscale {
    const NAME: &str = "grayscale";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Grayscale {
            width: self.gray.width(),
            height: self.gray.height(),
        })
    }
}

impl PipelineStage for Enhanced {
    const NAME: &str = "enhance";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Enhance {
            clip_limit: self.config.clahe_clip_limit,
            tile_grid: self.config.clahe_tile_grid,
            std_dev_before: intensity_std_dev(&self.gray),
            std_dev_after: intensity_std_dev(&self.enhanced),
        })
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &str = "edges";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        let (low, high) = crate::edge::clamp_thresholds(self.config.canny_low, self.config.canny_high);
        Some(StageMetrics::EdgeDetection {
            blur_sigma: self.config.blur_sigma,
            low_threshold: low,
            high_threshold: high,
            edge_pixel_count: count_edge_pixels(&self.edges),
            total_pixel_count: u64::from(self.edges.width()) * u64::from(self.edges.height()),
        })
    }
}

impl PipelineStage for RegionsSelected {
    const NAME: &str = "regions";
    const INDEX: usize = 6;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::RegionSelection {
            min_area: self.config.min_region_area,
            region_count: self.contours.len(),
            total_point_count: self.contours.iter().map(Contour::len).sum(),
            largest_area: self
                .contours
                .iter()
                .map(Contour::area)
                .fold(0.0, f64::max),
        })
    }
}

impl PipelineStage for Classified {
    const NAME: &str = "classify";
    const INDEX: usize = 7;

    fn metrics(&self) -> Option<StageMetrics> {
        let count = |label: Option<ShapeLabel>| {
            self.regions.iter().filter(|r| r.label() == label).count()
        };
        Some(StageMetrics::Classification {
            region_count: self.regions.len(),
            regulatory_count: count(Some(ShapeLabel::Regulatory)),
            warning_count: count(Some(ShapeLabel::Warning)),
            unclassified_count: count(None),
            circle_threshold: self.config.classifier.circle_threshold,
        })
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental sign-detection pipeline.
///
/// Created via [`Pipeline::new`] from encoded bytes or
/// [`Pipeline::from_image`] from pixels already in memory. Neither
/// validates the configuration; [`crate::process`] and friends do.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline from encoded image bytes.
    pub const fn new(source: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending { config, source }
    }

    /// Start a pipeline from a decoded colour image, skipping the decode
    /// stage. Decode metrics report zero input bytes.
    pub const fn from_image(image: RgbImage, config: PipelineConfig) -> Decoded {
        Decoded {
            config,
            original: image,
            source_len: 0,
        }
    }
}
