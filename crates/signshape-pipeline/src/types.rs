//! Shared types for the signshape detection pipeline.

use std::fmt;

use geo::{Area, Centroid};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassifierConfig, Classification};
use crate::downsample::ResizeFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can pass decoded colour
/// images without depending on `image` directly.
pub use image::RgbImage;

/// A pixel position on the image grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Euclidean distance to a sub-pixel location.
    #[must_use]
    pub fn distance_to(self, x: f64, y: f64) -> f64 {
        (f64::from(self.x) - x).hypot(f64::from(self.y) - y)
    }

    fn to_coord(self) -> geo::Coord<f64> {
        geo::Coord {
            x: f64::from(self.x),
            y: f64::from(self.y),
        }
    }
}

/// A closed region boundary: an ordered sequence of pixel positions
/// where the last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a contour from points in traversal order.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    fn to_polygon(&self) -> geo::Polygon<f64> {
        let ring: Vec<geo::Coord<f64>> = self.0.iter().map(|p| p.to_coord()).collect();
        geo::Polygon::new(geo::LineString::new(ring), Vec::new())
    }

    /// Enclosed area by the shoelace formula, independent of winding.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.0.len() < 3 {
            return 0.0;
        }
        self.to_polygon().unsigned_area()
    }

    /// Total boundary length including the closing segment.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        if self.0.len() < 2 {
            return 0.0;
        }
        self.0
            .iter()
            .zip(self.0.iter().cycle().skip(1))
            .map(|(&a, &b)| a.distance(b))
            .sum()
    }

    /// Area-weighted centroid of the enclosed region.
    ///
    /// Returns `None` when the enclosed area is zero, since the first
    /// moment cannot be normalized.
    #[must_use]
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.area() == 0.0 {
            return None;
        }
        self.to_polygon().centroid().map(|c| (c.x(), c.y()))
    }
}

/// Normalized radial-distance profile of a contour.
///
/// One value per contour point, in the contour's traversal order. Values
/// lie in `[0, 1]`; the point farthest from the centroid maps to exactly
/// `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature(Vec<f64>);

impl Signature {
    /// Wrap a sequence of normalized distances.
    #[must_use]
    pub const fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Returns `true` if the signature has no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// The samples in traversal order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Resample to `len` samples by linear interpolation.
    ///
    /// Samples are treated as cells: the centre of output sample `i`
    /// maps to source position `(i + 0.5) * n / len - 0.5`, clamped to
    /// the first and last source centres. When upsampling the outermost
    /// outputs repeat the source ends; in general the first and last
    /// outputs are not pinned to the source ends.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn resample(&self, len: usize) -> Self {
        let n = self.0.len();
        if n == 0 || len == 0 {
            return Self(Vec::new());
        }
        let scale = n as f64 / len as f64;
        let last = (n - 1) as f64;
        let values = (0..len)
            .map(|i| {
                let src = (i as f64 + 0.5).mul_add(scale, -0.5).clamp(0.0, last);
                let lo = src.floor() as usize;
                let hi = (lo + 1).min(n - 1);
                let t = src - lo as f64;
                self.0[lo].mul_add(1.0 - t, self.0[hi] * t)
            })
            .collect();
        Self(values)
    }

    /// Mean squared error against `other` after resampling both to
    /// `len` samples. Index-wise, with no alignment of starting point or
    /// direction.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_squared_error(&self, other: &Self, len: usize) -> f64 {
        let a = self.resample(len);
        let b = other.resample(len);
        if a.is_empty() || b.is_empty() {
            return f64::INFINITY;
        }
        let sum: f64 = a
            .0
            .iter()
            .zip(&b.0)
            .map(|(x, y)| (x - y) * (x - y))
            .sum();
        sum / len as f64
    }
}

/// Sign category assigned to a region outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeLabel {
    /// Regulatory sign: circle, octagon or triangle outline.
    Regulatory,
    /// Warning sign: diamond outline.
    Warning,
}

impl fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regulatory => f.write_str("regulatory"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Configuration for the detection pipeline.
///
/// Defaults reproduce the tuning the detector was calibrated with:
/// 350 px working size, CLAHE with an 8×8 grid and clip limit 2,
/// Canny thresholds 100/120 and a 500 px² minimum region area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest image side after resizing. Larger images are scaled down
    /// uniformly; smaller ones are left alone.
    pub max_dimension: u32,

    /// Resampling filter used when resizing.
    pub resize_filter: ResizeFilter,

    /// CLAHE clip limit, relative to a uniform histogram.
    pub clahe_clip_limit: f32,

    /// Number of CLAHE tiles along each axis.
    pub clahe_tile_grid: u32,

    /// Gaussian sigma applied before Canny.
    pub blur_sigma: f32,

    /// Canny low (hysteresis) threshold.
    pub canny_low: f32,

    /// Canny high (strong edge) threshold.
    pub canny_high: f32,

    /// Contours enclosing less than this area (px²) are discarded.
    pub min_region_area: f64,

    /// Shape classifier parameters.
    pub classifier: ClassifierConfig,
}

impl PipelineConfig {
    /// Default longest side after resizing.
    pub const DEFAULT_MAX_DIMENSION: u32 = 350;
    /// Default resampling filter.
    pub const DEFAULT_RESIZE_FILTER: ResizeFilter = ResizeFilter::Triangle;
    /// Default CLAHE clip limit.
    pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;
    /// Default CLAHE tile grid.
    pub const DEFAULT_CLAHE_TILE_GRID: u32 = 8;
    /// Default blur sigma (what a 5×5 Gaussian kernel implies).
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.1;
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 100.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 120.0;
    /// Default minimum region area.
    pub const DEFAULT_MIN_REGION_AREA: f64 = 500.0;

    /// Check the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_dimension == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_dimension must be positive".to_string(),
            ));
        }
        if self.clahe_tile_grid == 0 {
            return Err(PipelineError::InvalidConfig(
                "clahe_tile_grid must be positive".to_string(),
            ));
        }
        if !(self.clahe_clip_limit > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "clahe_clip_limit must be positive".to_string(),
            ));
        }
        if !(self.canny_low >= 0.0) || !(self.canny_high >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "canny thresholds must be non-negative".to_string(),
            ));
        }
        if !(self.min_region_area >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "min_region_area must be non-negative".to_string(),
            ));
        }
        self.classifier.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            resize_filter: Self::DEFAULT_RESIZE_FILTER,
            clahe_clip_limit: Self::DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_tile_grid: Self::DEFAULT_CLAHE_TILE_GRID,
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            min_region_area: Self::DEFAULT_MIN_REGION_AREA,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Outcome for one region of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionResult {
    /// Zero-based position in discovery order.
    pub region_index: usize,
    /// The region boundary.
    pub contour: Contour,
    /// Classifier verdict and debug values, serialized inline with the
    /// region fields.
    #[serde(flatten)]
    pub classification: Classification,
}

impl RegionResult {
    /// The assigned label, if any.
    #[must_use]
    pub const fn label(&self) -> Option<ShapeLabel> {
        self.classification.label
    }

    /// The region's signature, if the contour was not degenerate.
    #[must_use]
    pub const fn signature(&self) -> Option<&Signature> {
        self.classification.signature.as_ref()
    }
}

/// Result of running the full detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// One entry per region of interest, in discovery order. Empty when
    /// no region passed the area filter.
    pub regions: Vec<RegionResult>,

    /// Dimensions of the working (resized) image in pixels.
    pub dimensions: Dimensions,
}

impl AnalysisResult {
    /// Regions that received a label.
    pub fn detections(&self) -> impl Iterator<Item = &RegionResult> {
        self.regions.iter().filter(|r| r.label().is_some())
    }
}

/// Result of running the pipeline with all intermediate stage outputs preserved.
///
/// Each raster field is one panel of the analysis view: the working
/// image, its grayscale and contrast-enhanced versions, the edge map, the
/// edge map with region outlines drawn on it, and the working image with
/// accepted detections drawn on it.
///
/// Uses custom `Serialize`/`Deserialize` implementations because raster
/// images from the `image` crate do not implement serde traits. Raster
/// images are serialized as `(width, height, raw_pixels)` tuples.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 1: resized colour image.
    pub resized: RgbImage,
    /// Stage 2: single-channel intensity.
    pub grayscale: GrayImage,
    /// Stage 3: CLAHE-enhanced intensity.
    pub enhanced: GrayImage,
    /// Stage 4: binary edge map.
    pub edges: GrayImage,
    /// Stage 5: regions of interest that passed the area filter.
    pub contours: Vec<Contour>,
    /// Stage 5 overlay: edge map with region outlines.
    pub regions_overlay: RgbImage,
    /// Stage 6: per-region classification.
    pub regions: Vec<RegionResult>,
    /// Stage 6 overlay: resized image with classified regions outlined.
    pub detections_overlay: RgbImage,
    /// Working image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the rasters and keep the per-region results.
    #[must_use]
    pub fn into_analysis(self) -> AnalysisResult {
        AnalysisResult {
            regions: self.regions,
            dimensions: self.dimensions,
        }
    }
}

/// Serde-compatible proxy for `StagedResult`.
#[derive(Serialize, Deserialize)]
struct StagedResultProxy {
    resized: (u32, u32, Vec<u8>),
    grayscale: (u32, u32, Vec<u8>),
    enhanced: (u32, u32, Vec<u8>),
    edges: (u32, u32, Vec<u8>),
    contours: Vec<Contour>,
    regions_overlay: (u32, u32, Vec<u8>),
    regions: Vec<RegionResult>,
    detections_overlay: (u32, u32, Vec<u8>),
    dimensions: Dimensions,
}

fn raw_parts<P: image::Pixel<Subpixel = u8>>(
    img: &image::ImageBuffer<P, Vec<u8>>,
) -> (u32, u32, Vec<u8>) {
    (img.width(), img.height(), img.as_raw().clone())
}

impl Serialize for StagedResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = StagedResultProxy {
            resized: raw_parts(&self.resized),
            grayscale: raw_parts(&self.grayscale),
            enhanced: raw_parts(&self.enhanced),
            edges: raw_parts(&self.edges),
            contours: self.contours.clone(),
            regions_overlay: raw_parts(&self.regions_overlay),
            regions: self.regions.clone(),
            detections_overlay: raw_parts(&self.detections_overlay),
            dimensions: self.dimensions,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StagedResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = StagedResultProxy::deserialize(deserializer)?;

        let rgb = |(w, h, raw): (u32, u32, Vec<u8>), what: &str| {
            RgbImage::from_raw(w, h, raw)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid {what} image dimensions")))
        };
        let gray = |(w, h, raw): (u32, u32, Vec<u8>), what: &str| {
            GrayImage::from_raw(w, h, raw)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid {what} image dimensions")))
        };

        Ok(Self {
            resized: rgb(proxy.resized, "resized")?,
            grayscale: gray(proxy.grayscale, "grayscale")?,
            enhanced: gray(proxy.enhanced, "enhanced")?,
            edges: gray(proxy.edges, "edges")?,
            contours: proxy.contours,
            regions_overlay: rgb(proxy.regions_overlay, "regions overlay")?,
            regions: proxy.regions,
            detections_overlay: rgb(proxy.detections_overlay, "detections overlay")?,
            dimensions: proxy.dimensions,
        })
    }
}

/// Errors that can occur during pipeline processing.
///
/// Finding no regions and failing to recognize a shape are ordinary
/// outcomes, not errors.
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
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
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
        })
    }
}
