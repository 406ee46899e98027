//! Image resizing to the working resolution.
//!
//! Shrinks the input so the longest axis matches the configured
//! `max_dimension`. This runs right after decode, so every downstream
//! stage (CLAHE, Canny, contour tracing) works on a bounded pixel grid and
//! the area threshold keeps a consistent meaning across photo sizes.
//!
//! Images already at or below the limit are returned unchanged.

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Resampling filter used when resizing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `Disabled` variant to skip resizing entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Skip resizing regardless of image size.
    Disabled,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`, or `None` when
    /// resizing is disabled.
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Target size for scaling `(width, height)` so the longest side becomes
/// `max_dimension`. Each side is rounded and kept at least 1 px.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let scale = f64::from(max_dimension) / f64::from(width.max(height));
    let side = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, max_dimension);
    (side(width), side(height))
}

/// Resize `image` so its longest axis is at most `max_dimension` pixels,
/// using the specified resampling filter.
///
/// Returns the (possibly unchanged) image and whether resizing was
/// actually applied. Applying the function to its own output is a no-op.
#[must_use]
pub fn resize_if_large(
    image: &RgbImage,
    max_dimension: u32,
    filter: ResizeFilter,
) -> (RgbImage, bool) {
    let Some(image_filter) = filter.to_image_filter() else {
        return (image.clone(), false);
    };

    let (w, h) = image.dimensions();
    if max_dimension == 0 || w.max(h) <= max_dimension {
        return (image.clone(), false);
    }

    let (nw, nh) = scaled_size(w, h, max_dimension);
    let resized = image::imageops::resize(image, nw, nh, image_filter);
    (resized, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb([128, 128, 128]))
    }

    #[test]
    fn default_filter_is_triangle() {
        assert_eq!(ResizeFilter::default(), ResizeFilter::Triangle);
    }

    #[test]
    fn small_image_is_unchanged() {
        let img = test_image(200, 150);
        let (result, applied) = resize_if_large(&img, 350, ResizeFilter::Triangle);
        assert!(!applied);
        assert_eq!(result.dimensions(), (200, 150));
        assert_eq!(result.as_raw(), img.as_raw());
    }

    #[test]
    fn exact_match_is_unchanged() {
        let img = test_image(350, 100);
        let (result, applied) = resize_if_large(&img, 350, ResizeFilter::Triangle);
        assert!(!applied);
        assert_eq!(result.dimensions(), (350, 100));
    }

    #[test]
    fn landscape_scales_to_long_side() {
        let img = test_image(700, 500);
        let (result, applied) = resize_if_large(&img, 350, ResizeFilter::Triangle);
        assert!(applied);
        assert_eq!(result.dimensions(), (350, 250));
    }

    #[test]
    fn portrait_scales_to_long_side() {
        let img = test_image(1000, 2000);
        let (result, applied) = resize_if_large(&img, 350, ResizeFilter::Triangle);
        assert!(applied);
        assert_eq!(result.dimensions(), (175, 350));
    }

    #[test]
    fn aspect_ratio_within_rounding() {
        let img = test_image(1234, 567);
        let (result, _) = resize_if_large(&img, 350, ResizeFilter::Triangle);
        let (w, h) = result.dimensions();
        assert_eq!(w, 350);
        let expected = 567.0 * 350.0 / 1234.0;
        assert!((f64::from(h) - expected).abs() <= 0.5);
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        let img = test_image(5000, 2);
        let (result, applied) = resize_if_large(&img, 350, ResizeFilter::Nearest);
        assert!(applied);
        assert_eq!(result.dimensions(), (350, 1));
    }

    #[test]
    fn resize_is_idempotent() {
        let img = test_image(900, 600);
        let (once, _) = resize_if_large(&img, 350, ResizeFilter::Lanczos3);
        let (twice, applied) = resize_if_large(&once, 350, ResizeFilter::Lanczos3);
        assert!(!applied);
        assert_eq!(once.as_raw(), twice.as_raw());
    }

    #[test]
    fn disabled_filter_skips_resize() {
        let img = test_image(1000, 800);
        let (result, applied) = resize_if_large(&img, 350, ResizeFilter::Disabled);
        assert!(!applied);
        assert_eq!(result.dimensions(), (1000, 800));
    }

    #[test]
    fn every_filter_produces_target_size() {
        let img = test_image(800, 400);
        for filter in [
            ResizeFilter::Nearest,
            ResizeFilter::Triangle,
            ResizeFilter::CatmullRom,
            ResizeFilter::Gaussian,
            ResizeFilter::Lanczos3,
        ] {
            let (result, applied) = resize_if_large(&img, 350, filter);
            assert!(applied, "{filter} should resize");
            assert_eq!(result.dimensions(), (350, 175), "{filter}");
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(ResizeFilter::CatmullRom.to_string(), "CatmullRom");
        assert_eq!(ResizeFilter::Disabled.to_string(), "Disabled");
    }
}
