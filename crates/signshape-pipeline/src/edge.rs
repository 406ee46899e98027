//! Edge extraction: Gaussian smoothing followed by Canny.
//!
//! Produces a binary map (255 = edge, 0 = background) the same size as
//! the input. Smoothing happens here rather than inside the detector so
//! the kernel is part of the pipeline configuration.

use image::GrayImage;

/// Minimum allowed Canny threshold.
///
/// A threshold of zero marks every pixel with any gradient as a candidate
/// edge, which floods contour tracing with noise.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma returns the image unchanged, since `imageproc`
/// panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if !(sigma > 0.0) {
        return image.clone();
    }
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Clamp a pair of thresholds so both are at least [`MIN_THRESHOLD`] and
/// `low <= high`.
#[must_use]
pub fn clamp_thresholds(low: f32, high: f32) -> (f32, f32) {
    let high = high.max(MIN_THRESHOLD);
    let low = low.max(MIN_THRESHOLD).min(high);
    (low, high)
}

/// Smooth `gray` and detect edges.
///
/// Pixels with gradient magnitude at or above `high` are edges; those
/// between `low` and `high` are edges only when connected to a definite
/// edge. Thresholds are clamped with [`clamp_thresholds`] first.
#[must_use = "returns the binary edge map"]
pub fn extract_edges(gray: &GrayImage, low: f32, high: f32, blur_sigma: f32) -> GrayImage {
    let (low, high) = clamp_thresholds(low, high);
    let smooth = gaussian_blur(gray, blur_sigma);
    crate::canny::canny(&smooth, low, high)
}
