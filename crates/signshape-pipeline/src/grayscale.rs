//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! 3-channel colour image the pipeline starts from, then reduces it to a
//! single intensity channel.

use image::{GrayImage, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes into an 8-bit RGB image.
///
/// Supports whatever formats the `image` crate was built with. Alpha is
/// discarded and grayscale sources are expanded to three channels.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert an RGB image to single-channel intensity.
///
/// Uses the BT.601 luminance weights `0.299*R + 0.587*G + 0.114*B`,
/// rounded to the nearest integer. `image`'s own `to_luma8` uses Rec. 709
/// weights, which shift the intensities the Canny thresholds were tuned on.
#[must_use = "returns the grayscale image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = 0.114_f64.mul_add(
            f64::from(b),
            0.299_f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
        );
        image::Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}
