//! signshape-pipeline: traffic-sign shape detection (sans-IO).
//!
//! Finds candidate sign regions in a photograph and labels each outline
//! through:
//! decode -> resize -> grayscale -> CLAHE -> blur + Canny ->
//! external contours -> area filter -> polygon approximation and
//! centroid-distance signature -> regulatory / warning decision.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and pixel buffers and returns structured data. Reading
//! files, printing, and timing live in `signshape-bench`.

pub mod annotate;
pub mod canny;
pub mod clahe;
pub mod classify;
pub mod contour;
pub mod diagnostics;
pub mod downsample;
pub mod edge;
pub mod grayscale;
pub mod pipeline;
pub mod reference;
pub mod signature;
pub mod simplify;
pub mod types;

pub use classify::{Classification, ClassifierConfig, Decision, ShapeClassifier};
pub use downsample::ResizeFilter;
pub use pipeline::{Pipeline, PipelineStage, STAGE_COUNT};
pub use reference::{ReferenceEntry, ReferenceLibrary, ReferenceShape};
pub use types::{
    AnalysisResult, Contour, Dimensions, GrayImage, PipelineConfig, PipelineError, Point,
    RegionResult, RgbImage, ShapeLabel, Signature, StagedResult,
};

/// Run the detection pipeline on encoded image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP), a configuration, and the
/// reference library, and produces one [`RegionResult`] per region of
/// interest. Finding no regions is not an error.
///
/// # Pipeline steps
///
/// 1. Decode to RGB
/// 2. Downscale so the longest side is at most `max_dimension`
/// 3. Grayscale (BT.601)
/// 4. CLAHE contrast enhancement
/// 5. Gaussian blur and Canny edge detection
/// 6. Outer contours filtered by enclosed area
/// 7. Per-region classification
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
    library: &ReferenceLibrary,
) -> Result<AnalysisResult, PipelineError> {
    process_staged(image_bytes, config, library).map(StagedResult::into_analysis)
}

/// Run the detection pipeline on an already decoded image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
pub fn process_image(
    image: RgbImage,
    config: &PipelineConfig,
    library: &ReferenceLibrary,
) -> Result<AnalysisResult, PipelineError> {
    config.validate()?;
    let staged = Pipeline::from_image(image, config.clone())
        .resize()
        .to_grayscale()
        .enhance()
        .detect_edges()
        .select_regions()
        .classify(library)
        .into_result();
    Ok(staged.into_analysis())
}

/// Run the detection pipeline, keeping every intermediate raster.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
    library: &ReferenceLibrary,
) -> Result<StagedResult, PipelineError> {
    config.validate()?;
    let staged = Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .resize()
        .to_grayscale()
        .enhance()
        .detect_edges()
        .select_regions()
        .classify(library)
        .into_result();
    tracing::info!(
        regions = staged.regions.len(),
        detections = staged.regions.iter().filter(|r| r.label().is_some()).count(),
        "analysis complete"
    );
    Ok(staged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Light background with a dark filled square in the middle.
    fn square_png(size: u32) -> Vec<u8> {
        let margin = size / 4;
        let img = image::RgbImage::from_fn(size, size, |x, y| {
            let inside = (margin..size - margin).contains(&x) && (margin..size - margin).contains(&y);
            if inside {
                image::Rgb([25, 25, 25])
            } else {
                image::Rgb([230, 230, 230])
            }
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default(), &ReferenceLibrary::build());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(
            &[0xFF, 0x00],
            &PipelineConfig::default(),
            &ReferenceLibrary::build(),
        );
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_rejects_invalid_config() {
        let config = PipelineConfig {
            clahe_tile_grid: 0,
            ..PipelineConfig::default()
        };
        let result = process(&square_png(100), &config, &ReferenceLibrary::build());
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_square_finds_warning_region() {
        let result = process(
            &square_png(200),
            &PipelineConfig::default(),
            &ReferenceLibrary::build(),
        )
        .unwrap();
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 200,
                height: 200
            }
        );
        assert!(
            result
                .detections()
                .any(|r| r.label() == Some(ShapeLabel::Warning)),
            "expected a warning region, got {:?}",
            result.regions,
        );
    }

    #[test]
    fn process_uniform_image_returns_no_regions() {
        let img = image::RgbImage::from_pixel(50, 50, image::Rgb([128, 128, 128]));
        let result =
            process_image(img, &PipelineConfig::default(), &ReferenceLibrary::build()).unwrap();
        assert!(result.regions.is_empty());
    }

    #[test]
    fn process_and_process_staged_agree() {
        let png = square_png(160);
        let library = ReferenceLibrary::build();
        let config = PipelineConfig::default();
        let analysis = process(&png, &config, &library).unwrap();
        let staged = process_staged(&png, &config, &library).unwrap();
        assert_eq!(analysis.regions, staged.regions);
        assert_eq!(staged.contours.len(), staged.regions.len());
    }
}
