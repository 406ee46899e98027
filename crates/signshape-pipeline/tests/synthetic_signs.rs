//! End-to-end runs over rendered sign silhouettes.

#![allow(clippy::unwrap_used)]

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use signshape_pipeline::{
    AnalysisResult, PipelineConfig, PipelineError, ReferenceLibrary, ShapeLabel, process,
    process_image, process_staged,
};

const BACKGROUND: Rgb<u8> = Rgb([225, 225, 220]);
const SIGN: Rgb<u8> = Rgb([30, 30, 35]);

/// A light canvas with one dark filled polygon.
fn render(size: u32, corners: &[(i32, i32)]) -> RgbImage {
    let mut img = RgbImage::from_pixel(size, size, BACKGROUND);
    let poly: Vec<PixelPoint<i32>> = corners.iter().map(|&(x, y)| PixelPoint::new(x, y)).collect();
    draw_polygon_mut(&mut img, &poly, SIGN);
    img
}

fn encode_png(img: &RgbImage) -> Vec<u8> {
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

fn labels(result: &AnalysisResult) -> Vec<ShapeLabel> {
    result.detections().filter_map(|r| r.label()).collect()
}

#[test]
fn diamond_is_a_warning_sign() {
    let img = render(300, &[(150, 40), (260, 150), (150, 260), (40, 150)]);
    let result = process(
        &encode_png(&img),
        &PipelineConfig::default(),
        &ReferenceLibrary::build(),
    )
    .unwrap();
    assert!(
        labels(&result).contains(&ShapeLabel::Warning),
        "got {:?}",
        result.regions,
    );
}

#[test]
fn octagon_is_a_regulatory_sign() {
    let img = render(
        300,
        &[
            (115, 50),
            (185, 50),
            (250, 115),
            (250, 185),
            (185, 250),
            (115, 250),
            (50, 185),
            (50, 115),
        ],
    );
    let result = process_image(img, &PipelineConfig::default(), &ReferenceLibrary::build()).unwrap();
    assert!(
        labels(&result).contains(&ShapeLabel::Regulatory),
        "got {:?}",
        result.regions,
    );
}

#[test]
fn triangle_is_a_regulatory_sign() {
    let img = render(300, &[(50, 60), (250, 60), (150, 250)]);
    let result = process_image(img, &PipelineConfig::default(), &ReferenceLibrary::build()).unwrap();
    assert!(
        labels(&result).contains(&ShapeLabel::Regulatory),
        "got {:?}",
        result.regions,
    );
}

#[test]
fn large_photo_is_processed_at_working_resolution() {
    let img = render(800, &[(400, 100), (700, 400), (400, 700), (100, 400)]);
    let staged = process_staged(
        &encode_png(&img),
        &PipelineConfig::default(),
        &ReferenceLibrary::build(),
    )
    .unwrap();
    assert_eq!(staged.resized.dimensions(), (350, 350));
    assert_eq!(staged.detections_overlay.dimensions(), (350, 350));
    for contour in &staged.contours {
        for p in contour.points() {
            assert!((0..350).contains(&p.x) && (0..350).contains(&p.y));
        }
    }
}

#[test]
fn small_blobs_are_not_regions() {
    // 15x15 is well under the default 500 px² area filter.
    let img = render(200, &[(90, 90), (105, 90), (105, 105), (90, 105)]);
    let result = process_image(img, &PipelineConfig::default(), &ReferenceLibrary::build()).unwrap();
    assert!(result.regions.is_empty(), "got {:?}", result.regions);
}

#[test]
fn blank_photo_has_no_regions() {
    let img = RgbImage::from_pixel(240, 180, BACKGROUND);
    let result = process(
        &encode_png(&img),
        &PipelineConfig::default(),
        &ReferenceLibrary::build(),
    )
    .unwrap();
    assert!(result.regions.is_empty());
    assert_eq!(result.detections().count(), 0);
}

#[test]
fn missing_circle_reference_still_labels_polygons() {
    let img = render(300, &[(150, 40), (260, 150), (150, 260), (40, 150)]);
    let empty = ReferenceLibrary::from_entries(Vec::new());
    let result = process_image(img, &PipelineConfig::default(), &empty).unwrap();
    assert!(labels(&result).contains(&ShapeLabel::Warning));
}

#[test]
fn analysis_result_serde_round_trip() {
    let img = render(300, &[(150, 40), (260, 150), (150, 260), (40, 150)]);
    let result = process_image(img, &PipelineConfig::default(), &ReferenceLibrary::build()).unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let back: AnalysisResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.dimensions, result.dimensions);
    assert_eq!(back.regions.len(), result.regions.len());
    for (a, b) in back.regions.iter().zip(&result.regions) {
        assert_eq!(a.contour, b.contour);
        assert_eq!(a.label(), b.label());
        assert_eq!(a.classification.decision, b.classification.decision);
        let (sa, sb) = (a.signature().unwrap(), b.signature().unwrap());
        assert!(sa.mean_squared_error(sb, sb.len()) < 1e-18);
    }
}

#[test]
fn staged_result_serde_round_trip() {
    let img = render(120, &[(20, 20), (100, 20), (100, 100), (20, 100)]);
    let staged = process_staged(
        &encode_png(&img),
        &PipelineConfig::default(),
        &ReferenceLibrary::build(),
    )
    .unwrap();
    let json = serde_json::to_string(&staged).unwrap();
    let back: signshape_pipeline::StagedResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.edges.as_raw(), staged.edges.as_raw());
    assert_eq!(back.detections_overlay.as_raw(), staged.detections_overlay.as_raw());
    assert_eq!(back.contours, staged.contours);
    assert_eq!(back.regions.len(), staged.regions.len());
}

#[test]
fn config_from_json_overrides_defaults() {
    let config: PipelineConfig =
        serde_json::from_str(r#"{"min_region_area": 50000.0, "classifier": {"circle_threshold": 0.05}}"#)
            .unwrap();
    assert!((config.classifier.circle_threshold - 0.05).abs() < f64::EPSILON);
    assert_eq!(config.max_dimension, PipelineConfig::DEFAULT_MAX_DIMENSION);

    // The diamond encloses ~24000 px², below the raised filter.
    let img = render(300, &[(150, 40), (260, 150), (150, 260), (40, 150)]);
    let result = process_image(img, &config, &ReferenceLibrary::build()).unwrap();
    assert!(result.regions.is_empty());
}

#[test]
fn truncated_file_is_a_decode_error() {
    let png = encode_png(&RgbImage::from_pixel(40, 40, BACKGROUND));
    let result = process(
        &png[..png.len() / 2],
        &PipelineConfig::default(),
        &ReferenceLibrary::build(),
    );
    assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
}
