//! Drawing contours onto rasters.
//!
//! Used for the two overlay panels of a staged run (region outlines on the
//! edge map, accepted detections on the working image) and to render the
//! synthetic reference shapes.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{Canvas, draw_line_segment_mut};

use crate::types::{Contour, Point, RegionResult};

/// Outline colour for overlays.
pub const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);

/// Outline thickness for overlays, in pixels.
pub const OUTLINE_THICKNESS: u32 = 2;

/// Draw the closed polyline through `points` onto `canvas`.
///
/// Thickness is produced by repeating the stroke shifted right and down by
/// `0..thickness` pixels on each axis. A single point draws a dot.
#[allow(clippy::cast_precision_loss)]
pub fn draw_closed_polyline<C: Canvas>(
    canvas: &mut C,
    points: &[Point],
    color: C::Pixel,
    thickness: u32,
) {
    let n = points.len();
    for oy in 0..thickness.max(1) {
        for ox in 0..thickness.max(1) {
            let shift = |p: Point| (p.x as f32 + ox as f32, p.y as f32 + oy as f32);
            for i in 0..n {
                let a = points[i];
                let b = points[(i + 1) % n];
                draw_line_segment_mut(canvas, shift(a), shift(b), color);
            }
        }
    }
}

/// The edge map as a colour image with every contour outlined.
#[must_use = "returns the annotated image"]
pub fn regions_overlay(edges: &GrayImage, contours: &[Contour]) -> RgbImage {
    let mut canvas = RgbImage::from_fn(edges.width(), edges.height(), |x, y| {
        let v = edges.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });
    for contour in contours {
        draw_closed_polyline(&mut canvas, contour.points(), OUTLINE, OUTLINE_THICKNESS);
    }
    canvas
}

/// A copy of the working image with every labelled region outlined.
#[must_use = "returns the annotated image"]
pub fn detections_overlay(image: &RgbImage, regions: &[RegionResult]) -> RgbImage {
    let mut canvas = image.clone();
    for region in regions.iter().filter(|r| r.label().is_some()) {
        draw_closed_polyline(
            &mut canvas,
            region.contour.points(),
            OUTLINE,
            OUTLINE_THICKNESS,
        );
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classification, Decision};
    use crate::types::ShapeLabel;

    fn square() -> Contour {
        Contour::new(vec![
            Point::new(2, 2),
            Point::new(12, 2),
            Point::new(12, 12),
            Point::new(2, 12),
        ])
    }

    fn region(label: Option<ShapeLabel>) -> RegionResult {
        RegionResult {
            region_index: 0,
            contour: square(),
            classification: Classification {
                label,
                signature: None,
                vertex_count: 4,
                circle_difference: None,
                decision: if label.is_some() {
                    Decision::VertexCount
                } else {
                    Decision::NoMatch
                },
            },
        }
    }

    #[test]
    fn closed_polyline_draws_closing_edge() {
        let mut img = GrayImage::new(20, 20);
        draw_closed_polyline(&mut img, square().points(), image::Luma([255]), 1);
        // Closing edge runs from (2, 12) back to (2, 2).
        assert_eq!(img.get_pixel(2, 7).0[0], 255);
        assert_eq!(img.get_pixel(7, 2).0[0], 255);
        assert_eq!(img.get_pixel(7, 7).0[0], 0);
    }

    #[test]
    fn thickness_two_widens_stroke() {
        let mut img = GrayImage::new(20, 20);
        draw_closed_polyline(&mut img, square().points(), image::Luma([255]), 2);
        assert_eq!(img.get_pixel(7, 2).0[0], 255);
        assert_eq!(img.get_pixel(7, 3).0[0], 255);
        assert_eq!(img.get_pixel(3, 7).0[0], 255);
    }

    #[test]
    fn regions_overlay_keeps_edges_and_adds_outline() {
        let mut edges = GrayImage::new(20, 20);
        edges.put_pixel(18, 18, image::Luma([255]));
        let overlay = regions_overlay(&edges, &[square()]);
        assert_eq!(overlay.dimensions(), (20, 20));
        assert_eq!(overlay.get_pixel(18, 18).0, [255, 255, 255]);
        assert_eq!(*overlay.get_pixel(7, 2), OUTLINE);
        assert_eq!(overlay.get_pixel(7, 7).0, [0, 0, 0]);
    }

    #[test]
    fn detections_overlay_skips_unlabelled_regions() {
        let image = RgbImage::from_pixel(20, 20, Rgb([10, 10, 10]));

        let unlabelled = detections_overlay(&image, &[region(None)]);
        assert_eq!(unlabelled.as_raw(), image.as_raw());

        let labelled = detections_overlay(&image, &[region(Some(ShapeLabel::Warning))]);
        assert_eq!(*labelled.get_pixel(7, 2), OUTLINE);
        assert_eq!(labelled.get_pixel(7, 7).0, [10, 10, 10]);
    }
}
