//! Region selection: outermost contours of a binary edge map.
//!
//! Border following comes from `imageproc::contours::find_contours`
//! (Suzuki-Abe). Only outer borders without a parent are kept, so holes
//! and anything nested inside another boundary are dropped. Each kept
//! border is chain-compressed: pixels in the middle of a straight
//! horizontal, vertical or diagonal run are removed, leaving the run
//! endpoints.

use image::GrayImage;
use imageproc::contours::BorderType;
use tracing::debug;

use crate::types::{Contour, Point};

/// Drop points whose incoming and outgoing steps are identical.
///
/// The ring is treated as closed, so the first and last points are
/// compared across the seam. Rings of fewer than three points are
/// returned as is.
#[must_use]
pub fn compress_chain(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: Point, b: Point| (b.x - a.x, b.y - a.y);
    let kept: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            step(prev, cur) != step(cur, next)
        })
        .map(|i| points[i])
        .collect();

    // A ring made only of identical steps cannot close; keep it whole
    // rather than returning nothing.
    if kept.is_empty() {
        points.to_vec()
    } else {
        kept
    }
}

/// Outermost boundaries of the white regions in `edges`, in discovery
/// order, chain-compressed.
///
/// Any nonzero pixel counts as foreground.
#[must_use]
pub fn external_contours(edges: &GrayImage) -> Vec<Contour> {
    imageproc::contours::find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points: Vec<Point> = c.points.iter().map(|p| Point::new(p.x, p.y)).collect();
            Contour::new(compress_chain(&points))
        })
        .collect()
}

/// External contours enclosing at least `min_area` square pixels.
///
/// Discovery order is preserved. An empty result is a normal outcome.
#[must_use]
pub fn find_regions(edges: &GrayImage, min_area: f64) -> Vec<Contour> {
    let all = external_contours(edges);
    let total = all.len();
    let kept: Vec<Contour> = all.into_iter().filter(|c| c.area() >= min_area).collect();
    debug!(total, kept = kept.len(), min_area, "selected regions of interest");
    kept
}
