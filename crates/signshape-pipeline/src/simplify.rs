//! Closed-polygon simplification using Ramer-Douglas-Peucker.
//!
//! A contour is a ring, so there is no natural pair of endpoints to
//! anchor the recursion. The ring is split at its first point and the
//! point farthest from it, each half is simplified as an open polyline,
//! and a final sweep removes any vertex lying within tolerance of the
//! chord between its neighbours (this catches a redundant split point).
//!
//! The vertex count of the result is what the shape classifier reads.

use crate::types::Point;

/// Approximate a closed contour by a polygon with fewer vertices.
///
/// Every removed point lies within `tolerance` pixels of the polygon
/// edge that replaces it. Rings of fewer than three points are returned
/// unchanged. A ring whose points all coincide collapses to one point.
#[must_use = "returns the approximated polygon"]
pub fn approximate_polygon(points: &[Point], tolerance: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let origin = points[0];
    let (far, far_dist) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.distance_squared(origin)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if far_dist == 0.0 {
        return vec![origin];
    }

    // Close the ring so the second half can end on the origin.
    let mut ring = Vec::with_capacity(n + 1);
    ring.extend_from_slice(points);
    ring.push(origin);

    let mut kept = vec![false; n + 1];
    kept[0] = true;
    kept[far] = true;
    rdp_recurse(&ring, 0, far, tolerance, &mut kept);
    rdp_recurse(&ring, far, n, tolerance, &mut kept);

    let mut polygon: Vec<Point> = points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    drop_collinear(&mut polygon, tolerance);
    polygon
}

/// Remove vertices within `tolerance` of the chord joining their
/// neighbours until none remain or the polygon is a triangle.
fn drop_collinear(polygon: &mut Vec<Point>, tolerance: f64) {
    let mut changed = true;
    while changed && polygon.len() > 3 {
        changed = false;
        let mut i = 0;
        while i < polygon.len() && polygon.len() > 3 {
            let n = polygon.len();
            let prev = polygon[(i + n - 1) % n];
            let next = polygon[(i + 1) % n];
            if perpendicular_distance(polygon[i], prev, next) <= tolerance {
                polygon.remove(i);
                changed = true;
            } else {
                i += 1;
            }
        }
    }
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line through them. If that distance exceeds `tolerance`, the point is
/// kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`, or
/// the distance to `a` when the two coincide.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = f64::from(b.x) - f64::from(a.x);
    let dy = f64::from(b.y) - f64::from(a.y);
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let ax = f64::from(a.x) - f64::from(p.x);
    let ay = f64::from(a.y) - f64::from(p.y);
    let cross = dx.mul_add(ay, -(dy * ax));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    /// Every integer point along the closed polygon through `corners`.
    fn walk(corners: &[Point]) -> Vec<Point> {
        let mut out: Vec<Point> = Vec::new();
        for (i, &a) in corners.iter().enumerate() {
            let b = corners[(i + 1) % corners.len()];
            let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).max(1);
            for s in 0..steps {
                let t = f64::from(s) / f64::from(steps);
                #[allow(clippy::cast_possible_truncation)]
                let q = p(
                    (f64::from(b.x - a.x) * t).round() as i32 + a.x,
                    (f64::from(b.y - a.y) * t).round() as i32 + a.y,
                );
                if out.last() != Some(&q) {
                    out.push(q);
                }
            }
        }
        out
    }

    #[test]
    fn short_rings_unchanged() {
        assert!(approximate_polygon(&[], 1.0).is_empty());
        assert_eq!(approximate_polygon(&[p(1, 1)], 1.0), vec![p(1, 1)]);
        assert_eq!(
            approximate_polygon(&[p(1, 1), p(5, 5)], 1.0),
            vec![p(1, 1), p(5, 5)]
        );
    }

    #[test]
    fn coincident_ring_collapses() {
        assert_eq!(approximate_polygon(&[p(2, 2); 5], 1.0), vec![p(2, 2)]);
    }

    #[test]
    fn dense_square_reduces_to_corners() {
        let ring = walk(&[p(0, 0), p(40, 0), p(40, 40), p(0, 40)]);
        let poly = approximate_polygon(&ring, 3.2);
        assert_eq!(poly.len(), 4);
        for corner in [p(0, 0), p(40, 0), p(40, 40), p(0, 40)] {
            assert!(poly.contains(&corner), "missing corner {corner:?}");
        }
    }

    #[test]
    fn start_in_middle_of_edge_is_dropped() {
        let mut ring = walk(&[p(0, 0), p(40, 0), p(40, 40), p(0, 40)]);
        ring.rotate_left(20);
        assert_eq!(ring[0], p(20, 0));
        let poly = approximate_polygon(&ring, 3.2);
        assert_eq!(poly.len(), 4);
        assert!(!poly.contains(&p(20, 0)));
    }

    #[test]
    fn triangle_keeps_three_vertices() {
        let ring = walk(&[p(10, 10), p(90, 10), p(50, 90)]);
        assert_eq!(approximate_polygon(&ring, 4.0).len(), 3);
    }

    #[test]
    fn octagon_keeps_eight_vertices() {
        let corners = [
            p(31, 10),
            p(69, 10),
            p(90, 31),
            p(90, 69),
            p(69, 90),
            p(31, 90),
            p(10, 69),
            p(10, 31),
        ];
        let ring = walk(&corners);
        assert_eq!(approximate_polygon(&ring, 5.0).len(), 8);
    }

    #[test]
    fn removed_points_stay_within_tolerance() {
        let ring = walk(&[p(0, 0), p(60, 5), p(70, 50), p(10, 45)]);
        let tolerance = 2.0;
        let poly = approximate_polygon(&ring, tolerance);
        for &q in &ring {
            let near = (0..poly.len()).any(|i| {
                let a = poly[i];
                let b = poly[(i + 1) % poly.len()];
                perpendicular_distance(q, a, b) <= tolerance + 1e-9
            });
            assert!(near, "{q:?} is farther than tolerance from every edge");
        }
    }

    #[test]
    fn perpendicular_distance_on_axis() {
        let d = perpendicular_distance(p(5, 3), p(0, 0), p(10, 0));
        assert!((d - 3.0).abs() < 1e-10);
    }

    #[test]
    fn perpendicular_distance_degenerate_segment() {
        let d = perpendicular_distance(p(3, 4), p(0, 0), p(0, 0));
        assert!((d - 5.0).abs() < 1e-10);
    }
}
