//! Radial-distance signatures.
//!
//! A signature records, for each contour point in traversal order, its
//! distance from the region centroid divided by the largest such
//! distance. A circle gives a flat profile near 1.0; polygons dip between
//! their corners.

use crate::types::{Contour, Signature};

/// Compute the normalized radial-distance signature of `contour`.
///
/// The centroid is the area-weighted polygon centroid, truncated to whole
/// pixels. Returns `None` when the contour encloses no area. When every
/// point sits on the centroid, the all-zero sequence is returned as is.
#[must_use]
pub fn compute_signature(contour: &Contour) -> Option<Signature> {
    let (cx, cy) = contour.centroid()?;
    let (cx, cy) = (cx.trunc(), cy.trunc());

    let distances: Vec<f64> = contour
        .points()
        .iter()
        .map(|p| p.distance_to(cx, cy))
        .collect();

    let max = distances.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        Some(Signature::new(distances.into_iter().map(|d| d / max).collect()))
    } else {
        Some(Signature::new(distances))
    }
}
