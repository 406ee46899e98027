//! Reference signatures of ideal sign outlines.
//!
//! Each shape is drawn on a 100×100 black canvas, traced with the same
//! contour code used for photographs, and reduced to its signature. Build
//! the library once and share it by reference; it is immutable after
//! construction.

use std::fmt;

use image::{GrayImage, Luma};
use imageproc::drawing::draw_hollow_circle_mut;
use serde::{Deserialize, Serialize};

use crate::annotate::draw_closed_polyline;
use crate::types::{Point, Signature};

const CANVAS: u32 = 100;
const INK: Luma<u8> = Luma([255]);

/// An ideal outline with a stored reference signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceShape {
    /// Centre (50, 50), radius 45.
    Circle,
    /// Square rotated 45°.
    Diamond,
    /// Regular-ish octagon inset 10 px from the canvas edge.
    Octagon,
    /// Triangle with one vertex pointing down.
    InvertedTriangle,
}

impl ReferenceShape {
    /// All shapes in library order.
    pub const ALL: [Self; 4] = [
        Self::Circle,
        Self::Diamond,
        Self::Octagon,
        Self::InvertedTriangle,
    ];

    /// Polygon corners on the 100×100 canvas, or `None` for the circle.
    #[must_use]
    pub fn corners(self) -> Option<&'static [(i32, i32)]> {
        match self {
            Self::Circle => None,
            Self::Diamond => Some(&[(50, 5), (95, 50), (50, 95), (5, 50)]),
            Self::Octagon => Some(&[
                (31, 10),
                (69, 10),
                (90, 31),
                (90, 69),
                (69, 90),
                (31, 90),
                (10, 69),
                (10, 31),
            ]),
            Self::InvertedTriangle => Some(&[(10, 10), (90, 10), (50, 90)]),
        }
    }

    /// Render the outline onto a fresh binary canvas.
    #[must_use]
    pub fn draw(self) -> GrayImage {
        let mut canvas = GrayImage::new(CANVAS, CANVAS);
        match self.corners() {
            None => draw_hollow_circle_mut(&mut canvas, (50, 50), 45, INK),
            Some(corners) => {
                let points: Vec<Point> = corners.iter().map(|&(x, y)| Point::new(x, y)).collect();
                draw_closed_polyline(&mut canvas, &points, INK, 2);
            }
        }
        canvas
    }
}

impl fmt::Display for ReferenceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Circle => f.write_str("circle"),
            Self::Diamond => f.write_str("diamond"),
            Self::Octagon => f.write_str("octagon"),
            Self::InvertedTriangle => f.write_str("inverted triangle"),
        }
    }
}

/// One shape and its signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Which outline this is.
    pub shape: ReferenceShape,
    /// Signature of the outline's first outer contour.
    pub signature: Signature,
}

/// The set of reference signatures consulted by the classifier.
///
/// Only the circle is used for matching today. The polygon entries are
/// computed and kept so the taxonomy is available to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceLibrary {
    /// Draw and trace every [`ReferenceShape`].
    ///
    /// A shape whose drawing yields no usable contour is left out, so
    /// [`get`](Self::get) returns `None` for it.
    #[must_use]
    pub fn build() -> Self {
        let entries = ReferenceShape::ALL
            .into_iter()
            .filter_map(|shape| {
                let contour = crate::contour::external_contours(&shape.draw())
                    .into_iter()
                    .next()?;
                let signature = crate::signature::compute_signature(&contour)?;
                tracing::trace!(%shape, samples = signature.len(), "built reference signature");
                Some(ReferenceEntry { shape, signature })
            })
            .collect();
        Self { entries }
    }

    /// A library holding exactly `entries`.
    #[must_use]
    pub const fn from_entries(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    /// Signature stored for `shape`, if any.
    #[must_use]
    pub fn get(&self, shape: ReferenceShape) -> Option<&Signature> {
        self.entries
            .iter()
            .find(|e| e.shape == shape)
            .map(|e| &e.signature)
    }

    /// Every entry in library order.
    #[must_use]
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }
}

impl Default for ReferenceLibrary {
    fn default() -> Self {
        Self::build()
    }
}
