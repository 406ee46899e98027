//! Two-stage shape classifier.
//!
//! Stage one approximates the contour by a polygon and reads its vertex
//! count: three or seven to nine vertices is the regulatory bucket
//! (triangle and octagon are not told apart), four is a warning diamond.
//! Anything else falls through to stage two, which compares the contour's
//! signature against the reference circle. A close match is regulatory;
//! otherwise the region stays unclassified. Unrecognized outlines are an
//! ordinary outcome, never an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::reference::{ReferenceLibrary, ReferenceShape};
use crate::signature::compute_signature;
use crate::simplify::approximate_polygon;
use crate::types::{Contour, PipelineError, ShapeLabel, Signature};

/// Tuning for [`ShapeClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub epsilon_fraction: f64,
    /// Samples both signatures are resampled to before comparison.
    pub resample_len: usize,
    /// Mean squared error below which a curve counts as a circle.
    pub circle_threshold: f64,
}

impl ClassifierConfig {
    /// Default approximation tolerance (2% of perimeter).
    pub const DEFAULT_EPSILON_FRACTION: f64 = 0.02;
    /// Default comparison length.
    pub const DEFAULT_RESAMPLE_LEN: usize = 100;
    /// Default circle-match threshold.
    pub const DEFAULT_CIRCLE_THRESHOLD: f64 = 0.015;

    /// Check for values the classifier cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a negative or NaN
    /// tolerance or threshold, or a zero resample length.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.epsilon_fraction >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "classifier.epsilon_fraction must be non-negative".to_string(),
            ));
        }
        if self.resample_len == 0 {
            return Err(PipelineError::InvalidConfig(
                "classifier.resample_len must be positive".to_string(),
            ));
        }
        if !(self.circle_threshold >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "classifier.circle_threshold must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            epsilon_fraction: Self::DEFAULT_EPSILON_FRACTION,
            resample_len: Self::DEFAULT_RESAMPLE_LEN,
            circle_threshold: Self::DEFAULT_CIRCLE_THRESHOLD,
        }
    }
}

/// Which rule ended classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Labelled from the approximated vertex count.
    VertexCount,
    /// Labelled by matching the reference circle.
    CurveMatch,
    /// Curve test ran (or could not run) without a match.
    NoMatch,
    /// The contour encloses no area, so it has no signature.
    Degenerate,
}

/// Classifier verdict for one contour, with the values that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Assigned label, or `None` when unclassified.
    pub label: Option<ShapeLabel>,
    /// The contour's signature, `None` for degenerate contours.
    pub signature: Option<Signature>,
    /// Vertices of the approximated polygon.
    pub vertex_count: usize,
    /// Mean squared error against the reference circle, when the curve
    /// test ran.
    pub circle_difference: Option<f64>,
    /// Rule that ended classification.
    pub decision: Decision,
}

/// Label implied by a vertex count alone, if any.
#[must_use]
pub const fn label_for_vertex_count(vertices: usize) -> Option<ShapeLabel> {
    match vertices {
        3 | 7..=9 => Some(ShapeLabel::Regulatory),
        4 => Some(ShapeLabel::Warning),
        _ => None,
    }
}

/// Classifies contours against a borrowed [`ReferenceLibrary`].
#[derive(Debug, Clone)]
pub struct ShapeClassifier<'a> {
    library: &'a ReferenceLibrary,
    config: ClassifierConfig,
}

impl<'a> ShapeClassifier<'a> {
    /// Create a classifier.
    #[must_use]
    pub const fn new(library: &'a ReferenceLibrary, config: ClassifierConfig) -> Self {
        Self { library, config }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one contour.
    #[must_use]
    pub fn classify(&self, contour: &Contour) -> Classification {
        let signature = compute_signature(contour);

        let perimeter = contour.perimeter();
        let tolerance = self.config.epsilon_fraction * perimeter;
        let vertex_count = approximate_polygon(contour.points(), tolerance).len();
        debug!(vertex_count, perimeter, tolerance, "approximated contour");

        let Some(signature) = signature else {
            info!(vertex_count, "degenerate contour, no signature");
            return Classification {
                label: None,
                signature: None,
                vertex_count,
                circle_difference: None,
                decision: Decision::Degenerate,
            };
        };

        if let Some(label) = label_for_vertex_count(vertex_count) {
            info!(vertex_count, %label, "classified by vertex count");
            return Classification {
                label: Some(label),
                signature: Some(signature),
                vertex_count,
                circle_difference: None,
                decision: Decision::VertexCount,
            };
        }

        let Some(circle) = self.library.get(ReferenceShape::Circle) else {
            info!(vertex_count, "no circle reference, leaving unclassified");
            return Classification {
                label: None,
                signature: Some(signature),
                vertex_count,
                circle_difference: None,
                decision: Decision::NoMatch,
            };
        };

        let difference = signature.mean_squared_error(circle, self.config.resample_len);
        debug!(difference, threshold = self.config.circle_threshold, "compared with circle");

        let (label, decision) = if difference < self.config.circle_threshold {
            info!(vertex_count, difference, "classified as circle");
            (Some(ShapeLabel::Regulatory), Decision::CurveMatch)
        } else {
            info!(vertex_count, difference, "no matching shape");
            (None, Decision::NoMatch)
        };

        Classification {
            label,
            signature: Some(signature),
            vertex_count,
            circle_difference: Some(difference),
            decision,
        }
    }
}
