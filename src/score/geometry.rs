use crate::config::GeometryTerms;
use crate::detect::{centroid_distance, iou, scale_ratio, OverlayShape};

use super::{ScorerFailure, Side, Signal};

/// Spatial agreement between the reference's dominant shape and its match.
#[derive(Clone, Copy, Debug)]
pub struct GeometryScorer {
    terms: GeometryTerms,
}

impl GeometryScorer {
    pub fn new(terms: GeometryTerms) -> Self {
        Self { terms }
    }

    /// `iou·w₁ + (1 − centroid distance)·w₂ + scale ratio·w₃` for the dominant pair.
    ///
    /// Both slices must be non-empty; see [`super::paired`].
    pub fn score(
        &self,
        reference: &[OverlayShape],
        submission: &[OverlayShape],
    ) -> Result<f64, ScorerFailure> {
        let dominant = reference
            .first()
            .ok_or(ScorerFailure::NoShapes(Side::Reference))?;
        let candidate = dominant_match(dominant, submission)
            .ok_or(ScorerFailure::NoShapes(Side::Submission))?;

        let overlap = iou(&dominant.bounding_box(), &candidate.bounding_box());
        let proximity = 1.0 - centroid_distance(dominant, candidate);
        let scale = scale_ratio(dominant, candidate);
        let score =
            self.terms.iou * overlap + self.terms.centroid * proximity + self.terms.scale * scale;

        log::debug!(
            "geometry: iou={:.3} centroid={:.3} scale={:.3} -> {:.3}",
            overlap,
            proximity,
            scale,
            score
        );

        if !score.is_finite() {
            return Err(ScorerFailure::NonFinite(Signal::Geometry));
        }
        Ok(score.clamp(0.0, 1.0))
    }
}

/// The submission shape to compare against the reference's dominant shape.
///
/// An exact localized-label match wins; otherwise the submission's own
/// dominant shape (index 0) is used.
pub fn dominant_match<'a>(
    reference: &OverlayShape,
    submission: &'a [OverlayShape],
) -> Option<&'a OverlayShape> {
    reference
        .label_localized()
        .filter(|label| !label.is_empty())
        .and_then(|label| {
            submission
                .iter()
                .find(|shape| shape.label_localized() == Some(label))
        })
        .or_else(|| submission.first())
}
