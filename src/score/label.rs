use crate::config::LabelScores;
use crate::detect::{Labeler, OverlayShape};
use crate::frame::{FrameCrop, FrameHandle};

use super::{guarded, ScorerFailure, Side};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelMatch {
    Exact,
    Near,
    Mismatch,
}

/// Classify two localized labels.
///
/// Near match: the number of `a`'s characters that also occur in `b` reaches
/// half the shorter label's length. Counts are in chars, so CJK labels compare
/// per glyph.
pub fn label_similarity(a: &str, b: &str) -> LabelMatch {
    if a == b {
        return LabelMatch::Exact;
    }
    let shorter = a.chars().count().min(b.chars().count()) as f64;
    let shared = a.chars().filter(|c| b.contains(*c)).count() as f64;
    if shared >= shorter / 2.0 {
        LabelMatch::Near
    } else {
        LabelMatch::Mismatch
    }
}

/// Agreement between the localized labels of both dominant shapes.
#[derive(Clone, Copy, Debug)]
pub struct LabelScorer {
    scores: LabelScores,
}

impl LabelScorer {
    pub fn new(scores: LabelScores) -> Self {
        Self { scores }
    }

    pub fn score(
        &self,
        labeler: &dyn Labeler,
        reference_frame: &FrameHandle,
        reference: &[OverlayShape],
        submission_frame: &FrameHandle,
        submission: &[OverlayShape],
    ) -> Result<f64, ScorerFailure> {
        let reference_label = label_dominant(labeler, reference_frame, reference, Side::Reference)?;
        let submission_label =
            label_dominant(labeler, submission_frame, submission, Side::Submission)?;

        let verdict = label_similarity(&reference_label, &submission_label);
        log::debug!(
            "label: '{}' vs '{}' -> {:?}",
            reference_label,
            submission_label,
            verdict
        );

        Ok(match verdict {
            LabelMatch::Exact => self.scores.exact,
            LabelMatch::Near => self.scores.near,
            LabelMatch::Mismatch => self.scores.mismatch,
        })
    }
}

fn label_dominant(
    labeler: &dyn Labeler,
    frame: &FrameHandle,
    shapes: &[OverlayShape],
    side: Side,
) -> Result<String, ScorerFailure> {
    let dominant = shapes.first().ok_or(ScorerFailure::NoShapes(side))?;
    let crop = FrameCrop::new(frame, dominant);
    let label = guarded(|| labeler.label_crop(&crop))
        .map_err(|err| ScorerFailure::Labeling {
            side,
            message: format!("{:#}", err),
        })?;
    let label = label.trim();
    if label.is_empty() {
        return Err(ScorerFailure::EmptyLabel(side));
    }
    Ok(label.to_string())
}
