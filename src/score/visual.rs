use crate::config::VisualHeuristic;
use crate::frame::FrameHandle;
use crate::visual::HistogramComparer;

use super::{guarded, ScorerFailure, Signal};

/// Whole-frame appearance agreement.
#[derive(Clone, Copy, Debug)]
pub struct VisualScorer {
    heuristic: VisualHeuristic,
}

impl VisualScorer {
    pub fn new(heuristic: VisualHeuristic) -> Self {
        Self { heuristic }
    }

    /// Histogram similarity from the comparer, clamped to [0,1].
    pub fn score(
        &self,
        comparer: Option<&dyn HistogramComparer>,
        reference: &FrameHandle,
        submission: &FrameHandle,
    ) -> Result<f64, ScorerFailure> {
        let comparer = comparer.ok_or(ScorerFailure::Unavailable)?;
        let similarity = guarded(|| comparer.similarity(reference, submission))
            .map_err(|err| ScorerFailure::Histogram(format!("{}: {:#}", comparer.name(), err)))?;
        if !similarity.is_finite() {
            return Err(ScorerFailure::NonFinite(Signal::Visual));
        }
        Ok(similarity.clamp(0.0, 1.0))
    }

    /// Estimate used when histogram comparison is unavailable.
    ///
    /// Identical frames score `identical`; frames with known timestamps decay
    /// linearly with their offset down to `timestamp_floor`; anything else
    /// gets `unknown`.
    pub fn heuristic(&self, reference: &FrameHandle, submission: &FrameHandle) -> f64 {
        if reference.id == submission.id {
            return self.heuristic.identical;
        }
        match (reference.timestamp_ms, submission.timestamp_ms) {
            (Some(a), Some(b)) => {
                let offset = a.abs_diff(b) as f64;
                let span = self.heuristic.timestamp_span_ms as f64;
                (1.0 - offset / span)
                    .max(self.heuristic.timestamp_floor)
                    .min(1.0)
            }
            _ => self.heuristic.unknown,
        }
    }
}
