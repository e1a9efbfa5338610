use crate::config::{PenaltySettings, SignalWeights};
use crate::{PerSecondMetric, SimilarityScores};

/// Weighted per-second combination and scene-level reduction.
#[derive(Clone, Copy, Debug)]
pub struct Aggregator {
    weights: SignalWeights,
    penalties: PenaltySettings,
    empty_scene: f64,
}

impl Aggregator {
    pub fn new(weights: SignalWeights, penalties: PenaltySettings, empty_scene: f64) -> Self {
        Self {
            weights,
            penalties,
            empty_scene,
        }
    }

    /// Combine one second's signals.
    ///
    /// Low geometry and low visual are each penalized before weighting, the sum
    /// is capped, and the joint penalty applies after the cap. The label signal
    /// is never penalized.
    pub fn combine(&self, geometry: f64, visual: f64, label: f64) -> f64 {
        let p = &self.penalties;
        let low_geometry = geometry < p.geometry_threshold;
        let low_visual = visual < p.visual_threshold;

        let geometry = if low_geometry {
            geometry * p.geometry_factor
        } else {
            geometry
        };
        let visual = if low_visual {
            visual * p.visual_factor
        } else {
            visual
        };

        let mut combined = self.weights.geometry * geometry
            + self.weights.visual * visual
            + self.weights.label * label;
        combined = combined.min(p.combined_cap);
        if low_geometry && low_visual {
            combined *= p.joint_factor;
        }
        combined.max(0.0)
    }

    /// Scene-level means; the overall score also takes the scene factor.
    pub fn reduce(&self, metrics: &[PerSecondMetric]) -> SimilarityScores {
        if metrics.is_empty() {
            return SimilarityScores {
                overall_similarity: self.empty_scene,
                geometry_mean: self.empty_scene,
                visual_mean: self.empty_scene,
                label_mean: self.empty_scene,
            };
        }

        let mean = |field: fn(&PerSecondMetric) -> f64| {
            metrics.iter().map(field).sum::<f64>() / metrics.len() as f64
        };

        SimilarityScores {
            overall_similarity: mean(|m| m.combined_score) * self.penalties.scene_factor,
            geometry_mean: mean(|m| m.geometry_score),
            visual_mean: mean(|m| m.visual_score),
            label_mean: mean(|m| m.label_score),
        }
    }
}
