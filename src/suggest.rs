//! Improvement suggestions and next actions.
//!
//! A [`SuggestionGenerator`] (typically a language model behind a service) writes
//! free-form advice. When it has nothing to say or fails, threshold-based canned
//! text from the configured [`MessageCatalog`] takes its place. The constants
//! below are the catalog's English defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{MessageCatalog, SuggestionThresholds};
use crate::{PerSecondMetric, SimilarityScores};

pub const FRAMING_SUGGESTION: &str =
    "Adjust the framing angle so the main subject sits where it does in the template";
pub const LIGHTING_SUGGESTION: &str =
    "Improve the lighting to match the template's brightness and color";
pub const VISIBILITY_SUGGESTION: &str = "Make sure the key object is clearly visible in the shot";
pub const MEETS_REQUIREMENTS: &str = "The scene meets the template requirements";

pub const READY_ACTION: &str = "Ready to submit for review";
pub const MINOR_ADJUSTMENT_ACTION: &str = "Make a minor adjustment and re-record";
pub const RERECORD_ACTION: &str = "Re-record the scene";
pub const REVIEW_TEMPLATE_ACTION: &str = "Review the template example";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
}

pub trait SuggestionGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the generator had nothing to offer.
    fn generate(
        &self,
        scene_title: &str,
        scores: &SimilarityScores,
        metrics: &[PerSecondMetric],
    ) -> Result<Option<Suggestions>>;
}

/// Advice for each scene mean under its threshold.
pub fn canned_suggestions(
    scores: &SimilarityScores,
    thresholds: &SuggestionThresholds,
    messages: &MessageCatalog,
) -> Vec<String> {
    let mut out = Vec::new();
    if scores.geometry_mean < thresholds.geometry {
        out.push(messages.framing.clone());
    }
    if scores.visual_mean < thresholds.visual {
        out.push(messages.lighting.clone());
    }
    if scores.label_mean < thresholds.label {
        out.push(messages.visibility.clone());
    }
    if out.is_empty() {
        out.push(messages.meets_requirements.clone());
    }
    out
}

pub fn canned_next_actions(
    scores: &SimilarityScores,
    thresholds: &SuggestionThresholds,
    messages: &MessageCatalog,
) -> Vec<String> {
    if scores.overall_similarity > thresholds.ready {
        vec![messages.ready.clone()]
    } else if scores.overall_similarity > thresholds.minor {
        vec![messages.minor_adjustment.clone()]
    } else {
        vec![messages.rerecord.clone(), messages.review_template.clone()]
    }
}

/// Ask the generator, filling whatever it leaves empty with canned text.
pub fn resolve(
    generator: Option<&dyn SuggestionGenerator>,
    scene_title: &str,
    scores: &SimilarityScores,
    metrics: &[PerSecondMetric],
    thresholds: &SuggestionThresholds,
    messages: &MessageCatalog,
) -> Suggestions {
    let generated = match generator {
        Some(generator) => match generator.generate(scene_title, scores, metrics) {
            Ok(generated) => generated,
            Err(err) => {
                log::warn!(
                    "suggestion generator {} failed, using built-in text: {:#}",
                    generator.name(),
                    err
                );
                None
            }
        },
        None => None,
    };

    match generated {
        Some(mut generated) if !generated.suggestions.is_empty() => {
            if generated.next_actions.is_empty() {
                generated.next_actions = canned_next_actions(scores, thresholds, messages);
            }
            generated
        }
        _ => Suggestions {
            suggestions: canned_suggestions(scores, thresholds, messages),
            next_actions: canned_next_actions(scores, thresholds, messages),
        },
    }
}
