//! Scene similarity scoring.
//!
//! This crate scores how closely a user-recorded clip matches a reference
//! (template) scene. It samples a short aligned window of both videos once per
//! second, scores each sample on three signals, and reduces them to a scene score
//! with improvement suggestions.
//!
//! # Pipeline
//!
//! 1. **Windowing**: pick a 2–6 s window from scene timing and submission duration.
//! 2. **Sampling**: extract a frame pair per second; lost frames skip the sample.
//! 3. **Scoring**: geometry (shape overlap), visual (histogram), label (localized text).
//! 4. **Aggregating**: penalized weighted combination per second, then scene means.
//!
//! A failing or panicking collaborator costs only its signal in that sample. Any
//! other pipeline failure yields the fixed fallback result; callers never see an
//! error.
//!
//! # Module Structure
//!
//! - `detect`: overlay shapes, shape geometry, detector and labeler traits
//! - `frame`: frame handles, pixel buffers, crops
//! - `ingest`: frame extraction and duration probing
//! - `visual`: histogram comparison
//! - `score`: per-signal scorers and aggregation
//! - `compare`: the `SceneComparator` orchestrator
//! - `fixture`: deterministic in-memory collaborators

use serde::{Deserialize, Serialize};


pub mod compare;
pub mod config;
pub mod detect;
pub mod fixture;
pub mod frame;
pub mod ingest;
pub mod score;
pub mod suggest;
pub mod visual;
pub mod window;

pub use compare::{Collaborators, SceneComparator};
pub use config::{MessageCatalog, ScoringConfig};
pub use detect::{Labeler, OverlayShape, Point, ShapeDetector};
pub use fixture::Fixture;
pub use frame::{FrameCrop, FrameHandle, FramePixels};
pub use ingest::{DurationProbe, FrameExtractor};
pub use score::ScorerFailure;
pub use suggest::{SuggestionGenerator, Suggestions};
pub use visual::{HistogramComparer, HsvHistogramComparer};
pub use window::ComparisonWindow;

// -------------------- Input --------------------

/// Timing and title of the template scene being matched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceScene {
    pub scene_number: u32,
    #[serde(default)]
    pub title: String,
    /// Start of the scene within the reference video; absent means 0.
    #[serde(default)]
    pub start_time_ms: Option<u64>,
    /// End of the scene; absent means start plus the default scene length.
    #[serde(default)]
    pub end_time_ms: Option<u64>,
}

// -------------------- Metrics --------------------

/// Scores for one sampled timestamp pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerSecondMetric {
    pub second: u32,
    pub t_ref_ms: u64,
    pub t_sub_ms: u64,
    pub geometry_score: f64,
    pub visual_score: f64,
    pub label_score: f64,
    pub combined_score: f64,
}

impl PerSecondMetric {
    /// Every score must be a finite number in [0,1].
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("geometry", self.geometry_score),
            ("visual", self.visual_score),
            ("label", self.label_score),
            ("combined", self.combined_score),
        ] {
            anyhow::ensure!(
                value.is_finite() && (0.0..=1.0).contains(&value),
                "second {}: {} score {} is outside [0, 1]",
                self.second,
                name,
                value
            );
        }
        Ok(())
    }
}

/// Scene-level aggregate of all per-second metrics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScores {
    pub overall_similarity: f64,
    pub geometry_mean: f64,
    pub visual_mean: f64,
    pub label_mean: f64,
}

// -------------------- Result --------------------

pub const FALLBACK_SIMILARITY: f64 = 0.75;
pub const FALLBACK_GEOMETRY: f64 = 0.7;
pub const FALLBACK_VISUAL: f64 = 0.8;
pub const FALLBACK_LABEL: f64 = 0.6;
pub const FALLBACK_SUGGESTIONS: [&str; 2] = [
    "Automatic analysis could not be completed",
    "Please check the video quality",
];
pub const FALLBACK_NEXT_ACTION: &str = "Upload the video again";

/// Outcome of one scene comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneComparisonResult {
    pub similarity_score: f64,
    pub geometry_mean: f64,
    pub visual_mean: f64,
    pub label_mean: f64,
    pub per_second_metrics: Vec<PerSecondMetric>,
    pub suggestions: Vec<String>,
    pub next_actions: Vec<String>,
}

impl SceneComparisonResult {
    pub fn new(
        scores: SimilarityScores,
        per_second_metrics: Vec<PerSecondMetric>,
        suggestions: Suggestions,
    ) -> Self {
        Self {
            similarity_score: scores.overall_similarity,
            geometry_mean: scores.geometry_mean,
            visual_mean: scores.visual_mean,
            label_mean: scores.label_mean,
            per_second_metrics,
            suggestions: suggestions.suggestions,
            next_actions: suggestions.next_actions,
        }
    }

    /// Fixed result returned when the pipeline fails, with the default text.
    pub fn fallback() -> Self {
        Self::fallback_with(&MessageCatalog::default())
    }

    /// Fixed fallback scores with the catalog's fallback text.
    pub fn fallback_with(messages: &MessageCatalog) -> Self {
        Self {
            similarity_score: FALLBACK_SIMILARITY,
            geometry_mean: FALLBACK_GEOMETRY,
            visual_mean: FALLBACK_VISUAL,
            label_mean: FALLBACK_LABEL,
            per_second_metrics: Vec::new(),
            suggestions: messages.fallback_suggestions.clone(),
            next_actions: messages.fallback_next_actions.clone(),
        }
    }

    pub fn scores(&self) -> SimilarityScores {
        SimilarityScores {
            overall_similarity: self.similarity_score,
            geometry_mean: self.geometry_mean,
            visual_mean: self.visual_mean,
            label_mean: self.label_mean,
        }
    }
}
