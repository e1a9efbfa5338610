//! Scene comparison orchestration.
//!
//! `SceneComparator::compare_scene` runs Windowing → Sampling → Aggregating and
//! never fails: any error or panic outside the per-signal scorers yields the
//! fallback result ([`SceneComparisonResult::fallback_with`]) in the configured
//! message text.
//! Collaborator failures inside a sample only cost that signal its score.

mod sample;

use anyhow::{Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::ScoringConfig;
use crate::detect::{Labeler, ShapeDetector};
use crate::ingest::{DurationProbe, FrameExtractor};
use crate::suggest::{self, SuggestionGenerator};
use crate::visual::HistogramComparer;
use crate::window::ComparisonWindow;
use crate::{ReferenceScene, SceneComparisonResult};

pub use sample::{SampleJob, SampleRunner};

/// External services the comparator depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub duration_probe: Arc<dyn DurationProbe>,
    pub frame_extractor: Arc<dyn FrameExtractor>,
    pub shape_detector: Arc<dyn ShapeDetector>,
    pub labeler: Arc<dyn Labeler>,
    /// Without a comparer the visual signal uses the timestamp heuristic.
    pub histogram: Option<Arc<dyn HistogramComparer>>,
    /// Without a generator suggestions are the built-in threshold text.
    pub suggestions: Option<Arc<dyn SuggestionGenerator>>,
}

impl Collaborators {
    pub fn new(
        duration_probe: Arc<dyn DurationProbe>,
        frame_extractor: Arc<dyn FrameExtractor>,
        shape_detector: Arc<dyn ShapeDetector>,
        labeler: Arc<dyn Labeler>,
    ) -> Self {
        Self {
            duration_probe,
            frame_extractor,
            shape_detector,
            labeler,
            histogram: None,
            suggestions: None,
        }
    }

    pub fn with_histogram(mut self, comparer: Arc<dyn HistogramComparer>) -> Self {
        self.histogram = Some(comparer);
        self
    }

    pub fn with_suggestions(mut self, generator: Arc<dyn SuggestionGenerator>) -> Self {
        self.suggestions = Some(generator);
        self
    }
}

/// Stateless scene scorer; one instance may serve concurrent comparisons.
pub struct SceneComparator {
    config: ScoringConfig,
    runner: SampleRunner,
}

impl SceneComparator {
    pub fn new(config: ScoringConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate().context("invalid scoring config")?;
        let runner = SampleRunner::new(&config, collaborators);
        Ok(Self { config, runner })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a submission against one reference scene.
    pub fn compare_scene(
        &self,
        scene: &ReferenceScene,
        submission_url: &str,
        reference_url: &str,
    ) -> SceneComparisonResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_pipeline(scene, submission_url, reference_url)
        }));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                log::error!(
                    "scene {} comparison failed, returning fallback: {:#}",
                    scene.scene_number,
                    err
                );
                SceneComparisonResult::fallback_with(&self.config.messages)
            }
            Err(_) => {
                log::error!(
                    "scene {} comparison panicked, returning fallback",
                    scene.scene_number
                );
                SceneComparisonResult::fallback_with(&self.config.messages)
            }
        }
    }

    fn run_pipeline(
        &self,
        scene: &ReferenceScene,
        submission_url: &str,
        reference_url: &str,
    ) -> Result<SceneComparisonResult> {
        // Windowing
        let submission_duration = match self.runner.duration_ms(submission_url) {
            Ok(ms) => Some(ms),
            Err(err) => {
                log::warn!(
                    "duration probe failed for '{}', assuming default: {:#}",
                    submission_url,
                    err
                );
                None
            }
        };
        let window = ComparisonWindow::select(scene, submission_duration, &self.config.window);

        // Sampling
        let job = SampleJob {
            reference_url: Arc::from(reference_url),
            submission_url: Arc::from(submission_url),
        };
        let mut metrics = Vec::with_capacity(window.sampling_count as usize);
        for sample in window.samples() {
            let outcome = self
                .runner
                .run_bounded(&job, sample, self.config.sample_timeout)?;
            if let Some(metric) = outcome {
                metric.validate()?;
                metrics.push(metric);
            }
        }
        metrics.sort_by_key(|m| m.second);

        // Aggregating
        let scores = self.runner.aggregator().reduce(&metrics);
        log::info!(
            "scene {}: {} of {} samples scored, similarity {:.3}",
            scene.scene_number,
            metrics.len(),
            window.sampling_count,
            scores.overall_similarity
        );
        let suggestions = suggest::resolve(
            self.runner.suggestion_generator(),
            &scene.title,
            &scores,
            &metrics,
            &self.config.suggestions,
            &self.config.messages,
        );

        Ok(SceneComparisonResult::new(scores, metrics, suggestions))
    }
}
