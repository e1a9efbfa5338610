//! Scoring of one sampled timestamp pair.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use super::Collaborators;
use crate::config::{FallbackScores, ScoringConfig};
use crate::detect::ShapeDetector;
use crate::frame::FrameHandle;
use crate::score::{
    guarded, paired, settle, Aggregator, Detected, GeometryScorer, LabelScorer, ScorerFailure,
    Side, Signal, VisualScorer,
};
use crate::suggest::SuggestionGenerator;
use crate::window::SampleTime;
use crate::PerSecondMetric;

/// Both videos of one comparison.
#[derive(Clone, Debug)]
pub struct SampleJob {
    pub reference_url: Arc<str>,
    pub submission_url: Arc<str>,
}

/// Everything needed to score a sample, cheap to clone onto a worker thread.
#[derive(Clone)]
pub struct SampleRunner {
    collaborators: Collaborators,
    geometry: GeometryScorer,
    visual: VisualScorer,
    label: LabelScorer,
    aggregator: Aggregator,
    fallbacks: FallbackScores,
}

impl SampleRunner {
    pub fn new(config: &ScoringConfig, collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            geometry: GeometryScorer::new(config.geometry),
            visual: VisualScorer::new(config.visual),
            label: LabelScorer::new(config.labels),
            aggregator: Aggregator::new(
                config.weights,
                config.penalties,
                config.fallbacks.empty_scene,
            ),
            fallbacks: config.fallbacks,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn duration_ms(&self, video_url: &str) -> Result<u64> {
        self.collaborators.duration_probe.duration_ms(video_url)
    }

    pub fn suggestion_generator(&self) -> Option<&dyn SuggestionGenerator> {
        self.collaborators.suggestions.as_deref()
    }

    /// Score one sample, bounded by `timeout` when given.
    ///
    /// `Ok(None)` means the sample was skipped (lost frame or timeout).
    /// Collaborator panics are contained inside the sample; a worker that still
    /// dies without answering is an error.
    pub fn run_bounded(
        &self,
        job: &SampleJob,
        sample: SampleTime,
        timeout: Option<Duration>,
    ) -> Result<Option<PerSecondMetric>> {
        let Some(timeout) = timeout else {
            return Ok(self.run(job, sample));
        };

        // A worker that misses the deadline is not joined. It exits on its own
        // once the collaborator call it is blocked in returns.
        let (tx, rx) = mpsc::channel();
        let runner = self.clone();
        let job = job.clone();
        std::thread::Builder::new()
            .name(format!("sample-{}", sample.second))
            .spawn(move || {
                let _ = tx.send(runner.run(&job, sample));
            })
            .map_err(|err| anyhow!("failed to spawn sample worker: {}", err))?;

        match rx.recv_timeout(timeout) {
            Ok(metric) => Ok(metric),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "sample {} timed out after {}ms, skipping",
                    sample.second,
                    timeout.as_millis()
                );
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!(
                "sample {} worker exited without a result",
                sample.second
            )),
        }
    }

    /// Extract both frames and score them. Lost frames skip the sample.
    pub fn run(&self, job: &SampleJob, sample: SampleTime) -> Option<PerSecondMetric> {
        let reference = self.extract(&job.reference_url, sample, Side::Reference)?;
        let submission = self.extract(&job.submission_url, sample, Side::Submission)?;
        Some(self.score_frames(sample, &reference, &submission))
    }

    fn extract(&self, video_url: &str, sample: SampleTime, side: Side) -> Option<FrameHandle> {
        let timestamp_ms = match side {
            Side::Reference => sample.t_ref_ms,
            Side::Submission => sample.t_sub_ms,
        };
        let extractor = self.collaborators.frame_extractor.as_ref();
        match guarded(|| extractor.extract_frame(video_url, timestamp_ms)) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!(
                    "sample {}: {} frame at {}ms unavailable, skipping: {:#}",
                    sample.second,
                    side,
                    timestamp_ms,
                    err
                );
                None
            }
        }
    }

    fn score_frames(
        &self,
        sample: SampleTime,
        reference: &FrameHandle,
        submission: &FrameHandle,
    ) -> PerSecondMetric {
        let detector = self.collaborators.shape_detector.as_ref();
        let reference_shapes = detect(detector, reference, Side::Reference);
        let submission_shapes = detect(detector, submission, Side::Submission);
        let shapes = paired(&reference_shapes, &submission_shapes);

        let geometry_score = settle(
            Signal::Geometry,
            shapes
                .clone()
                .and_then(|(r, s)| self.geometry.score(r, s)),
            || self.fallbacks.geometry,
        );

        let visual_score = settle(
            Signal::Visual,
            self.visual.score(
                self.collaborators.histogram.as_deref(),
                reference,
                submission,
            ),
            || self.visual.heuristic(reference, submission),
        );

        let labeler = self.collaborators.labeler.as_ref();
        let label_score = settle(
            Signal::Label,
            shapes.and_then(|(r, s)| self.label.score(labeler, reference, r, submission, s)),
            || self.fallbacks.label,
        );

        let combined_score = self
            .aggregator
            .combine(geometry_score, visual_score, label_score);

        log::debug!(
            "sample {}: geometry={:.3} visual={:.3} label={:.3} combined={:.3}",
            sample.second,
            geometry_score,
            visual_score,
            label_score,
            combined_score
        );

        PerSecondMetric {
            second: sample.second,
            t_ref_ms: sample.t_ref_ms,
            t_sub_ms: sample.t_sub_ms,
            geometry_score,
            visual_score,
            label_score,
            combined_score,
        }
    }
}

fn detect(detector: &dyn ShapeDetector, frame: &FrameHandle, side: Side) -> Detected {
    guarded(|| detector.detect_shapes(frame)).map_err(|err| ScorerFailure::Detection {
        side,
        message: format!("{}: {:#}", detector.name(), err),
    })
}
