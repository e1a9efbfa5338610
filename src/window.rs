//! Comparison window selection.

use serde::{Deserialize, Serialize};

use crate::config::WindowSettings;
use crate::ReferenceScene;

/// The aligned slice of reference and submission that gets scored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonWindow {
    pub ref_start_ms: u64,
    pub ref_end_ms: u64,
    pub sub_start_ms: u64,
    pub window_ms: u64,
    pub sampling_count: u32,
    pub sample_interval_ms: u64,
}

/// One sampled timestamp pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleTime {
    pub second: u32,
    pub t_ref_ms: u64,
    pub t_sub_ms: u64,
}

impl ComparisonWindow {
    /// Compute the window for a reference scene and a submission duration.
    ///
    /// Missing scene end and unknown submission duration fall back to the
    /// configured defaults. The result always lies within `[min_ms, max_ms]`.
    pub fn select(
        scene: &ReferenceScene,
        submission_duration_ms: Option<u64>,
        settings: &WindowSettings,
    ) -> Self {
        let ref_start_ms = scene.start_time_ms.unwrap_or(0);
        let ref_end_ms = scene
            .end_time_ms
            .unwrap_or_else(|| ref_start_ms.saturating_add(settings.default_ref_duration_ms));
        let submission_ms =
            submission_duration_ms.unwrap_or(settings.default_submission_duration_ms);

        let ref_duration = ref_end_ms as i128 - ref_start_ms as i128;
        let window = ref_duration
            .min(submission_ms as i128)
            .min(settings.preferred_max_ms as i128)
            .clamp(settings.min_ms as i128, settings.max_ms as i128);
        let window_ms = window as u64;
        let sampling_count = (window_ms / settings.sample_interval_ms) as u32;

        log::info!(
            "comparison window: ref={}ms-{}ms, sub=0-{}ms, window={}ms, samples={}",
            ref_start_ms,
            ref_end_ms,
            submission_ms,
            window_ms,
            sampling_count
        );

        Self {
            ref_start_ms,
            ref_end_ms,
            sub_start_ms: 0,
            window_ms,
            sampling_count,
            sample_interval_ms: settings.sample_interval_ms,
        }
    }

    /// Sample timestamps, one per interval, in ascending order.
    pub fn samples(&self) -> impl Iterator<Item = SampleTime> + '_ {
        (0..self.sampling_count).map(move |second| {
            let offset = (second as u64).saturating_mul(self.sample_interval_ms);
            SampleTime {
                second,
                t_ref_ms: self.ref_start_ms.saturating_add(offset),
                t_sub_ms: self.sub_start_ms.saturating_add(offset),
            }
        })
    }
}
