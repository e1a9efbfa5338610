//! Deterministic in-memory collaborators.
//!
//! A `Fixture` describes videos as a map of timestamp to frame contents (shapes,
//! label, solid color). It implements every collaborator trait the comparator
//! needs, which makes whole comparisons reproducible without decoders or models.
//!
//! ```json
//! {
//!   "durations": { "sub.mp4": 8000 },
//!   "videos": {
//!     "ref.mp4": { "0": { "shapes": [...], "label": "cup", "color": [200, 40, 40] } }
//!   }
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::compare::Collaborators;
use crate::detect::{Labeler, OverlayShape, Point, ShapeDetector};
use crate::frame::{FrameCrop, FrameHandle, FramePixels};
use crate::ingest::{DurationProbe, FrameExtractor};
use crate::suggest::{SuggestionGenerator, Suggestions};
use crate::{PerSecondMetric, SimilarityScores};

const FRAME_TOKEN: &str = "_frame_";
const FRAME_SIDE: u32 = 16;

pub const SYNTHETIC_REFERENCE: &str = "reference.mp4";
pub const SYNTHETIC_SUBMISSION: &str = "submission.mp4";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureFrame {
    #[serde(default)]
    pub shapes: Vec<OverlayShape>,
    /// Label returned for any crop of this frame; defaults to the shape's own label.
    #[serde(default)]
    pub label: Option<String>,
    /// Solid fill color; frames without one carry no pixels.
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}

impl FixtureFrame {
    pub fn new(shapes: Vec<OverlayShape>) -> Self {
        Self {
            shapes,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub durations: BTreeMap<String, u64>,
    #[serde(default)]
    pub videos: BTreeMap<String, BTreeMap<u64, FixtureFrame>>,
    #[serde(default)]
    pub suggestions: Option<Suggestions>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    pub fn with_duration(mut self, video_url: &str, duration_ms: u64) -> Self {
        self.durations.insert(video_url.to_string(), duration_ms);
        self
    }

    pub fn with_frame(mut self, video_url: &str, timestamp_ms: u64, frame: FixtureFrame) -> Self {
        self.videos
            .entry(video_url.to_string())
            .or_default()
            .insert(timestamp_ms, frame);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Suggestions) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    /// A reference and a slightly drifting submission, eight seconds each.
    pub fn synthetic() -> Self {
        let mut fixture = Self::new()
            .with_duration(SYNTHETIC_REFERENCE, 8000)
            .with_duration(SYNTHETIC_SUBMISSION, 8000);
        for second in 0..8u64 {
            let drift = second as f64 * 0.02;
            let reference = FixtureFrame::new(vec![
                OverlayShape::boxed(0.30, 0.30, 0.40, 0.40, "cup", 0.92).with_localized("cup"),
                OverlayShape::polygon(
                    vec![
                        Point::new(0.05, 0.80),
                        Point::new(0.25, 0.80),
                        Point::new(0.15, 0.95),
                    ],
                    "saucer",
                    0.61,
                ),
            ])
            .with_color([196, 120, 64]);
            let submission = FixtureFrame::new(vec![OverlayShape::boxed(
                0.32 + drift,
                0.28,
                0.36,
                0.40,
                "mug",
                0.88,
            )
            .with_localized("cup")])
            .with_color([188, 124, 70]);
            fixture = fixture
                .with_frame(SYNTHETIC_REFERENCE, second * 1000, reference)
                .with_frame(SYNTHETIC_SUBMISSION, second * 1000, submission);
        }
        fixture
    }

    /// All collaborator roles backed by this fixture. No histogram comparer is set.
    pub fn into_collaborators(self) -> Collaborators {
        let fixture = Arc::new(self);
        Collaborators::new(
            fixture.clone(),
            fixture.clone(),
            fixture.clone(),
            fixture.clone(),
        )
        .with_suggestions(fixture)
    }

    fn frame(&self, video_url: &str, timestamp_ms: u64) -> Option<&FixtureFrame> {
        self.videos.get(video_url)?.get(&timestamp_ms)
    }

    fn frame_for(&self, handle: &FrameHandle) -> Result<&FixtureFrame> {
        let (video_url, timestamp) = handle
            .id
            .rsplit_once(FRAME_TOKEN)
            .ok_or_else(|| anyhow!("frame id '{}' has no timestamp token", handle.id))?;
        let timestamp_ms: u64 = timestamp
            .parse()
            .with_context(|| format!("frame id '{}' has a malformed timestamp", handle.id))?;
        self.frame(video_url, timestamp_ms)
            .ok_or_else(|| anyhow!("fixture has no frame '{}'", handle.id))
    }
}

impl DurationProbe for Fixture {
    fn duration_ms(&self, video_url: &str) -> Result<u64> {
        self.durations
            .get(video_url)
            .copied()
            .ok_or_else(|| anyhow!("fixture has no duration for '{}'", video_url))
    }
}

impl FrameExtractor for Fixture {
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle> {
        let frame = self
            .frame(video_url, timestamp_ms)
            .ok_or_else(|| anyhow!("'{}' has no frame at {}ms", video_url, timestamp_ms))?;
        let handle =
            FrameHandle::from_location(format!("{}{}{}", video_url, FRAME_TOKEN, timestamp_ms))
                .with_timestamp(timestamp_ms);
        match frame.color {
            Some(color) => {
                let pixels = FramePixels::filled(FRAME_SIDE, FRAME_SIDE, color)?;
                Ok(handle.with_pixels(pixels))
            }
            None => Ok(handle),
        }
    }
}

impl ShapeDetector for Fixture {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn detect_shapes(&self, frame: &FrameHandle) -> Result<Vec<OverlayShape>> {
        Ok(self.frame_for(frame)?.shapes.clone())
    }
}

impl Labeler for Fixture {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn label_crop(&self, crop: &FrameCrop<'_>) -> Result<String> {
        let frame = self.frame_for(crop.frame)?;
        Ok(frame.label.clone().unwrap_or_else(|| {
            crop.shape
                .label_localized()
                .unwrap_or_else(|| crop.shape.label())
                .to_string()
        }))
    }
}

impl SuggestionGenerator for Fixture {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn generate(
        &self,
        _scene_title: &str,
        _scores: &SimilarityScores,
        _metrics: &[PerSecondMetric],
    ) -> Result<Option<Suggestions>> {
        Ok(self.suggestions.clone())
    }
}
