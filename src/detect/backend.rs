use anyhow::Result;

use crate::detect::shape::OverlayShape;
use crate::frame::{FrameCrop, FrameHandle};

/// Shape detection over a single frame.
///
/// Implementations return shapes ordered by dominance (confidence × area,
/// highest first). The scorers treat index 0 as the dominant shape.
pub trait ShapeDetector: Send + Sync {
    /// Detector identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Detect shapes in a frame. An empty list is a valid answer.
    fn detect_shapes(&self, frame: &FrameHandle) -> Result<Vec<OverlayShape>>;
}

/// Produces a localized text label for a cropped frame region.
pub trait Labeler: Send + Sync {
    fn name(&self) -> &'static str;

    fn label_crop(&self, crop: &FrameCrop<'_>) -> Result<String>;
}
