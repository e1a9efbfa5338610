//! Whole-frame appearance comparison.

mod hsv;

use anyhow::Result;

use crate::frame::FrameHandle;

pub use hsv::{rgb_to_hsv, HsvHistogramComparer};

/// Color-distribution similarity between two frames.
pub trait HistogramComparer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Similarity of the two frames. Values outside [0,1] are clamped by the caller.
    fn similarity(&self, a: &FrameHandle, b: &FrameHandle) -> Result<f64>;
}
