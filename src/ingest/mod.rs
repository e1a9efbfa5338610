//! Frame sources for the comparison pipeline.
//!
//! The comparator only talks to the two traits below. Concrete sources:
//! - Pre-extracted frame images on disk (feature: frame-files)
//! - Local video files decoded with FFmpeg (feature: extract-ffmpeg)
//! - In-memory fakes (`crate::fixture`)
//!
//! Extraction may be slow. The comparator bounds each sample with the configured
//! timeout, so implementations need not enforce their own.

use anyhow::Result;

use crate::frame::FrameHandle;

#[cfg(feature = "frame-files")]
pub mod file;
#[cfg(feature = "extract-ffmpeg")]
pub mod file_ffmpeg;

#[cfg(feature = "frame-files")]
pub use file::ImageDirectory;
#[cfg(feature = "extract-ffmpeg")]
pub use file_ffmpeg::FfmpegVideoSource;

/// Pulls a single frame out of a video.
pub trait FrameExtractor: Send + Sync {
    /// Extract the frame shown at `timestamp_ms`. An error means this sample is lost.
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle>;
}

/// Reports the total duration of a video.
pub trait DurationProbe: Send + Sync {
    /// Duration in milliseconds. Errors are absorbed by the configured default.
    fn duration_ms(&self, video_url: &str) -> Result<u64>;
}
