//! Pre-extracted frame images on local disk.
//!
//! Frames are looked up as `<root>/<video-stem>_frame_<ms>.<ext>`, the naming
//! used when frames are dumped ahead of scoring. Only local paths are read.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::FrameExtractor;
use crate::frame::{FrameHandle, FramePixels};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Frame extractor backed by a directory of decoded images.
#[derive(Clone, Debug)]
pub struct ImageDirectory {
    root: PathBuf,
}

impl ImageDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the stored frame for a video at a timestamp, if present.
    pub fn frame_path(&self, video_url: &str, timestamp_ms: u64) -> Option<PathBuf> {
        let stem = video_stem(video_url)?;
        FRAME_EXTENSIONS
            .iter()
            .map(|ext| {
                self.root
                    .join(format!("{}_frame_{}.{}", stem, timestamp_ms, ext))
            })
            .find(|path| path.is_file())
    }
}

impl FrameExtractor for ImageDirectory {
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle> {
        let path = self.frame_path(video_url, timestamp_ms).ok_or_else(|| {
            anyhow!(
                "no stored frame for {} at {}ms under {}",
                video_url,
                timestamp_ms,
                self.root.display()
            )
        })?;
        let image = image::open(&path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        let pixels = FramePixels::new(image.into_raw(), width, height)?;
        log::debug!("loaded frame {} ({}x{})", path.display(), width, height);

        Ok(FrameHandle::from_location(path.display().to_string())
            .with_timestamp(timestamp_ms)
            .with_pixels(pixels))
    }
}

fn video_stem(video_url: &str) -> Option<String> {
    let last_segment = video_url.rsplit('/').next()?;
    Path::new(last_segment)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}
