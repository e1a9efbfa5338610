//! Frame handles passed between collaborators and scorers.
//!
//! - `FrameHandle`: identity of an extracted frame, its timestamp when known, and
//!   optionally the decoded pixels.
//! - `FramePixels`: packed RGB24 buffer with validated dimensions.
//! - `FrameCrop`: the region of a frame covered by one shape, handed to labelers.

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::detect::{BBox, OverlayShape};

/// Location token carrying the capture timestamp, e.g. `clip_frame_1500.jpg`.
const FRAME_TOKEN_PATTERN: &str = r"_frame_(\d+)";

fn frame_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(FRAME_TOKEN_PATTERN).expect("static frame token pattern"))
}

/// Parse the millisecond timestamp embedded in a frame location, if any.
pub fn parse_frame_timestamp(location: &str) -> Option<u64> {
    frame_token()
        .captures(location)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ----------------------------------------------------------------------------
// FramePixels
// ----------------------------------------------------------------------------

/// Packed RGB24 pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePixels {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl FramePixels {
    pub fn new(rgb: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))? as usize;
        if rgb.len() != expected {
            bail!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                rgb.len()
            );
        }
        Ok(Self { width, height, rgb })
    }

    /// Solid-color frame, mostly useful for fakes.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Result<Self> {
        let count = (width as usize) * (height as usize);
        let rgb = color.iter().copied().cycle().take(count * 3).collect();
        Self::new(rgb, width, height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.rgb.chunks_exact(3).map(|px| [px[0], px[1], px[2]])
    }

    /// Cut out the pixel rectangle covered by a normalized box.
    ///
    /// The rectangle is truncated to whole pixels and clamped to the image.
    pub fn crop(&self, bbox: &BBox) -> Result<FramePixels> {
        let img_w = self.width as i64;
        let img_h = self.height as i64;

        let x = ((bbox[0] * img_w as f64) as i64).max(0);
        let y = ((bbox[1] * img_h as f64) as i64).max(0);
        let w = (((bbox[2] - bbox[0]) * img_w as f64) as i64).min(img_w - x);
        let h = (((bbox[3] - bbox[1]) * img_h as f64) as i64).min(img_h - y);

        if w <= 0 || h <= 0 {
            bail!("crop region {:?} is empty for a {}x{} frame", bbox, img_w, img_h);
        }

        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let stride = self.width as usize * 3;
        let mut rgb = Vec::with_capacity(w * h * 3);
        for row in y..y + h {
            let start = row * stride + x * 3;
            rgb.extend_from_slice(&self.rgb[start..start + w * 3]);
        }
        FramePixels::new(rgb, w as u32, h as u32)
    }
}

// ----------------------------------------------------------------------------
// FrameHandle
// ----------------------------------------------------------------------------

/// An extracted frame. Cloning shares the pixel buffer.
#[derive(Clone, Debug)]
pub struct FrameHandle {
    /// Stable identifier (usually the frame's storage location).
    pub id: String,
    /// Capture timestamp within its video, when known.
    pub timestamp_ms: Option<u64>,
    pixels: Option<Arc<FramePixels>>,
}

impl FrameHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp_ms: None,
            pixels: None,
        }
    }

    /// Handle for a stored frame; picks up the `_frame_<ms>` timestamp token.
    pub fn from_location(location: impl Into<String>) -> Self {
        let id = location.into();
        let timestamp_ms = parse_frame_timestamp(&id);
        Self {
            id,
            timestamp_ms,
            pixels: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    pub fn with_pixels(mut self, pixels: FramePixels) -> Self {
        self.pixels = Some(Arc::new(pixels));
        self
    }

    pub fn pixels(&self) -> Option<&FramePixels> {
        self.pixels.as_deref()
    }
}

// ----------------------------------------------------------------------------
// FrameCrop
// ----------------------------------------------------------------------------

/// The part of a frame covered by one shape.
#[derive(Debug)]
pub struct FrameCrop<'a> {
    pub frame: &'a FrameHandle,
    pub shape: &'a OverlayShape,
    pub bbox: BBox,
    /// Cropped pixels; `None` when the frame carries no pixels or the region is empty.
    pub pixels: Option<FramePixels>,
}

impl<'a> FrameCrop<'a> {
    pub fn new(frame: &'a FrameHandle, shape: &'a OverlayShape) -> Self {
        let bbox = shape.bounding_box();
        let pixels = frame.pixels().and_then(|px| match px.crop(&bbox) {
            Ok(cropped) => Some(cropped),
            Err(err) => {
                log::debug!("crop skipped for frame {}: {}", frame.id, err);
                None
            }
        });
        Self {
            frame,
            shape,
            bbox,
            pixels,
        }
    }
}
