use anyhow::{anyhow, bail, Result};

use super::HistogramComparer;
use crate::frame::{FrameHandle, FramePixels};

const HUE_BINS: usize = 50;
const SATURATION_BINS: usize = 60;
const VALUE_BINS: usize = 60;
const HISTOGRAM_LEN: usize = HUE_BINS * SATURATION_BINS * VALUE_BINS;

/// Hue range of 8-bit HSV (degrees halved to fit a byte).
const HUE_RANGE: f64 = 180.0;
const CHANNEL_RANGE: f64 = 256.0;

/// Correlation of 3-D HSV color histograms (50 hue × 60 saturation × 60 value bins).
///
/// Frames must carry pixels. The correlation coefficient is clamped to [0,1], so
/// anti-correlated frames score 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct HsvHistogramComparer;

impl HsvHistogramComparer {
    pub fn new() -> Self {
        Self
    }
}

impl HistogramComparer for HsvHistogramComparer {
    fn name(&self) -> &'static str {
        "hsv-histogram"
    }

    fn similarity(&self, a: &FrameHandle, b: &FrameHandle) -> Result<f64> {
        let pixels_a = a
            .pixels()
            .ok_or_else(|| anyhow!("frame {} carries no pixels", a.id))?;
        let pixels_b = b
            .pixels()
            .ok_or_else(|| anyhow!("frame {} carries no pixels", b.id))?;

        let hist_a = hsv_histogram(pixels_a);
        let hist_b = hsv_histogram(pixels_b);
        let correlation = correlate(&hist_a, &hist_b)?;
        Ok(correlation.clamp(0.0, 1.0))
    }
}

/// Convert one RGB pixel to 8-bit HSV: hue in [0,180), saturation and value in [0,255].
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    (hue / 2.0, saturation, max)
}

fn bin(value: f64, range: f64, bins: usize) -> usize {
    ((value / range * bins as f64) as usize).min(bins - 1)
}

fn hsv_histogram(pixels: &FramePixels) -> Vec<f64> {
    let mut hist = vec![0.0; HISTOGRAM_LEN];
    for px in pixels.pixels() {
        let (h, s, v) = rgb_to_hsv(px);
        let hb = bin(h, HUE_RANGE, HUE_BINS);
        let sb = bin(s, CHANNEL_RANGE, SATURATION_BINS);
        let vb = bin(v, CHANNEL_RANGE, VALUE_BINS);
        hist[(hb * SATURATION_BINS + sb) * VALUE_BINS + vb] += 1.0;
    }
    hist
}

/// Pearson correlation between two histograms.
fn correlate(a: &[f64], b: &[f64]) -> Result<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        bail!("histogram correlation undefined for a flat histogram");
    }
    Ok(cov / denom)
}
