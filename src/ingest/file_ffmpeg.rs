//! Local video files decoded with FFmpeg.
//!
//! Each call opens the container, seeks to the requested timestamp and decodes
//! forward to the first frame at or after it. Frames are scaled to RGB24 in memory.

use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next as ffmpeg;

use super::{DurationProbe, FrameExtractor};
use crate::frame::{FrameHandle, FramePixels};

/// FFmpeg container durations and seek positions are in microseconds.
const AV_TIME_BASE_PER_MS: i64 = 1_000;

/// Duration probe and frame extractor for local video files.
pub struct FfmpegVideoSource {
    _private: (),
}

impl FfmpegVideoSource {
    pub fn new() -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(Self { _private: () })
    }
}

impl DurationProbe for FfmpegVideoSource {
    fn duration_ms(&self, video_url: &str) -> Result<u64> {
        let input = ffmpeg::format::input(&video_url)
            .with_context(|| format!("failed to open '{}' with ffmpeg", video_url))?;
        let duration = input.duration();
        if duration <= 0 {
            bail!("container reports no duration for '{}'", video_url);
        }
        Ok((duration / AV_TIME_BASE_PER_MS) as u64)
    }
}

impl FrameExtractor for FfmpegVideoSource {
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle> {
        let mut input = ffmpeg::format::input(&video_url)
            .with_context(|| format!("failed to open '{}' with ffmpeg", video_url))?;

        let (stream_index, time_base, parameters) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| anyhow!("'{}' has no video track", video_url))?;
            (stream.index(), stream.time_base(), stream.parameters())
        };
        let context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .context("load video decoder parameters")?;
        let mut decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let position = timestamp_ms as i64 * AV_TIME_BASE_PER_MS;
        input
            .seek(position, ..position)
            .with_context(|| format!("seek to {}ms in '{}'", timestamp_ms, video_url))?;

        let mut decoded = ffmpeg::frame::Video::empty();
        for (stream, packet) in input.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                if reached(&decoded, time_base, timestamp_ms) {
                    return to_handle(video_url, timestamp_ms, &decoded);
                }
            }
        }

        decoder.send_eof().context("flush ffmpeg decoder")?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            if reached(&decoded, time_base, timestamp_ms) {
                return to_handle(video_url, timestamp_ms, &decoded);
            }
        }

        bail!("'{}' ended before {}ms", video_url, timestamp_ms)
    }
}

fn reached(frame: &ffmpeg::frame::Video, time_base: ffmpeg::Rational, timestamp_ms: u64) -> bool {
    let Some(pts) = frame.pts() else {
        return true;
    };
    let num = time_base.numerator() as i64;
    let den = time_base.denominator() as i64;
    if den == 0 {
        return true;
    }
    pts * num * 1000 / den >= timestamp_ms as i64
}

fn to_handle(
    video_url: &str,
    timestamp_ms: u64,
    decoded: &ffmpeg::frame::Video,
) -> Result<FrameHandle> {
    let mut scaler = ffmpeg::software::scaling::context::Context::get(
        decoded.format(),
        decoded.width(),
        decoded.height(),
        ffmpeg::util::format::pixel::Pixel::RGB24,
        decoded.width(),
        decoded.height(),
        ffmpeg::software::scaling::flag::Flags::BILINEAR,
    )
    .context("create ffmpeg scaler")?;

    let mut rgb_frame = ffmpeg::frame::Video::empty();
    scaler
        .run(decoded, &mut rgb_frame)
        .context("scale frame to RGB")?;
    let pixels = frame_to_pixels(&rgb_frame)?;

    Ok(
        FrameHandle::from_location(format!("{}_frame_{}", video_url, timestamp_ms))
            .with_timestamp(timestamp_ms)
            .with_pixels(pixels),
    )
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<FramePixels> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let packed = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return FramePixels::new(packed.to_vec(), width, height);
    }

    let mut rgb = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        rgb.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    FramePixels::new(rgb, width, height)
}
