//! compare_scene - score a submission clip against a reference scene
//!
//! Collaborators come from a fixture file (durations, frames, shapes, labels),
//! or from a built-in synthetic fixture when none is given. With the
//! `extract-ffmpeg` feature, `--decode` reads frames and durations from the real
//! video files while the fixture still supplies shapes and labels. The result is
//! printed as JSON on stdout.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use scene_compare::fixture::{SYNTHETIC_REFERENCE, SYNTHETIC_SUBMISSION};
use scene_compare::{
    Collaborators, Fixture, HsvHistogramComparer, ReferenceScene, SceneComparator, ScoringConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Fixture JSON describing both videos. Uses a synthetic pair when omitted.
    #[arg(long)]
    fixture: Option<PathBuf>,
    /// Scoring config (JSON or TOML). Overrides SCENE_COMPARE_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = SYNTHETIC_REFERENCE)]
    reference: String,
    #[arg(long, default_value = SYNTHETIC_SUBMISSION)]
    submission: String,
    #[arg(long, default_value_t = 1)]
    scene_number: u32,
    #[arg(long, default_value = "")]
    title: String,
    /// Scene start within the reference video.
    #[arg(long)]
    start_ms: Option<u64>,
    /// Scene end within the reference video.
    #[arg(long)]
    end_ms: Option<u64>,
    /// Skip histogram comparison and use the timestamp heuristic for the visual signal.
    #[arg(long)]
    no_histogram: bool,
    /// Print compact JSON.
    #[arg(long)]
    compact: bool,
    /// Decode frames and durations from the video files with FFmpeg.
    #[cfg(feature = "extract-ffmpeg")]
    #[arg(long)]
    decode: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ScoringConfig::from_path(path)?,
        None => ScoringConfig::load()?,
    };

    let fixture = match &args.fixture {
        Some(path) => Fixture::from_path(path)?,
        None => {
            log::info!("no fixture given, using the synthetic pair");
            Fixture::synthetic()
        }
    };
    if !fixture.videos.contains_key(&args.reference) {
        return Err(anyhow!("fixture has no video '{}'", args.reference));
    }

    let mut collaborators = fixture.into_collaborators();
    apply_decoder(&args, &mut collaborators)?;
    if !args.no_histogram {
        collaborators = collaborators.with_histogram(Arc::new(HsvHistogramComparer::new()));
    }
    let comparator = SceneComparator::new(config, collaborators)?;

    let scene = ReferenceScene {
        scene_number: args.scene_number,
        title: args.title,
        start_time_ms: args.start_ms,
        end_time_ms: args.end_ms,
    };
    let result = comparator.compare_scene(&scene, &args.submission, &args.reference);

    let rendered = if args.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", rendered);
    Ok(())
}

#[cfg(feature = "extract-ffmpeg")]
fn apply_decoder(args: &Args, collaborators: &mut Collaborators) -> Result<()> {
    if args.decode {
        let source = Arc::new(scene_compare::ingest::FfmpegVideoSource::new()?);
        log::info!("decoding frames with ffmpeg; shapes and labels come from the fixture");
        collaborators.frame_extractor = source.clone();
        collaborators.duration_probe = source;
    }
    Ok(())
}

#[cfg(not(feature = "extract-ffmpeg"))]
fn apply_decoder(_args: &Args, _collaborators: &mut Collaborators) -> Result<()> {
    Ok(())
}
