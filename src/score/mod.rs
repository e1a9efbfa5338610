//! Per-signal scorers and the aggregation of their outputs.
//!
//! Scorers return `Result<f64, ScorerFailure>`. The sampling code decides the
//! fallback for each signal at the call site through [`settle`]. Collaborator
//! calls go through [`guarded`], so a panicking model or service costs one
//! signal of one sample rather than the whole scene.

mod aggregate;
mod geometry;
mod label;
mod visual;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::detect::OverlayShape;

pub use aggregate::Aggregator;
pub use geometry::{dominant_match, GeometryScorer};
pub use label::{label_similarity, LabelMatch, LabelScorer};
pub use visual::VisualScorer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Reference,
    Submission,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Reference => f.write_str("reference"),
            Side::Submission => f.write_str("submission"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Geometry,
    Visual,
    Label,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Geometry => f.write_str("geometry"),
            Signal::Visual => f.write_str("visual"),
            Signal::Label => f.write_str("label"),
        }
    }
}

/// Why a scorer could not produce a measured score.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ScorerFailure {
    #[error("no shapes detected in the {0} frame")]
    NoShapes(Side),
    #[error("shape detection failed on the {side} frame: {message}")]
    Detection { side: Side, message: String },
    #[error("labeling failed on the {side} frame: {message}")]
    Labeling { side: Side, message: String },
    #[error("labeler returned an empty label for the {0} frame")]
    EmptyLabel(Side),
    #[error("histogram comparison failed: {0}")]
    Histogram(String),
    #[error("no histogram comparer configured")]
    Unavailable,
    #[error("{0} score is not a finite number")]
    NonFinite(Signal),
}

/// Shapes detected on one side of a sample, or why detection failed.
pub type Detected = Result<Vec<OverlayShape>, ScorerFailure>;

/// Both sides' shapes, failing when either side has none.
pub fn paired<'a>(
    reference: &'a Detected,
    submission: &'a Detected,
) -> Result<(&'a [OverlayShape], &'a [OverlayShape]), ScorerFailure> {
    let reference = reference.as_deref().map_err(Clone::clone)?;
    let submission = submission.as_deref().map_err(Clone::clone)?;
    if reference.is_empty() {
        return Err(ScorerFailure::NoShapes(Side::Reference));
    }
    if submission.is_empty() {
        return Err(ScorerFailure::NoShapes(Side::Submission));
    }
    Ok((reference, submission))
}

/// Run a collaborator call, turning a panic into an error.
pub fn guarded<T>(call: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(anyhow::anyhow!(
            "collaborator panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Resolve a scorer outcome to a number, substituting the fallback on failure.
pub fn settle(
    signal: Signal,
    outcome: Result<f64, ScorerFailure>,
    fallback: impl FnOnce() -> f64,
) -> f64 {
    match outcome {
        Ok(score) => score,
        Err(failure) => {
            let score = fallback();
            log::debug!("{} score fell back to {:.3}: {}", signal, score, failure);
            score
        }
    }
}
