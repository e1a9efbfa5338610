//! Scoring configuration.
//!
//! Every weight, threshold, window bound and fallback constant the comparator
//! uses lives here. `ScoringConfig::default()` is the production tuning; a file
//! named by `SCENE_COMPARE_CONFIG` (JSON, or TOML with a `.toml` extension) may
//! override any section, and a few env vars override single values.

use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::suggest;

pub const CONFIG_ENV: &str = "SCENE_COMPARE_CONFIG";
pub const WEIGHTS_ENV: &str = "SCENE_COMPARE_WEIGHTS";
pub const SAMPLE_TIMEOUT_ENV: &str = "SCENE_COMPARE_SAMPLE_TIMEOUT_MS";
pub const WINDOW_MAX_ENV: &str = "SCENE_COMPARE_WINDOW_MAX_MS";

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
const DEFAULT_SAMPLE_TIMEOUT_MS: u64 = 15_000;

/// Per-signal weights of the combined per-second score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub geometry: f64,
    pub visual: f64,
    pub label: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            geometry: 0.50,
            visual: 0.35,
            label: 0.15,
        }
    }
}

/// Term weights of the geometry score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryTerms {
    pub iou: f64,
    pub centroid: f64,
    pub scale: f64,
}

impl Default for GeometryTerms {
    fn default() -> Self {
        Self {
            iou: 0.5,
            centroid: 0.3,
            scale: 0.2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltySettings {
    /// Geometry below this is multiplied by `geometry_factor`.
    pub geometry_threshold: f64,
    pub geometry_factor: f64,
    /// Visual below this is multiplied by `visual_factor`.
    pub visual_threshold: f64,
    pub visual_factor: f64,
    /// Upper bound on a per-second combined score.
    pub combined_cap: f64,
    /// Applied after the cap when both geometry and visual are low.
    pub joint_factor: f64,
    /// Scene-level multiplier on the mean combined score.
    pub scene_factor: f64,
}

impl Default for PenaltySettings {
    fn default() -> Self {
        Self {
            geometry_threshold: 0.5,
            geometry_factor: 0.7,
            visual_threshold: 0.6,
            visual_factor: 0.85,
            combined_cap: 0.95,
            joint_factor: 0.8,
            scene_factor: 0.9,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelScores {
    pub exact: f64,
    pub near: f64,
    pub mismatch: f64,
}

impl Default for LabelScores {
    fn default() -> Self {
        Self {
            exact: 1.0,
            near: 0.7,
            mismatch: 0.3,
        }
    }
}

/// Visual score used when no histogram comparison is available.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualHeuristic {
    pub identical: f64,
    pub timestamp_floor: f64,
    pub timestamp_span_ms: u64,
    pub unknown: f64,
}

impl Default for VisualHeuristic {
    fn default() -> Self {
        Self {
            identical: 1.0,
            timestamp_floor: 0.3,
            timestamp_span_ms: 3000,
            unknown: 0.65,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackScores {
    pub geometry: f64,
    pub label: f64,
    /// Scene-level value of every field when no sample succeeded.
    pub empty_scene: f64,
}

impl Default for FallbackScores {
    fn default() -> Self {
        Self {
            geometry: 0.3,
            label: 0.5,
            empty_scene: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub default_ref_duration_ms: u64,
    pub default_submission_duration_ms: u64,
    /// Pre-clamp upper bound on the window.
    pub preferred_max_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub sample_interval_ms: u64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            default_ref_duration_ms: 5000,
            default_submission_duration_ms: 10_000,
            preferred_max_ms: 3000,
            min_ms: 2000,
            max_ms: 6000,
            sample_interval_ms: 1000,
        }
    }
}

/// Thresholds for the built-in suggestion and next-action text.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionThresholds {
    pub geometry: f64,
    pub visual: f64,
    pub label: f64,
    pub ready: f64,
    pub minor: f64,
}

impl Default for SuggestionThresholds {
    fn default() -> Self {
        Self {
            geometry: 0.5,
            visual: 0.6,
            label: 0.5,
            ready: 0.90,
            minor: 0.75,
        }
    }
}

/// Text of the built-in suggestions, next actions and the fallback result.
///
/// Defaults are English; deployments serving another locale replace them in the
/// `messages` section of the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageCatalog {
    pub framing: String,
    pub lighting: String,
    pub visibility: String,
    pub meets_requirements: String,
    pub ready: String,
    pub minor_adjustment: String,
    pub rerecord: String,
    pub review_template: String,
    pub fallback_suggestions: Vec<String>,
    pub fallback_next_actions: Vec<String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            framing: suggest::FRAMING_SUGGESTION.to_string(),
            lighting: suggest::LIGHTING_SUGGESTION.to_string(),
            visibility: suggest::VISIBILITY_SUGGESTION.to_string(),
            meets_requirements: suggest::MEETS_REQUIREMENTS.to_string(),
            ready: suggest::READY_ACTION.to_string(),
            minor_adjustment: suggest::MINOR_ADJUSTMENT_ACTION.to_string(),
            rerecord: suggest::RERECORD_ACTION.to_string(),
            review_template: suggest::REVIEW_TEMPLATE_ACTION.to_string(),
            fallback_suggestions: crate::FALLBACK_SUGGESTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_next_actions: vec![crate::FALLBACK_NEXT_ACTION.to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScoringConfigFile {
    weights: Option<SignalWeights>,
    geometry: Option<GeometryTerms>,
    penalties: Option<PenaltySettings>,
    labels: Option<LabelScores>,
    visual: Option<VisualHeuristic>,
    fallbacks: Option<FallbackScores>,
    window: Option<WindowSettings>,
    suggestions: Option<SuggestionThresholds>,
    messages: Option<MessageCatalog>,
    /// 0 disables the per-sample timeout.
    sample_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoringConfig {
    pub weights: SignalWeights,
    pub geometry: GeometryTerms,
    pub penalties: PenaltySettings,
    pub labels: LabelScores,
    pub visual: VisualHeuristic,
    pub fallbacks: FallbackScores,
    pub window: WindowSettings,
    pub suggestions: SuggestionThresholds,
    pub messages: MessageCatalog,
    /// Bound on extracting and scoring one sample; `None` runs samples inline.
    pub sample_timeout: Option<Duration>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::from_file(ScoringConfigFile::default())
    }
}

impl ScoringConfig {
    /// Defaults, then the `SCENE_COMPARE_CONFIG` file if set, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file, then apply env overrides.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScoringConfigFile) -> Self {
        let sample_timeout = match file.sample_timeout_ms.unwrap_or(DEFAULT_SAMPLE_TIMEOUT_MS) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Self {
            weights: file.weights.unwrap_or_default(),
            geometry: file.geometry.unwrap_or_default(),
            penalties: file.penalties.unwrap_or_default(),
            labels: file.labels.unwrap_or_default(),
            visual: file.visual.unwrap_or_default(),
            fallbacks: file.fallbacks.unwrap_or_default(),
            window: file.window.unwrap_or_default(),
            suggestions: file.suggestions.unwrap_or_default(),
            messages: file.messages.unwrap_or_default(),
            sample_timeout,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(weights) = std::env::var(WEIGHTS_ENV) {
            let parsed = split_csv(&weights)
                .iter()
                .map(|w| w.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| anyhow!("{} must be three comma-separated numbers", WEIGHTS_ENV))?;
            match parsed.as_slice() {
                [] => {}
                [geometry, visual, label] => {
                    self.weights = SignalWeights {
                        geometry: *geometry,
                        visual: *visual,
                        label: *label,
                    };
                }
                _ => return Err(anyhow!("{} must have exactly three entries", WEIGHTS_ENV)),
            }
        }
        if let Ok(timeout) = std::env::var(SAMPLE_TIMEOUT_ENV) {
            let ms: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("{} must be an integer number of milliseconds", SAMPLE_TIMEOUT_ENV)
            })?;
            self.sample_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Ok(max) = std::env::var(WINDOW_MAX_ENV) {
            self.window.preferred_max_ms = max.trim().parse().map_err(|_| {
                anyhow!("{} must be an integer number of milliseconds", WINDOW_MAX_ENV)
            })?;
        }
        Ok(())
    }

    /// Reject configurations that could push a score outside [0,1].
    pub fn validate(&self) -> Result<()> {
        check_weights(
            "weights",
            &[self.weights.geometry, self.weights.visual, self.weights.label],
        )?;
        check_weights(
            "geometry",
            &[self.geometry.iou, self.geometry.centroid, self.geometry.scale],
        )?;

        let p = &self.penalties;
        for (name, value) in [
            ("penalties.geometry_threshold", p.geometry_threshold),
            ("penalties.geometry_factor", p.geometry_factor),
            ("penalties.visual_threshold", p.visual_threshold),
            ("penalties.visual_factor", p.visual_factor),
            ("penalties.combined_cap", p.combined_cap),
            ("penalties.joint_factor", p.joint_factor),
            ("penalties.scene_factor", p.scene_factor),
            ("labels.exact", self.labels.exact),
            ("labels.near", self.labels.near),
            ("labels.mismatch", self.labels.mismatch),
            ("visual.identical", self.visual.identical),
            ("visual.timestamp_floor", self.visual.timestamp_floor),
            ("visual.unknown", self.visual.unknown),
            ("fallbacks.geometry", self.fallbacks.geometry),
            ("fallbacks.label", self.fallbacks.label),
            ("fallbacks.empty_scene", self.fallbacks.empty_scene),
        ] {
            check_unit(name, value)?;
        }

        let w = &self.window;
        ensure!(w.min_ms > 0, "window.min_ms must be greater than zero");
        ensure!(
            w.min_ms <= w.max_ms,
            "window.min_ms ({}) must not exceed window.max_ms ({})",
            w.min_ms,
            w.max_ms
        );
        ensure!(
            w.sample_interval_ms > 0,
            "window.sample_interval_ms must be greater than zero"
        );
        ensure!(
            self.visual.timestamp_span_ms > 0,
            "visual.timestamp_span_ms must be greater than zero"
        );

        let m = &self.messages;
        for (name, text) in [
            ("messages.framing", &m.framing),
            ("messages.lighting", &m.lighting),
            ("messages.visibility", &m.visibility),
            ("messages.meets_requirements", &m.meets_requirements),
            ("messages.ready", &m.ready),
            ("messages.minor_adjustment", &m.minor_adjustment),
            ("messages.rerecord", &m.rerecord),
            ("messages.review_template", &m.review_template),
        ] {
            ensure!(!text.trim().is_empty(), "{} must not be empty", name);
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..=1.0).contains(&value),
        "{} must be within [0, 1], got {}",
        name,
        value
    );
    Ok(())
}

fn check_weights(name: &str, weights: &[f64]) -> Result<()> {
    for weight in weights {
        ensure!(
            weight.is_finite() && *weight >= 0.0,
            "{} must be non-negative, got {}",
            name,
            weight
        );
    }
    let sum: f64 = weights.iter().sum();
    ensure!(
        (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
        "{} must sum to 1, got {}",
        name,
        sum
    );
    Ok(())
}

fn read_config_file(path: &Path) -> Result<ScoringConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
