use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;

use scene_compare::fixture::{FixtureFrame, SYNTHETIC_REFERENCE, SYNTHETIC_SUBMISSION};
use scene_compare::suggest::{LIGHTING_SUGGESTION, RERECORD_ACTION, REVIEW_TEMPLATE_ACTION};
use scene_compare::{
    Collaborators, DurationProbe, Fixture, FrameCrop, FrameExtractor, FrameHandle,
    HistogramComparer, HsvHistogramComparer, Labeler, MessageCatalog, OverlayShape,
    ReferenceScene, SceneComparator, SceneComparisonResult, ScoringConfig, ShapeDetector,
    Suggestions,
};

const REF: &str = "ref.mp4";
const SUB: &str = "sub.mp4";

fn scene(start: u64, end: u64) -> ReferenceScene {
    ReferenceScene {
        scene_number: 1,
        title: "pour the coffee".to_string(),
        start_time_ms: Some(start),
        end_time_ms: Some(end),
    }
}

fn inline_config() -> ScoringConfig {
    ScoringConfig {
        sample_timeout: None,
        ..ScoringConfig::default()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Same frame contents on both videos at 0, 1000 and 2000 ms.
fn mirrored(frame: FixtureFrame) -> Fixture {
    let mut fixture = Fixture::new().with_duration(SUB, 3000);
    for ms in [0, 1000, 2000] {
        fixture = fixture
            .with_frame(REF, ms, frame.clone())
            .with_frame(SUB, ms, frame.clone());
    }
    fixture
}

fn assert_in_unit_range(result: &SceneComparisonResult) {
    for value in [
        result.similarity_score,
        result.geometry_mean,
        result.visual_mean,
        result.label_mean,
    ] {
        assert!((0.0..=1.0).contains(&value), "{:?}", result);
    }
    for metric in &result.per_second_metrics {
        metric.validate().unwrap();
    }
}

#[test]
fn identical_scene_scores_at_the_cap() -> Result<()> {
    let shape = OverlayShape::boxed(0.0, 0.0, 0.5, 0.5, "cup", 0.9).with_localized("cup");
    let fixture = mirrored(FixtureFrame::new(vec![shape]).with_color([180, 90, 30]));
    let collaborators = fixture
        .into_collaborators()
        .with_histogram(Arc::new(HsvHistogramComparer::new()));
    let comparator = SceneComparator::new(ScoringConfig::default(), collaborators)?;

    let result = comparator.compare_scene(&scene(0, 3000), SUB, REF);
    assert_eq!(result.per_second_metrics.len(), 3);
    for metric in &result.per_second_metrics {
        assert!(close(metric.geometry_score, 1.0), "{:?}", metric);
        assert!(close(metric.visual_score, 1.0), "{:?}", metric);
        assert_eq!(metric.label_score, 1.0);
        assert!(close(metric.combined_score, 0.95), "{:?}", metric);
    }
    assert!(close(result.similarity_score, 0.95 * 0.9));
    assert_in_unit_range(&result);
    Ok(())
}

#[test]
fn shapeless_frames_use_signal_fallbacks() -> Result<()> {
    let comparator = SceneComparator::new(
        inline_config(),
        mirrored(FixtureFrame::default()).into_collaborators(),
    )?;

    let result = comparator.compare_scene(&scene(0, 3000), SUB, REF);
    assert_eq!(result.per_second_metrics.len(), 3);
    for metric in &result.per_second_metrics {
        assert_eq!(metric.geometry_score, 0.3);
        assert_eq!(metric.label_score, 0.5);
        // Same timestamps on both sides, so the visual heuristic gives 1.0.
        assert_eq!(metric.visual_score, 1.0);
        assert!(close(metric.combined_score, 0.5 * 0.21 + 0.35 * 1.0 + 0.15 * 0.5));
    }
    Ok(())
}

#[test]
fn no_successful_samples_gives_neutral_scene() -> Result<()> {
    let fixture = Fixture::new().with_duration(SUB, 5000);
    let comparator = SceneComparator::new(inline_config(), fixture.into_collaborators())?;

    let result = comparator.compare_scene(&scene(0, 5000), SUB, REF);
    assert!(result.per_second_metrics.is_empty());
    assert_eq!(result.similarity_score, 0.5);
    assert_eq!(result.geometry_mean, 0.5);
    assert_eq!(result.visual_mean, 0.5);
    assert_eq!(result.label_mean, 0.5);
    assert_eq!(result.suggestions, vec![LIGHTING_SUGGESTION]);
    assert_eq!(
        result.next_actions,
        vec![RERECORD_ACTION, REVIEW_TEMPLATE_ACTION]
    );
    Ok(())
}

fn synthetic_run(
    collaborators: Collaborators,
    config: ScoringConfig,
) -> Result<SceneComparisonResult> {
    let comparator = SceneComparator::new(config, collaborators)?;
    let reference = scene(0, 5000);
    Ok(comparator.compare_scene(&reference, SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE))
}

struct PanickingDetector;

impl ShapeDetector for PanickingDetector {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn detect_shapes(&self, _frame: &FrameHandle) -> Result<Vec<OverlayShape>> {
        panic!("detector crashed")
    }
}

struct FailingDetector;

impl ShapeDetector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect_shapes(&self, _frame: &FrameHandle) -> Result<Vec<OverlayShape>> {
        bail!("model weights not loaded")
    }
}

fn with_detector(detector: Arc<dyn ShapeDetector>) -> Collaborators {
    let mut collaborators = Fixture::synthetic().into_collaborators();
    collaborators.shape_detector = detector;
    collaborators
}

fn assert_detection_fallbacks(result: &SceneComparisonResult) {
    assert_eq!(result.per_second_metrics.len(), 3, "{:?}", result);
    for metric in &result.per_second_metrics {
        assert_eq!(metric.geometry_score, 0.3);
        assert_eq!(metric.label_score, 0.5);
        // Matching timestamps and no comparer: the visual heuristic gives 1.0.
        assert_eq!(metric.visual_score, 1.0);
    }
    assert_ne!(result.similarity_score, 0.75);
}

#[test]
fn detector_panic_costs_only_geometry_and_label() -> Result<()> {
    let result = synthetic_run(with_detector(Arc::new(PanickingDetector)), inline_config())?;
    assert_detection_fallbacks(&result);
    Ok(())
}

#[test]
fn detector_panic_on_sample_worker_is_contained() -> Result<()> {
    let result = synthetic_run(
        with_detector(Arc::new(PanickingDetector)),
        ScoringConfig::default(),
    )?;
    assert_detection_fallbacks(&result);
    Ok(())
}

#[test]
fn detector_error_costs_only_geometry_and_label() -> Result<()> {
    let result = synthetic_run(with_detector(Arc::new(FailingDetector)), inline_config())?;
    assert_detection_fallbacks(&result);
    Ok(())
}

struct BrokenLabeler {
    panics: bool,
}

impl Labeler for BrokenLabeler {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn label_crop(&self, _crop: &FrameCrop<'_>) -> Result<String> {
        if self.panics {
            panic!("labeling service dropped the connection");
        }
        bail!("labeling service returned 503")
    }
}

#[test]
fn labeler_failures_cost_only_the_label() -> Result<()> {
    let baseline = synthetic_run(Fixture::synthetic().into_collaborators(), inline_config())?;
    assert_eq!(baseline.per_second_metrics.len(), 3);

    for panics in [true, false] {
        let mut collaborators = Fixture::synthetic().into_collaborators();
        collaborators.labeler = Arc::new(BrokenLabeler { panics });
        let result = synthetic_run(collaborators, inline_config())?;

        assert_eq!(result.per_second_metrics.len(), 3);
        let pairs = result
            .per_second_metrics
            .iter()
            .zip(&baseline.per_second_metrics);
        for (metric, expected) in pairs {
            assert_eq!(metric.label_score, 0.5);
            assert_eq!(metric.geometry_score, expected.geometry_score);
            assert_eq!(metric.visual_score, expected.visual_score);
        }
    }
    Ok(())
}

struct BrokenHistogram {
    panics: bool,
}

impl HistogramComparer for BrokenHistogram {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn similarity(&self, _a: &FrameHandle, _b: &FrameHandle) -> Result<f64> {
        if self.panics {
            panic!("histogram buffer overrun");
        }
        bail!("frames have no pixels")
    }
}

#[test]
fn histogram_failures_use_the_timestamp_heuristic() -> Result<()> {
    let baseline = synthetic_run(Fixture::synthetic().into_collaborators(), inline_config())?;

    for panics in [true, false] {
        let collaborators = Fixture::synthetic()
            .into_collaborators()
            .with_histogram(Arc::new(BrokenHistogram { panics }));
        let result = synthetic_run(collaborators, inline_config())?;

        assert_eq!(result.per_second_metrics.len(), 3);
        let pairs = result
            .per_second_metrics
            .iter()
            .zip(&baseline.per_second_metrics);
        for (metric, expected) in pairs {
            assert_eq!(metric.visual_score, 1.0);
            assert_eq!(metric.geometry_score, expected.geometry_score);
            assert_eq!(metric.label_score, expected.label_score);
        }
    }
    Ok(())
}

struct PanickingDuration;

impl DurationProbe for PanickingDuration {
    fn duration_ms(&self, _video_url: &str) -> Result<u64> {
        panic!("container index unreadable")
    }
}

#[test]
fn panic_outside_the_scorers_returns_fallback() -> Result<()> {
    let mut collaborators = Fixture::synthetic().into_collaborators();
    collaborators.duration_probe = Arc::new(PanickingDuration);
    let result = synthetic_run(collaborators, inline_config())?;
    assert_eq!(result, SceneComparisonResult::fallback());
    assert_eq!(result.similarity_score, 0.75);
    assert_eq!(result.suggestions.len(), 2);
    Ok(())
}

#[test]
fn fallback_uses_configured_message_text() -> Result<()> {
    let mut collaborators = Fixture::synthetic().into_collaborators();
    collaborators.duration_probe = Arc::new(PanickingDuration);
    let config = ScoringConfig {
        messages: MessageCatalog {
            fallback_suggestions: vec!["无法进行AI分析".to_string()],
            fallback_next_actions: vec!["请重新上传视频".to_string()],
            ..MessageCatalog::default()
        },
        ..inline_config()
    };
    let result = synthetic_run(collaborators, config)?;
    assert_eq!(result.similarity_score, 0.75);
    assert_eq!(result.suggestions, vec!["无法进行AI分析"]);
    assert_eq!(result.next_actions, vec!["请重新上传视频"]);
    Ok(())
}

struct PanickingExtractor {
    inner: Fixture,
}

impl FrameExtractor for PanickingExtractor {
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle> {
        if timestamp_ms == 2000 {
            panic!("decoder state corrupted");
        }
        self.inner.extract_frame(video_url, timestamp_ms)
    }
}

#[test]
fn extractor_panic_skips_only_its_sample() -> Result<()> {
    let mut collaborators = Fixture::synthetic().into_collaborators();
    collaborators.frame_extractor = Arc::new(PanickingExtractor {
        inner: Fixture::synthetic(),
    });
    let result = synthetic_run(collaborators, inline_config())?;
    let seconds: Vec<u32> = result.per_second_metrics.iter().map(|m| m.second).collect();
    assert_eq!(seconds, vec![0, 1]);
    Ok(())
}

struct SlowExtractor {
    inner: Fixture,
    slow_at_ms: u64,
}

impl FrameExtractor for SlowExtractor {
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle> {
        if video_url == SYNTHETIC_SUBMISSION && timestamp_ms == self.slow_at_ms {
            std::thread::sleep(Duration::from_millis(2000));
        }
        self.inner.extract_frame(video_url, timestamp_ms)
    }
}

#[test]
fn slow_sample_is_skipped_after_timeout() -> Result<()> {
    let mut collaborators = Fixture::synthetic().into_collaborators();
    collaborators.frame_extractor = Arc::new(SlowExtractor {
        inner: Fixture::synthetic(),
        slow_at_ms: 1000,
    });
    let config = ScoringConfig {
        sample_timeout: Some(Duration::from_millis(500)),
        ..ScoringConfig::default()
    };
    let comparator = SceneComparator::new(config, collaborators)?;

    let result =
        comparator.compare_scene(&scene(0, 6000), SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    let seconds: Vec<u32> = result.per_second_metrics.iter().map(|m| m.second).collect();
    assert_eq!(seconds, vec![0, 2]);
    Ok(())
}

struct MissingFrames {
    inner: Fixture,
}

impl FrameExtractor for MissingFrames {
    fn extract_frame(&self, video_url: &str, timestamp_ms: u64) -> Result<FrameHandle> {
        if timestamp_ms == 0 {
            bail!("decoder could not seek to {}ms", timestamp_ms);
        }
        self.inner.extract_frame(video_url, timestamp_ms)
    }
}

#[test]
fn lost_frames_skip_only_their_sample() -> Result<()> {
    let mut collaborators = Fixture::synthetic().into_collaborators();
    collaborators.frame_extractor = Arc::new(MissingFrames {
        inner: Fixture::synthetic(),
    });
    let comparator = SceneComparator::new(inline_config(), collaborators)?;

    let result =
        comparator.compare_scene(&scene(0, 6000), SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    let seconds: Vec<u32> = result.per_second_metrics.iter().map(|m| m.second).collect();
    assert_eq!(seconds, vec![1, 2]);
    Ok(())
}

#[test]
fn overall_is_scaled_mean_of_combined() -> Result<()> {
    let comparator =
        SceneComparator::new(inline_config(), Fixture::synthetic().into_collaborators())?;
    let result =
        comparator.compare_scene(&scene(1000, 7000), SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);

    let metrics = &result.per_second_metrics;
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0].t_ref_ms, 1000);
    assert_eq!(metrics[0].t_sub_ms, 0);
    let mean = metrics.iter().map(|m| m.combined_score).sum::<f64>() / metrics.len() as f64;
    assert!(close(result.similarity_score, mean * 0.9));
    assert_in_unit_range(&result);
    Ok(())
}

#[test]
fn unknown_submission_duration_uses_default() -> Result<()> {
    let mut fixture = Fixture::synthetic();
    fixture.durations.clear();
    let comparator = SceneComparator::new(inline_config(), fixture.into_collaborators())?;
    let result =
        comparator.compare_scene(&scene(0, 8000), SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    assert_eq!(result.per_second_metrics.len(), 3);
    Ok(())
}

#[test]
fn generated_suggestions_are_passed_through() -> Result<()> {
    let fixture = Fixture::synthetic().with_suggestions(Suggestions {
        suggestions: vec!["Keep the mug centered".to_string()],
        next_actions: vec!["Submit".to_string()],
    });
    let comparator = SceneComparator::new(inline_config(), fixture.into_collaborators())?;
    let result =
        comparator.compare_scene(&scene(0, 5000), SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    assert_eq!(result.suggestions, vec!["Keep the mug centered"]);
    assert_eq!(result.next_actions, vec!["Submit"]);
    Ok(())
}

#[test]
fn repeated_comparisons_are_identical() -> Result<()> {
    let collaborators = Fixture::synthetic()
        .into_collaborators()
        .with_histogram(Arc::new(HsvHistogramComparer::new()));
    let comparator = SceneComparator::new(ScoringConfig::default(), collaborators)?;
    let reference = scene(0, 5000);

    let first = comparator.compare_scene(&reference, SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    let second = comparator.compare_scene(&reference, SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    assert_eq!(first, second);
    assert_in_unit_range(&first);
    Ok(())
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = ScoringConfig::default();
    config.weights.geometry = 0.9;
    let err = SceneComparator::new(config, Fixture::synthetic().into_collaborators()).err();
    assert!(err.is_some());
}

#[test]
fn scene_at_the_end_of_time_does_not_overflow() -> Result<()> {
    let comparator =
        SceneComparator::new(inline_config(), Fixture::synthetic().into_collaborators())?;
    let late = ReferenceScene {
        scene_number: 9,
        title: String::new(),
        start_time_ms: Some(u64::MAX - 500),
        end_time_ms: None,
    };
    let result = comparator.compare_scene(&late, SYNTHETIC_SUBMISSION, SYNTHETIC_REFERENCE);
    // No reference frames exist that late, so every sample is skipped.
    assert!(result.per_second_metrics.is_empty());
    assert_eq!(result.similarity_score, 0.5);
    Ok(())
}

#[test]
fn canned_text_follows_configured_messages() -> Result<()> {
    let config = ScoringConfig {
        messages: MessageCatalog {
            lighting: "请改善光线".to_string(),
            rerecord: "重新录制".to_string(),
            review_template: "查看模板示例".to_string(),
            ..MessageCatalog::default()
        },
        ..inline_config()
    };
    let fixture = Fixture::new().with_duration(SUB, 5000);
    let comparator = SceneComparator::new(config, fixture.into_collaborators())?;

    let result = comparator.compare_scene(&scene(0, 5000), SUB, REF);
    assert_eq!(result.suggestions, vec!["请改善光线"]);
    assert_eq!(result.next_actions, vec!["重新录制", "查看模板示例"]);
    Ok(())
}
