#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;
use ndarray::Array2;

use skyshield_core::detection::{Detection, DetectorInfo, PercentileDetector, StreakDetector};
use skyshield_core::error::SkyShieldError;
use skyshield_core::frame::Mask;
use skyshield_core::night::{aggregate, NightConfig, NightSummary};
use skyshield_core::quality::{score_frame, FrameQuality, QualityConfig, QualityFlag};

use common::{inject_streak, named_frame, noise_frame, SKY_LEVEL, SKY_SIGMA};

fn test_info() -> DetectorInfo {
    DetectorInfo {
        name: "test".into(),
        version: "0".into(),
        params: serde_json::Value::Null,
    }
}

fn record(file: &str, area_fraction: f64, num_streaks: usize, severity: f64) -> FrameQuality {
    FrameQuality {
        file: file.into(),
        timestamp_utc: None,
        streak_area_fraction: area_fraction,
        num_streaks,
        severity_score: severity,
        severity_model: "severity-v1".into(),
        flags: Vec::new(),
        detector: test_info(),
        contrast: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Frame scoring
// ---------------------------------------------------------------------------

#[test]
fn test_area_fraction_is_exact() {
    let frame = named_frame(noise_frame(100, 100, SKY_LEVEL, SKY_SIGMA, 1), "a.fits");
    let mut mask = Array2::from_elem((100, 100), false);
    for c in 0..100 {
        mask[[50, c]] = true;
    }
    let detection = Detection {
        mask: Mask::new(mask),
        geometries: Vec::new(),
        detector: test_info(),
    };
    let quality = score_frame(&frame, &detection, &QualityConfig::default()).unwrap();
    assert_eq!(quality.streak_area_fraction, 0.01);
    assert_eq!(quality.num_streaks, 0);
    assert!(quality.flags.is_empty());
}

#[test]
fn test_clean_frame_scores_zero() {
    let frame = named_frame(noise_frame(128, 128, SKY_LEVEL, SKY_SIGMA, 2), "clean.fits");
    let detection = PercentileDetector::default().detect(&frame).unwrap();
    let quality = score_frame(&frame, &detection, &QualityConfig::default()).unwrap();
    assert_eq!(quality.num_streaks, 0);
    assert_eq!(quality.streak_area_fraction, 0.0);
    assert_eq!(quality.severity_score, 0.0);
    assert!(quality.flags.is_empty());
}

#[test]
fn test_streak_frame_is_flagged() {
    let mut data = noise_frame(256, 256, SKY_LEVEL, SKY_SIGMA, 3);
    inject_streak(&mut data, (20.0, 20.0), (230.0, 230.0), 1.5, 10.0 * SKY_SIGMA);
    let frame = named_frame(data, "streak.fits");
    let detection = PercentileDetector::default().detect(&frame).unwrap();
    let quality = score_frame(&frame, &detection, &QualityConfig::default()).unwrap();

    assert_eq!(quality.num_streaks, 1);
    assert!(quality.flags.contains(&QualityFlag::SatStreakDetected));
    assert!(quality.severity_score > 0.0 && quality.severity_score <= 1.0);
    assert!(quality.contrast > 2.0, "contrast {}", quality.contrast);
    assert_eq!(quality.detector.name, "percentile_geometric");
    assert_eq!(quality.severity_model, "severity-v1");
}

#[test]
fn test_high_contamination_flag() {
    let frame = named_frame(noise_frame(50, 50, SKY_LEVEL, SKY_SIGMA, 4), "big.fits");
    let mut mask = Array2::from_elem((50, 50), false);
    mask.slice_mut(ndarray::s![0..10, ..]).fill(true);
    let detection = Detection {
        mask: Mask::new(mask),
        geometries: Vec::new(),
        detector: test_info(),
    };
    let quality = score_frame(&frame, &detection, &QualityConfig::default()).unwrap();
    assert_relative_eq!(quality.streak_area_fraction, 0.2);
    assert_eq!(quality.flags, vec![QualityFlag::HighContamination]);
    assert_relative_eq!(quality.severity_score, 1.0);
}

#[test]
fn test_incongruent_mask_is_rejected() {
    let frame = named_frame(noise_frame(32, 32, SKY_LEVEL, SKY_SIGMA, 5), "x.fits");
    let detection = Detection {
        mask: Mask::empty((16, 32)),
        geometries: Vec::new(),
        detector: test_info(),
    };
    let err = score_frame(&frame, &detection, &QualityConfig::default()).unwrap_err();
    assert!(matches!(err, SkyShieldError::ShapeMismatch { .. }), "got {err:?}");
}

#[test]
fn test_quality_record_json_shape() {
    let mut q = record("f.fits", 0.5, 2, 0.9);
    q.flags = vec![QualityFlag::SatStreakDetected, QualityFlag::HighContamination];
    let json = serde_json::to_value(&q).unwrap();
    assert_eq!(json["file"], "f.fits");
    assert!(json["timestamp_utc"].is_null());
    assert_eq!(json["flags"][0], "SAT_STREAK_DETECTED");
    assert_eq!(json["flags"][1], "HIGH_CONTAMINATION");
    assert!(json.get("contrast").is_none());
    assert_eq!(json["detector"]["name"], "test");
    assert_eq!(json["severity_model"], "severity-v1");
}

// ---------------------------------------------------------------------------
// Night aggregation
// ---------------------------------------------------------------------------

#[test]
fn test_median_of_three_frames() {
    let records = vec![
        record("a", 0.0, 0, 0.0),
        record("b", 0.1, 1, 0.5),
        record("c", 0.2, 2, 0.95),
    ];
    let summary = aggregate(&records, "night", &NightConfig::default()).unwrap();
    assert_eq!(summary.n_frames, 3);
    assert_eq!(summary.affected_frames, 2);
    assert_relative_eq!(summary.median_streak_area_fraction.unwrap(), 0.1);
    assert_relative_eq!(summary.p95_streak_area_fraction.unwrap(), 0.19, epsilon = 1e-12);
    assert_eq!(summary.severity_histogram["0.0-0.2"], 1);
    assert_eq!(summary.severity_histogram["0.4-0.6"], 1);
    assert_eq!(summary.severity_histogram["0.8-1.0"], 1);
    assert_eq!(summary.severity_histogram.values().sum::<usize>(), 3);
}

#[test]
fn test_aggregation_is_order_independent() {
    let records: Vec<FrameQuality> = (0..20)
        .map(|i| record(&format!("f{i}"), (i * 7 % 11) as f64 / 100.0, i % 3, (i as f64) / 19.0))
        .collect();
    let mut reversed = records.clone();
    reversed.reverse();
    let mut rotated = records.clone();
    rotated.rotate_left(7);

    let cfg = NightConfig::default();
    let a = aggregate(&records, "n", &cfg).unwrap();
    assert_eq!(a, aggregate(&reversed, "n", &cfg).unwrap());
    assert_eq!(a, aggregate(&rotated, "n", &cfg).unwrap());
}

#[test]
fn test_empty_night_is_insufficient() {
    let err = aggregate(&[], "n", &NightConfig::default()).unwrap_err();
    assert!(matches!(err, SkyShieldError::InsufficientData(_)));

    let empty = NightSummary::insufficient("n", &NightConfig::default());
    assert_eq!(empty.n_frames, 0);
    assert!(empty.median_streak_area_fraction.is_none());
    assert_eq!(empty.severity_histogram.len(), 5);
}

#[test]
fn test_severity_one_lands_in_last_bin() {
    let summary = aggregate(&[record("a", 0.3, 1, 1.0)], "n", &NightConfig::default()).unwrap();
    assert_eq!(summary.severity_histogram["0.8-1.0"], 1);
}

#[test]
fn test_fine_histogram_keeps_every_frame() {
    let records: Vec<FrameQuality> = (0..200)
        .map(|i| record(&format!("f{i}"), 0.0, 0, (i as f64 + 0.5) / 200.0))
        .collect();
    let cfg = NightConfig { severity_bins: 200 };
    let summary = aggregate(&records, "n", &cfg).unwrap();
    assert_eq!(summary.severity_histogram.len(), 200);
    assert!(summary.severity_histogram.values().all(|&c| c == 1));
}
