#[allow(dead_code)]
mod common;

use ndarray::Array2;

use skyshield_core::detection::{
    build_detector, DetectorConfig, DetectorMethod, HoughDetector, HoughParams, PercentileDetector,
    StreakDetector,
};
use skyshield_core::error::SkyShieldError;
use skyshield_core::frame::Frame;

use common::{covered_fraction, inject_streak, named_frame, noise_frame, SKY_LEVEL, SKY_SIGMA};

#[test]
fn test_diagonal_streak_is_recovered() {
    let mut data = noise_frame(512, 512, SKY_LEVEL, SKY_SIGMA, 7);
    let truth = inject_streak(&mut data, (40.0, 40.0), (470.0, 470.0), 1.5, 10.0 * SKY_SIGMA);
    let frame = named_frame(data, "diag.fits");

    let detection = PercentileDetector::default().detect(&frame).unwrap();

    assert_eq!(detection.num_streaks(), 1);
    let covered = covered_fraction(&detection.mask, &truth);
    assert!(covered >= 0.9, "only {covered:.3} of the streak was masked");

    let g = &detection.geometries[0];
    assert!(g.aspect_ratio > 3.0, "aspect {}", g.aspect_ratio);
    assert!(g.major_axis > 400.0, "major {}", g.major_axis);
    // Rows and columns grow together: +45 degrees in (col, row) space.
    assert!((g.orientation.to_degrees() - 45.0).abs() < 5.0, "orientation {}", g.orientation);
}

#[test]
fn test_streak_in_zero_mean_noise_is_one_component() {
    for seed in 0..4 {
        let mut data = noise_frame(512, 512, 0.0, 1.0, seed);
        let truth = inject_streak(&mut data, (40.0, 40.0), (470.0, 470.0), 1.5, 10.0);
        let frame = named_frame(data, "zero_mean.fits");

        let detection = PercentileDetector::default().detect(&frame).unwrap();
        assert_eq!(detection.num_streaks(), 1, "seed {seed}");
        let covered = covered_fraction(&detection.mask, &truth);
        assert!(covered >= 0.9, "seed {seed}: covered {covered:.3}");
    }
}

#[test]
fn test_streak_on_flat_background_is_found() {
    let mut data = Array2::zeros((512, 512));
    let truth = inject_streak(&mut data, (40.0, 40.0), (470.0, 470.0), 1.5, 10.0);
    let frame = named_frame(data, "flat.fits");

    let detection = PercentileDetector::default().detect(&frame).unwrap();
    assert_eq!(detection.num_streaks(), 1);
    assert_eq!(covered_fraction(&detection.mask, &truth), 1.0);
    // The untouched background stays out of the mask.
    assert!(!detection.mask.data[[500, 10]]);
    assert!(!detection.mask.data[[10, 500]]);
}

#[test]
fn test_zero_padded_border_does_not_swallow_streak() {
    let mut data = Array2::zeros((300, 300));
    let inner = noise_frame(200, 200, SKY_LEVEL, SKY_SIGMA, 21);
    data.slice_mut(ndarray::s![50..250, 50..250]).assign(&inner);
    let truth = inject_streak(&mut data, (60.0, 60.0), (240.0, 240.0), 1.5, 10.0 * SKY_SIGMA);
    let frame = named_frame(data, "padded.fits");

    let detection = PercentileDetector::default().detect(&frame).unwrap();
    assert!(!detection.mask.data[[5, 5]]);
    assert!(covered_fraction(&detection.mask, &truth) >= 0.9);
}

#[test]
fn test_clean_frame_has_no_streaks() {
    let frame = named_frame(noise_frame(256, 256, SKY_LEVEL, SKY_SIGMA, 11), "clean.fits");
    let detection = PercentileDetector::default().detect(&frame).unwrap();
    assert_eq!(detection.num_streaks(), 0);
    assert!(detection.mask.is_empty());
}

#[test]
fn test_zero_variance_frame_gives_empty_mask() {
    let frame = Frame::new(Array2::from_elem((64, 64), 500.0));
    let detection = PercentileDetector::default().detect(&frame).unwrap();
    assert_eq!(detection.mask.shape(), (64, 64));
    assert!(detection.mask.is_empty());
    assert_eq!(detection.num_streaks(), 0);
}

#[test]
fn test_mask_is_congruent_with_frame() {
    let frame = named_frame(noise_frame(100, 180, SKY_LEVEL, SKY_SIGMA, 3), "rect.fits");
    for method in [DetectorMethod::Percentile, DetectorMethod::Hough] {
        let config = DetectorConfig {
            method,
            ..Default::default()
        };
        let detection = build_detector(&config).detect(&frame).unwrap();
        assert_eq!(detection.mask.shape(), (100, 180), "{method}");
    }
}

#[test]
fn test_non_finite_pixels_are_tolerated() {
    let mut data = noise_frame(128, 128, SKY_LEVEL, SKY_SIGMA, 5);
    data[[10, 10]] = f32::NAN;
    data[[20, 30]] = f32::INFINITY;
    let frame = named_frame(data, "nan.fits");
    let detection = PercentileDetector::default().detect(&frame).unwrap();
    assert_eq!(detection.mask.shape(), (128, 128));
}

#[test]
fn test_all_nan_frame_is_invalid() {
    let frame = Frame::new(Array2::from_elem((32, 32), f32::NAN));
    let err = PercentileDetector::default().detect(&frame).unwrap_err();
    assert!(matches!(err, SkyShieldError::InvalidInput(_)), "got {err:?}");
}

#[test]
fn test_empty_frame_is_invalid() {
    let frame = Frame::new(Array2::zeros((0, 0)));
    assert!(PercentileDetector::default().detect(&frame).is_err());
}

#[test]
fn test_tiny_frame_is_invalid() {
    let frame = Frame::new(Array2::from_elem((4, 4), 1.0));
    let err = PercentileDetector::default().detect(&frame).unwrap_err();
    assert!(matches!(err, SkyShieldError::InvalidInput(_)), "got {err:?}");
}

#[test]
fn test_detector_info_names_algorithm() {
    let config = DetectorConfig::default();
    let info = build_detector(&config).info();
    assert_eq!(info.name, "percentile_geometric");
    assert_eq!(info.params["percentile"], 95.0);

    let hough = HoughDetector::new(HoughParams::default(), 64).info();
    assert_eq!(hough.name, "hough_legacy");
}

#[test]
fn test_hough_finds_bright_line() {
    let mut data = noise_frame(256, 256, SKY_LEVEL, SKY_SIGMA, 13);
    let truth = inject_streak(&mut data, (128.0, 10.0), (128.0, 245.0), 1.0, 30.0 * SKY_SIGMA);
    let frame = named_frame(data, "hline.fits");

    let detection = HoughDetector::new(HoughParams::default(), 64).detect(&frame).unwrap();
    assert!(detection.num_streaks() >= 1);
    assert!(covered_fraction(&detection.mask, &truth) > 0.8);
}

#[test]
fn test_detection_is_deterministic() {
    let mut data = noise_frame(200, 200, SKY_LEVEL, SKY_SIGMA, 17);
    inject_streak(&mut data, (20.0, 180.0), (180.0, 20.0), 1.5, 8.0 * SKY_SIGMA);
    let frame = named_frame(data, "anti.fits");
    let detector = PercentileDetector::default();
    let a = detector.detect(&frame).unwrap();
    let b = detector.detect(&frame).unwrap();
    assert_eq!(a.mask, b.mask);
    assert_eq!(a.geometries, b.geometries);
}
