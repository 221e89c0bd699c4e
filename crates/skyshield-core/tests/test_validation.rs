#[allow(dead_code)]
mod common;

use approx::assert_relative_eq;
use ndarray::Array2;
use tempfile::TempDir;

use skyshield_core::detection::{PercentileDetector, StreakDetector};
use skyshield_core::frame::Mask;
use skyshield_core::validation::{
    boxes_to_mask, evaluate, evaluate_against_boxes, parse_yolo_labels, read_yolo_labels,
    streak_recall, summarize, ValidationConfig,
};

use common::{inject_streak, named_frame, noise_frame, SKY_LEVEL, SKY_SIGMA};

fn band(shape: (usize, usize), rows: std::ops::Range<usize>) -> Mask {
    let mut data = Array2::from_elem(shape, false);
    data.slice_mut(ndarray::s![rows, ..]).fill(true);
    Mask::new(data)
}

#[test]
fn test_partial_overlap_metrics() {
    let truth = band((10, 10), 2..6);
    let pred = band((10, 10), 4..8);
    let m = evaluate(&pred, &truth).unwrap();
    assert_eq!((m.tp, m.fp, m.fn_, m.tn), (20, 20, 20, 40));
    assert_relative_eq!(m.iou, 20.0 / 60.0);
    assert_relative_eq!(m.precision, 0.5);
    assert_relative_eq!(m.recall, 0.5);
    assert_relative_eq!(m.f1, 0.5);
    assert_eq!(m.num_gt_streaks, 1);
    assert_eq!(m.num_pred_streaks, 1);
}

#[test]
fn test_two_empty_masks_agree() {
    let empty = Mask::empty((5, 5));
    let m = evaluate(&empty, &empty).unwrap();
    assert_eq!(m.iou, 1.0);
    assert_eq!(m.precision, 0.0);
    assert_eq!(m.recall, 0.0);
    assert_eq!(m.tn, 25);
}

#[test]
fn test_shape_mismatch_is_an_error() {
    assert!(evaluate(&Mask::empty((4, 4)), &Mask::empty((4, 5))).is_err());
}

#[test]
fn test_thin_streak_scores_low_iou_against_its_box() {
    let mut data = noise_frame(200, 200, SKY_LEVEL, SKY_SIGMA, 31);
    inject_streak(&mut data, (20.0, 20.0), (180.0, 180.0), 1.5, 10.0 * SKY_SIGMA);
    let frame = named_frame(data, "thin.fits");
    let detection = PercentileDetector::default().detect(&frame).unwrap();

    let boxes = parse_yolo_labels("0 0.5 0.5 0.84 0.84\n", (200, 200)).unwrap();
    let m = evaluate_against_boxes(&detection.mask, &boxes, &ValidationConfig::default()).unwrap();

    // A diagonal line fills a small part of its bounding rectangle.
    assert!(m.iou < 0.2, "iou {}", m.iou);
    assert!(m.precision > 0.9, "precision {}", m.precision);
    assert_eq!(m.streak_recall, Some(1.0));
    assert_eq!(m.num_gt_streaks, 1);
}

#[test]
fn test_streak_recall_counts_missed_boxes() {
    let pred = band((100, 100), 10..12);
    let boxes = parse_yolo_labels("0 0.5 0.11 1.0 0.06\n0 0.5 0.8 1.0 0.1\n", (100, 100)).unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(streak_recall(&pred, &boxes, 0.5), Some(0.5));
    assert_eq!(streak_recall(&pred, &[], 0.5), None);
}

#[test]
fn test_missing_label_file_means_no_streaks() {
    let dir = TempDir::new().unwrap();
    let boxes = read_yolo_labels(&dir.path().join("absent.txt"), (10, 10)).unwrap();
    assert!(boxes.is_empty());
    assert!(boxes_to_mask(&boxes, (10, 10)).is_empty());
}

#[test]
fn test_summary_micro_and_macro_averages() {
    let truth = band((10, 10), 0..5);
    let perfect = evaluate(&truth, &truth).unwrap();
    let half = evaluate(&band((10, 10), 0..10), &truth).unwrap();

    let s = summarize(&[perfect, half]).unwrap();
    assert_eq!(s.num_frames, 2);
    assert_relative_eq!(s.mean_iou, 0.75);
    assert_relative_eq!(s.median_iou, 0.75);
    assert_eq!((s.total_tp, s.total_fp, s.total_fn), (100, 50, 0));
    assert_relative_eq!(s.global_precision, 100.0 / 150.0);
    assert_relative_eq!(s.global_recall, 1.0);

    assert!(summarize(&[]).is_err());
}

#[test]
fn test_metrics_json_uses_fn_key() {
    let m = evaluate(&band((4, 4), 0..1), &band((4, 4), 1..2)).unwrap();
    let json = serde_json::to_value(&m).unwrap();
    assert_eq!(json["fn"], 4);
    assert!(json.get("fn_").is_none());
}
