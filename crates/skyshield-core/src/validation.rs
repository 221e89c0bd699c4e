//! Offline benchmarking of a predicted mask against ground truth.
//!
//! Ground truth comes either as a pixel mask or as YOLO bounding boxes. Note
//! that a streak mask is a thin line while its box covers the whole diagonal
//! rectangle, so pixel IoU against boxes is systematically low even for a
//! perfect detection; per-streak recall is the meaningful number there.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::DEFAULT_OVERLAP_THRESHOLD;
use crate::detection::components::label_components;
use crate::error::{Result, SkyShieldError};
use crate::frame::Mask;
use crate::stats::{mean_stddev, median};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum fraction of a predicted component inside a box to match it.
    pub overlap_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

/// A ground-truth box in pixel coordinates, half-open on the max side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GtBox {
    pub class_id: u32,
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl GtBox {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_min..self.row_max).contains(&row) && (self.col_min..self.col_max).contains(&col)
    }

    pub fn area(&self) -> usize {
        (self.row_max - self.row_min) * (self.col_max - self.col_min)
    }
}

/// Parse YOLO labels (`class x_center y_center width height`, normalised to
/// [0, 1]) into pixel boxes for an image of `shape` = (height, width).
///
/// Lines with fewer than five fields are skipped; unparsable numbers are an
/// error.
pub fn parse_yolo_labels(text: &str, shape: (usize, usize)) -> Result<Vec<GtBox>> {
    let (h, w) = shape;
    let mut boxes = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() || fields[0].starts_with('#') {
            continue;
        }
        if fields.len() < 5 {
            warn!(line = lineno + 1, "Skipping short YOLO label line");
            continue;
        }
        let bad = |what: &str| {
            SkyShieldError::InvalidInput(format!("YOLO label line {}: invalid {}", lineno + 1, what))
        };
        let class_id: u32 = fields[0].parse().map_err(|_| bad("class id"))?;
        let mut nums = [0.0f64; 4];
        for (slot, field) in nums.iter_mut().zip(&fields[1..5]) {
            *slot = field.parse().map_err(|_| bad("coordinate"))?;
        }
        let [xc, yc, bw, bh] = nums;

        let xc_px = (xc * w as f64) as isize;
        let yc_px = (yc * h as f64) as isize;
        let half_w = (bw * w as f64) as isize / 2;
        let half_h = (bh * h as f64) as isize / 2;

        let col_min = (xc_px - half_w).clamp(0, w as isize) as usize;
        let col_max = (xc_px + half_w).clamp(0, w as isize) as usize;
        let row_min = (yc_px - half_h).clamp(0, h as isize) as usize;
        let row_max = (yc_px + half_h).clamp(0, h as isize) as usize;
        if col_max <= col_min || row_max <= row_min {
            continue;
        }
        boxes.push(GtBox {
            class_id,
            row_min,
            row_max,
            col_min,
            col_max,
        });
    }
    Ok(boxes)
}

/// Read a YOLO label file. A missing file means "no streaks".
pub fn read_yolo_labels(path: &Path, shape: (usize, usize)) -> Result<Vec<GtBox>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    parse_yolo_labels(&text, shape)
}

/// Rasterise boxes into a mask.
pub fn boxes_to_mask(boxes: &[GtBox], shape: (usize, usize)) -> Mask {
    let mut data = Array2::from_elem(shape, false);
    for b in boxes {
        data.slice_mut(ndarray::s![b.row_min..b.row_max, b.col_min..b.col_max])
            .fill(true);
    }
    Mask::new(data)
}

/// Pixel-level comparison of one predicted mask with its ground truth.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameMetrics {
    pub iou: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
    /// Fraction of ground-truth boxes matched by a predicted component.
    pub streak_recall: Option<f64>,
    pub num_gt_streaks: usize,
    pub num_pred_streaks: usize,
}

/// Compare two masks pixel by pixel.
///
/// Two empty masks agree perfectly (IoU 1); precision and recall are 0
/// whenever their denominator is 0.
pub fn evaluate(predicted: &Mask, truth: &Mask) -> Result<FrameMetrics> {
    if predicted.shape() != truth.shape() {
        return Err(SkyShieldError::ShapeMismatch {
            frame: truth.shape(),
            mask: predicted.shape(),
        });
    }

    let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);
    for (&p, &t) in predicted.data.iter().zip(truth.data.iter()) {
        match (p, t) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }

    let union = tp + fp + fn_;
    let iou = if union == 0 { 1.0 } else { tp as f64 / union as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);

    Ok(FrameMetrics {
        iou,
        precision,
        recall,
        f1: f1(precision, recall),
        tp,
        fp,
        fn_,
        tn,
        streak_recall: None,
        num_gt_streaks: label_components(&truth.data).components.len(),
        num_pred_streaks: label_components(&predicted.data).components.len(),
    })
}

/// Evaluate against YOLO boxes: pixel metrics on the rasterised boxes plus
/// per-streak recall.
pub fn evaluate_against_boxes(predicted: &Mask, boxes: &[GtBox], config: &ValidationConfig) -> Result<FrameMetrics> {
    let truth = boxes_to_mask(boxes, predicted.shape());
    let mut metrics = evaluate(predicted, &truth)?;
    metrics.num_gt_streaks = boxes.len();
    metrics.streak_recall = streak_recall(predicted, boxes, config.overlap_threshold);
    Ok(metrics)
}

/// Fraction of boxes for which some predicted component lies at least
/// `overlap_threshold` inside the box. `None` when there are no boxes.
pub fn streak_recall(predicted: &Mask, boxes: &[GtBox], overlap_threshold: f64) -> Option<f64> {
    if boxes.is_empty() {
        return None;
    }
    let labeling = label_components(&predicted.data);
    let found = boxes
        .iter()
        .filter(|b| {
            let mut inside = vec![0usize; labeling.components.len()];
            for ((r, c), &lbl) in labeling.labels.indexed_iter() {
                if lbl > 0 && b.contains(r, c) {
                    inside[(lbl - 1) as usize] += 1;
                }
            }
            labeling
                .components
                .iter()
                .zip(&inside)
                .any(|(comp, &n)| n > 0 && n as f64 / comp.area as f64 >= overlap_threshold)
        })
        .count();
    Some(found as f64 / boxes.len() as f64)
}

/// Multi-frame benchmark summary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub num_frames: usize,
    pub mean_iou: f64,
    pub median_iou: f64,
    pub std_iou: f64,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_f1: f64,
    /// Micro-averaged over all pixels of all frames.
    pub global_precision: f64,
    pub global_recall: f64,
    pub global_f1: f64,
    pub total_tp: usize,
    pub total_fp: usize,
    pub total_fn: usize,
}

pub fn summarize(metrics: &[FrameMetrics]) -> Result<ValidationSummary> {
    if metrics.is_empty() {
        return Err(SkyShieldError::InsufficientData("no frames evaluated".into()));
    }
    let column = |f: fn(&FrameMetrics) -> f64| -> Vec<f64> { metrics.iter().map(f).collect() };
    let ious = column(|m| m.iou);
    let (mean_iou, std_iou) = mean_stddev(&ious);
    let mean_of = |f: fn(&FrameMetrics) -> f64| mean_stddev(&column(f)).0;

    let total_tp: usize = metrics.iter().map(|m| m.tp).sum();
    let total_fp: usize = metrics.iter().map(|m| m.fp).sum();
    let total_fn: usize = metrics.iter().map(|m| m.fn_).sum();
    let global_precision = ratio(total_tp, total_tp + total_fp);
    let global_recall = ratio(total_tp, total_tp + total_fn);

    Ok(ValidationSummary {
        num_frames: metrics.len(),
        mean_iou,
        median_iou: median(&ious).unwrap_or(0.0),
        std_iou,
        mean_precision: mean_of(|m| m.precision),
        mean_recall: mean_of(|m| m.recall),
        mean_f1: mean_of(|m| m.f1),
        global_precision,
        global_recall,
        global_f1: f1(global_precision, global_recall),
        total_tp,
        total_fp,
        total_fn,
    })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yolo_box_to_pixels() {
        let boxes = parse_yolo_labels("0 0.5 0.5 0.2 0.4\n\n0 0.1\n", (100, 200)).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_eq!((b.col_min, b.col_max), (80, 120));
        assert_eq!((b.row_min, b.row_max), (30, 70));
        assert_eq!(b.area(), 1600);
    }

    #[test]
    fn malformed_yolo_number_is_an_error() {
        assert!(parse_yolo_labels("0 0.5 abc 0.1 0.1", (10, 10)).is_err());
    }

    #[test]
    fn identical_masks_score_perfectly() {
        let mut data = Array2::from_elem((8, 8), false);
        data[[2, 2]] = true;
        data[[2, 3]] = true;
        let m = Mask::new(data);
        let metrics = evaluate(&m, &m).unwrap();
        assert_eq!(metrics.iou, 1.0);
        assert_eq!(metrics.f1, 1.0);
        assert_eq!(metrics.tp, 2);
    }
}
