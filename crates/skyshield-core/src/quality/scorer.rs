use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::consts::{EPSILON, SEVERITY_MODEL_VERSION};
use crate::detection::{Detection, DetectorInfo};
use crate::error::Result;
use crate::frame::{Frame, Mask};
use crate::stats::{median_in_place, robust_sigma};

use super::config::QualityConfig;
use super::flags::QualityFlag;

/// Per-frame contamination record, serialised as `<stem>_quality.json`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameQuality {
    pub file: String,
    pub timestamp_utc: Option<DateTime<Utc>>,
    pub streak_area_fraction: f64,
    pub num_streaks: usize,
    pub severity_score: f64,
    /// Identifier of the formula behind `severity_score`.
    pub severity_model: String,
    pub flags: Vec<QualityFlag>,
    pub detector: DetectorInfo,
    /// Mean masked intensity above the clean background, in robust sigmas.
    #[serde(skip)]
    pub contrast: f64,
}

/// Score a frame against the mask and streaks its detector produced.
///
/// Fails only when the mask is not congruent with the frame.
pub fn score_frame(frame: &Frame, detection: &Detection, config: &QualityConfig) -> Result<FrameQuality> {
    detection.mask.check_congruent(frame)?;

    let area_fraction = detection.mask.fraction();
    let num_streaks = detection.num_streaks();
    let contrast = streak_contrast(frame, &detection.mask);

    let mut flags = Vec::new();
    if num_streaks > 0 {
        flags.push(QualityFlag::SatStreakDetected);
    }
    if area_fraction > config.high_contamination_fraction {
        flags.push(QualityFlag::HighContamination);
    }
    flags.sort_unstable();
    flags.dedup();

    Ok(FrameQuality {
        file: frame.metadata.name.clone(),
        timestamp_utc: frame.metadata.timestamp,
        streak_area_fraction: area_fraction,
        num_streaks,
        severity_score: severity(area_fraction, contrast, config),
        severity_model: SEVERITY_MODEL_VERSION.to_string(),
        flags,
        detector: detection.detector.clone(),
        contrast,
    })
}

/// `(mean(masked) - median(unmasked)) / robust_sigma(unmasked)` over finite
/// pixels. Zero when either side is empty or the clean sigma vanishes.
pub fn streak_contrast(frame: &Frame, mask: &Mask) -> f64 {
    let mut masked_sum = 0.0;
    let mut masked_n = 0usize;
    let mut clean: Vec<f64> = Vec::with_capacity(frame.pixel_count());

    for (&v, &m) in frame.data.iter().zip(mask.data.iter()) {
        if !v.is_finite() {
            continue;
        }
        if m {
            masked_sum += v as f64;
            masked_n += 1;
        } else {
            clean.push(v as f64);
        }
    }

    if masked_n == 0 {
        return 0.0;
    }
    let Some(center) = median_in_place(&mut clean) else {
        return 0.0;
    };
    let sigma = robust_sigma(&clean, center);
    if sigma < EPSILON {
        return 0.0;
    }
    (masked_sum / masked_n as f64 - center) / sigma
}

/// The `severity-v1` formula.
///
/// `area_term = min(af / area_saturation, 1)`,
/// `contrast_term = 1 - exp(-max(contrast, 0) / contrast_scale)`,
/// `severity = 1 - (1 - area_term) * (1 - contrast_weight * contrast_term)`,
/// clipped to [0, 1]. An empty mask always scores 0.
pub fn severity(area_fraction: f64, contrast: f64, config: &QualityConfig) -> f64 {
    if area_fraction <= 0.0 {
        return 0.0;
    }
    let area_term = if config.area_saturation > EPSILON {
        (area_fraction / config.area_saturation).min(1.0)
    } else {
        1.0
    };
    let contrast_term = if config.contrast_scale > EPSILON {
        1.0 - (-contrast.max(0.0) / config.contrast_scale).exp()
    } else {
        0.0
    };
    let weight = config.contrast_weight.clamp(0.0, 1.0);
    (1.0 - (1.0 - area_term) * (1.0 - weight * contrast_term)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_zero_for_empty_mask() {
        assert_eq!(severity(0.0, 50.0, &QualityConfig::default()), 0.0);
    }

    #[test]
    fn severity_saturates_with_area() {
        let cfg = QualityConfig::default();
        assert!((severity(0.2, 0.0, &cfg) - 1.0).abs() < 1e-12);
        assert!((severity(0.05, 0.0, &cfg) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn contrast_raises_severity_monotonically() {
        let cfg = QualityConfig::default();
        let low = severity(0.01, 1.0, &cfg);
        let high = severity(0.01, 30.0, &cfg);
        assert!(high > low);
        assert!(high <= 1.0);
    }
}
