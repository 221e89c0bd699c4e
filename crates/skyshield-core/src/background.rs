use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{DEFAULT_CLIP_ITERATIONS, DEFAULT_CLIP_SIGMA, EPSILON};
use crate::error::{Result, SkyShieldError};
use crate::frame::{Frame, Mask};
use crate::stats::{percentile, sigma_clipped_stats};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Rejection threshold in robust sigmas.
    pub clip_sigma: f64,
    /// Maximum clipping iterations.
    pub clip_iterations: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            clip_sigma: DEFAULT_CLIP_SIGMA,
            clip_iterations: DEFAULT_CLIP_ITERATIONS,
        }
    }
}

/// Robust sky level of one frame, measured on its clean pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BackgroundEstimate {
    /// Sigma-clipped median of the clean pixels.
    pub level: f64,
    /// Robust sigma (1.4826 * MAD) of the clipped sample.
    pub noise: f64,
    /// Clean finite pixels before clipping.
    pub n_clean: usize,
    /// Pixels surviving the clip.
    pub n_retained: usize,
    /// Fraction of the frame covered by the mask.
    pub masked_fraction: f64,
}

/// Estimate the sky background of `frame` ignoring masked and non-finite
/// pixels.
pub fn estimate_background(frame: &Frame, mask: &Mask, config: &BackgroundConfig) -> Result<BackgroundEstimate> {
    mask.check_congruent(frame)?;

    let clean: Vec<f64> = frame
        .data
        .iter()
        .zip(mask.data.iter())
        .filter(|(v, &m)| !m && v.is_finite())
        .map(|(&v, _)| v as f64)
        .collect();

    let stats = sigma_clipped_stats(&clean, config.clip_sigma, config.clip_iterations)
        .ok_or_else(|| {
            SkyShieldError::InsufficientData(format!(
                "{}: no clean finite pixels for background",
                frame.metadata.name
            ))
        })?;

    debug!(
        frame = %frame.metadata.name,
        level = stats.median,
        noise = stats.sigma,
        retained = stats.retained,
        "Background estimated"
    );

    Ok(BackgroundEstimate {
        level: stats.median,
        noise: stats.sigma,
        n_clean: clean.len(),
        n_retained: stats.retained,
        masked_fraction: mask.fraction(),
    })
}

/// Night baseline: the `p`-th percentile of the retained levels.
pub fn baseline_reference(levels: &[f64], p: f64) -> Option<f64> {
    percentile(levels, p)
}

/// Fractional excess of each level over `reference`: `(level - ref) / ref`.
/// Returns `None` when the reference is not positive.
pub fn residuals(levels: &[f64], reference: f64) -> Option<Vec<f64>> {
    if reference.is_nan() || reference <= EPSILON {
        return None;
    }
    Some(levels.iter().map(|&l| (l - reference) / reference).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn masked_pixels_do_not_bias_level() {
        let mut data = Array2::from_elem((20, 20), 100.0f32);
        let mut mask = Array2::from_elem((20, 20), false);
        for c in 0..20 {
            data[[10, c]] = 5000.0;
            mask[[10, c]] = true;
        }
        let frame = Frame::new(data);
        let est = estimate_background(&frame, &Mask::new(mask), &BackgroundConfig::default()).unwrap();
        assert_eq!(est.level, 100.0);
        assert_eq!(est.n_clean, 380);
        assert!((est.masked_fraction - 0.05).abs() < 1e-12);
    }

    #[test]
    fn residuals_relative_to_reference() {
        let r = residuals(&[100.0, 110.0, 90.0], 100.0).unwrap();
        assert_eq!(r, vec![0.0, 0.1, -0.1]);
        assert!(residuals(&[1.0], 0.0).is_none());
    }
}
