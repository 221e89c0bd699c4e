use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_AREA_SATURATION, DEFAULT_CONTRAST_SCALE, DEFAULT_CONTRAST_WEIGHT,
    DEFAULT_HIGH_CONTAMINATION_FRACTION,
};

/// Coefficients of the `severity-v1` formula and flag thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Area fraction at which the area term reaches 1.
    pub area_saturation: f64,
    /// Contrast, in robust sigmas, that scales the exponential contrast term.
    pub contrast_scale: f64,
    /// Weight of the contrast term, in [0, 1].
    pub contrast_weight: f64,
    /// Area fraction above which `HIGH_CONTAMINATION` is raised.
    pub high_contamination_fraction: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            area_saturation: DEFAULT_AREA_SATURATION,
            contrast_scale: DEFAULT_CONTRAST_SCALE,
            contrast_weight: DEFAULT_CONTRAST_WEIGHT,
            high_contamination_fraction: DEFAULT_HIGH_CONTAMINATION_FRACTION,
        }
    }
}
