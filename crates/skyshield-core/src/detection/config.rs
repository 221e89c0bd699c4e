use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_DETECTION_BLUR_SIGMA, DEFAULT_HOUGH_ANGLE_STEPS, DEFAULT_HOUGH_EDGE_SIGMA,
    DEFAULT_HOUGH_LINE_WIDTH, DEFAULT_HOUGH_MAX_LINES, DEFAULT_HOUGH_MIN_VOTES,
    DEFAULT_HOUGH_PEAK_FRACTION, DEFAULT_MIN_ASPECT_RATIO, DEFAULT_MIN_COMPONENT_AREA,
    DEFAULT_MIN_FRAME_PIXELS, DEFAULT_MIN_STREAK_LENGTH, DEFAULT_PERCENTILE,
};

/// Which streak detection strategy to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMethod {
    /// Percentile threshold + connected-component geometry.
    #[default]
    Percentile,
    /// Legacy edge map + Hough line transform. Lower precision, and known
    /// to fail on lossy-compressed imagery.
    Hough,
}

impl std::fmt::Display for DetectorMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percentile => write!(f, "Percentile"),
            Self::Hough => write!(f, "Hough (legacy)"),
        }
    }
}

/// Configuration for streak detection in a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Detection strategy.
    #[serde(default)]
    pub method: DetectorMethod,
    /// Frames with fewer pixels are rejected as invalid input.
    #[serde(default = "default_min_frame_pixels")]
    pub min_frame_pixels: usize,
    #[serde(default)]
    pub percentile: PercentileParams,
    #[serde(default)]
    pub hough: HoughParams,
}

fn default_min_frame_pixels() -> usize {
    DEFAULT_MIN_FRAME_PIXELS
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: DetectorMethod::default(),
            min_frame_pixels: DEFAULT_MIN_FRAME_PIXELS,
            percentile: PercentileParams::default(),
            hough: HoughParams::default(),
        }
    }
}

/// Parameters of the percentile/geometric detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentileParams {
    /// Intensity percentile used as the candidate threshold (typically 90-97).
    pub percentile: f64,
    /// Gaussian pre-smoothing sigma in pixels; 0 disables smoothing.
    pub blur_sigma: f32,
    /// Minimum major/minor axis ratio.
    pub min_aspect_ratio: f64,
    /// Minimum major axis length in pixels.
    pub min_length: f64,
    /// Minimum component area in pixels.
    pub min_area: usize,
}

impl Default for PercentileParams {
    fn default() -> Self {
        Self {
            percentile: DEFAULT_PERCENTILE,
            blur_sigma: DEFAULT_DETECTION_BLUR_SIGMA,
            min_aspect_ratio: DEFAULT_MIN_ASPECT_RATIO,
            min_length: DEFAULT_MIN_STREAK_LENGTH,
            min_area: DEFAULT_MIN_COMPONENT_AREA,
        }
    }
}

/// Parameters of the legacy Hough detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughParams {
    /// Edge threshold, in standard deviations above the mean gradient.
    pub edge_sigma: f64,
    /// Half-width in pixels of the band masked around each line.
    pub line_width: f64,
    /// Peaks below this fraction of the accumulator maximum are ignored.
    pub peak_fraction: f64,
    /// Number of angles sampled over [0, pi).
    pub angle_steps: usize,
    /// Maximum number of lines per frame.
    pub max_lines: usize,
    /// Minimum accumulator votes for a line.
    pub min_votes: usize,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            edge_sigma: DEFAULT_HOUGH_EDGE_SIGMA,
            line_width: DEFAULT_HOUGH_LINE_WIDTH,
            peak_fraction: DEFAULT_HOUGH_PEAK_FRACTION,
            angle_steps: DEFAULT_HOUGH_ANGLE_STEPS,
            max_lines: DEFAULT_HOUGH_MAX_LINES,
            min_votes: DEFAULT_HOUGH_MIN_VOTES,
        }
    }
}
