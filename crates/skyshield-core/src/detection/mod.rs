pub mod components;
pub mod config;
pub mod geometry;
pub mod hough;
pub mod percentile;
pub mod threshold;

use serde::Serialize;

use crate::error::Result;
use crate::frame::{Frame, Mask};

pub use config::{DetectorConfig, DetectorMethod, HoughParams, PercentileParams};
pub use geometry::StreakGeometry;
pub use hough::HoughDetector;
pub use percentile::PercentileDetector;

/// Identity of the detector that produced a mask, recorded in every quality
/// record so results can be traced back to an algorithm and its parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectorInfo {
    pub name: String,
    pub version: String,
    pub params: serde_json::Value,
}

/// Output of a detector for one frame.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Union of all retained streak pixels, congruent to the frame.
    pub mask: Mask,
    /// One entry per retained streak.
    pub geometries: Vec<StreakGeometry>,
    pub detector: DetectorInfo,
}

impl Detection {
    pub fn num_streaks(&self) -> usize {
        self.geometries.len()
    }
}

/// A strategy that turns a frame into a contamination mask.
///
/// Implementations must not mutate the frame and must return a mask with the
/// frame's shape.
pub trait StreakDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn info(&self) -> DetectorInfo;

    fn detect(&self, frame: &Frame) -> Result<Detection>;
}

/// Build the detector selected by `config.method`.
pub fn build_detector(config: &DetectorConfig) -> Box<dyn StreakDetector> {
    match config.method {
        DetectorMethod::Percentile => Box::new(PercentileDetector::new(
            config.percentile.clone(),
            config.min_frame_pixels,
        )),
        DetectorMethod::Hough => Box::new(HoughDetector::new(
            config.hough.clone(),
            config.min_frame_pixels,
        )),
    }
}
