use tracing::debug;

use crate::consts::SKYSHIELD_VERSION;
use crate::error::{Result, SkyShieldError};
use crate::filters::gaussian_blur_array;
use crate::frame::{Frame, Mask};

use super::components::label_components;
use super::config::PercentileParams;
use super::geometry::StreakGeometry;
use super::threshold::{percentile_threshold, prepare_frame};
use super::{Detection, DetectorInfo, StreakDetector};

/// Adaptive detector: threshold at an intensity percentile, label connected
/// components, keep the long thin ones.
#[derive(Clone, Debug)]
pub struct PercentileDetector {
    params: PercentileParams,
    min_frame_pixels: usize,
}

impl PercentileDetector {
    pub fn new(params: PercentileParams, min_frame_pixels: usize) -> Self {
        Self {
            params,
            min_frame_pixels,
        }
    }

    fn accepts(&self, g: &StreakGeometry) -> bool {
        g.pixel_count >= self.params.min_area
            && g.aspect_ratio >= self.params.min_aspect_ratio
            && g.major_axis >= self.params.min_length
    }
}

impl Default for PercentileDetector {
    fn default() -> Self {
        Self::new(
            PercentileParams::default(),
            crate::consts::DEFAULT_MIN_FRAME_PIXELS,
        )
    }
}

impl StreakDetector for PercentileDetector {
    fn name(&self) -> &'static str {
        "percentile_geometric"
    }

    fn info(&self) -> DetectorInfo {
        DetectorInfo {
            name: self.name().to_string(),
            version: SKYSHIELD_VERSION.to_string(),
            params: serde_json::to_value(&self.params).unwrap_or(serde_json::Value::Null),
        }
    }

    fn detect(&self, frame: &Frame) -> Result<Detection> {
        let prepared = prepare_frame(frame, self.min_frame_pixels)?;
        let shape = prepared.data.dim();

        if prepared.zero_variance {
            debug!(frame = %frame.metadata.name, "Zero-variance frame, no candidates");
            return Ok(Detection {
                mask: Mask::empty(shape),
                geometries: Vec::new(),
                detector: self.info(),
            });
        }

        let smoothed = gaussian_blur_array(&prepared.data, self.params.blur_sigma);
        let threshold = percentile_threshold(&smoothed, self.params.percentile).ok_or_else(|| {
            SkyShieldError::InvalidInput("no finite pixels after smoothing".into())
        })?;

        // A threshold tied with the frame floor would make every background
        // pixel a candidate.
        let floor = smoothed
            .iter()
            .filter(|v| v.is_finite())
            .fold(f64::INFINITY, |m, &v| m.min(v as f64));
        let candidates = if threshold <= floor {
            smoothed.mapv(|v| v as f64 > threshold)
        } else {
            smoothed.mapv(|v| v as f64 >= threshold)
        };
        let labeling = label_components(&candidates);

        let geometries: Vec<StreakGeometry> = labeling
            .components
            .iter()
            .map(StreakGeometry::from_component)
            .collect();
        let retained: Vec<bool> = geometries.iter().map(|g| self.accepts(g)).collect();

        let mask = labeling.select(|c| retained[(c.label - 1) as usize]);
        let streaks: Vec<StreakGeometry> = geometries
            .into_iter()
            .zip(&retained)
            .filter(|(_, &keep)| keep)
            .map(|(g, _)| g)
            .collect();

        debug!(
            frame = %frame.metadata.name,
            threshold,
            candidates = labeling.components.len(),
            streaks = streaks.len(),
            "Percentile detection complete"
        );

        Ok(Detection {
            mask: Mask::new(mask),
            geometries: streaks,
            detector: self.info(),
        })
    }
}
