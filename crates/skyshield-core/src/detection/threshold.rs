use ndarray::Array2;

use crate::consts::EPSILON;
use crate::error::{Result, SkyShieldError};
use crate::frame::Frame;
use crate::stats::{mean_stddev, median, percentile};

/// A frame's pixels made safe for detection: non-finite values replaced by
/// the median of the finite ones.
pub(crate) struct PreparedFrame {
    pub data: Array2<f32>,
    /// True when every finite pixel has the same value.
    pub zero_variance: bool,
}

/// Validate a frame and replace non-finite pixels.
///
/// Fails with `InvalidInput` when the frame is smaller than `min_pixels` or
/// has no finite pixel at all.
pub(crate) fn prepare_frame(frame: &Frame, min_pixels: usize) -> Result<PreparedFrame> {
    let (h, w) = frame.data.dim();
    if h == 0 || w == 0 {
        return Err(SkyShieldError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    if h * w < min_pixels {
        return Err(SkyShieldError::InvalidInput(format!(
            "frame has {} pixels, at least {} required",
            h * w,
            min_pixels
        )));
    }

    let finite: Vec<f64> = finite_values(&frame.data);
    let fill = median(&finite).ok_or_else(|| {
        SkyShieldError::InvalidInput("frame contains no finite pixels".into())
    })? as f32;

    let (lo, hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let data = if finite.len() == h * w {
        frame.data.clone()
    } else {
        frame.data.mapv(|v| if v.is_finite() { v } else { fill })
    };

    Ok(PreparedFrame {
        data,
        zero_variance: hi - lo <= EPSILON,
    })
}

/// All finite pixel values widened to f64.
pub fn finite_values(data: &Array2<f32>) -> Vec<f64> {
    data.iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect()
}

/// The `p`-th percentile of the finite pixel intensities.
pub fn percentile_threshold(data: &Array2<f32>, p: f64) -> Option<f64> {
    percentile(&finite_values(data), p)
}

/// Mean + `k` standard deviations of the finite pixel intensities.
pub fn mean_plus_sigma(data: &Array2<f32>, k: f64) -> (f64, f64, f64) {
    let (mean, std) = mean_stddev(&finite_values(data));
    (mean + k * std, mean, std)
}
