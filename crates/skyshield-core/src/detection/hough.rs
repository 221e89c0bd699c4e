//! Legacy line-transform detector.
//!
//! Sobel edges are voted into a (rho, theta) Hough accumulator and the
//! strongest peaks become fixed-width line bands. Kept for comparison with
//! the percentile detector: it is less precise (bands cross the whole frame,
//! not just the streak) and breaks down on block artefacts of lossy
//! compression, which produce spurious straight edges.

use std::f64::consts::PI;

use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use crate::consts::{HOUGH_SUPPRESSION_RHO, HOUGH_SUPPRESSION_THETA, SKYSHIELD_VERSION};
use crate::error::Result;
use crate::filters::gradient_magnitude_array;
use crate::frame::{Frame, Mask};

use super::components::Moments;
use super::config::HoughParams;
use super::geometry::StreakGeometry;
use super::threshold::{mean_plus_sigma, prepare_frame};
use super::{Detection, DetectorInfo, StreakDetector};

/// One accumulator peak: a line `col * cos(theta) + row * sin(theta) = rho`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoughLine {
    pub rho: f64,
    pub theta: f64,
    pub votes: u32,
}

#[derive(Clone, Debug)]
pub struct HoughDetector {
    params: HoughParams,
    min_frame_pixels: usize,
}

impl HoughDetector {
    pub fn new(params: HoughParams, min_frame_pixels: usize) -> Self {
        Self {
            params,
            min_frame_pixels,
        }
    }
}

impl Default for HoughDetector {
    fn default() -> Self {
        Self::new(HoughParams::default(), crate::consts::DEFAULT_MIN_FRAME_PIXELS)
    }
}

impl StreakDetector for HoughDetector {
    fn name(&self) -> &'static str {
        "hough_legacy"
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
        let empty = || Detection {
            mask: Mask::empty(shape),
            geometries: Vec::new(),
            detector: self.info(),
        };

        if prepared.zero_variance {
            return Ok(empty());
        }

        let gradient = gradient_magnitude_array(&prepared.data);
        let (edge_threshold, _, std) = mean_plus_sigma(&gradient, self.params.edge_sigma);
        if std <= 0.0 {
            return Ok(empty());
        }
        let edges: Vec<(usize, usize)> = gradient
            .indexed_iter()
            .filter(|(_, &g)| g as f64 >= edge_threshold && g > 0.0)
            .map(|((r, c), _)| (r, c))
            .collect();

        let lines = find_lines(&edges, shape, &self.params);
        let mut mask = Array2::from_elem(shape, false);
        let mut geometries = Vec::with_capacity(lines.len());
        for line in &lines {
            let moments = draw_line(&mut mask, line, self.params.line_width);
            if moments.n > 0 {
                geometries.push(StreakGeometry::from_moments(&moments));
            }
        }

        debug!(
            frame = %frame.metadata.name,
            edges = edges.len(),
            lines = lines.len(),
            "Hough detection complete"
        );

        Ok(Detection {
            mask: Mask::new(mask),
            geometries,
            detector: self.info(),
        })
    }
}

/// Vote edge points into the accumulator and extract peaks with non-maximum
/// suppression, strongest first.
pub fn find_lines(
    edges: &[(usize, usize)],
    shape: (usize, usize),
    params: &HoughParams,
) -> Vec<HoughLine> {
    let steps = params.angle_steps.max(1);
    if edges.is_empty() {
        return Vec::new();
    }
    let (h, w) = shape;
    let diag = ((h * h + w * w) as f64).sqrt().ceil() as usize;
    let n_rho = 2 * diag + 1;

    // accumulator[theta][rho]; each angle is voted independently.
    let mut accumulator: Vec<Vec<u32>> = (0..steps)
        .into_par_iter()
        .map(|t| {
            let theta = t as f64 * PI / steps as f64;
            let (sin_t, cos_t) = theta.sin_cos();
            let mut column = vec![0u32; n_rho];
            for &(r, c) in edges {
                let rho = c as f64 * cos_t + r as f64 * sin_t;
                let idx = (rho.round() as isize + diag as isize) as usize;
                column[idx] += 1;
            }
            column
        })
        .collect();

    let global_max = accumulator
        .iter()
        .flat_map(|col| col.iter().copied())
        .max()
        .unwrap_or(0);
    let floor = (params.peak_fraction * global_max as f64)
        .max(params.min_votes as f64)
        .max(1.0);

    let mut lines = Vec::new();
    while lines.len() < params.max_lines {
        let mut best = (0usize, 0usize, 0u32);
        for (t, column) in accumulator.iter().enumerate() {
            for (r, &v) in column.iter().enumerate() {
                if v > best.2 {
                    best = (t, r, v);
                }
            }
        }
        let (t, r, votes) = best;
        if (votes as f64) < floor {
            break;
        }
        lines.push(HoughLine {
            rho: r as f64 - diag as f64,
            theta: t as f64 * PI / steps as f64,
            votes,
        });

        suppress(&mut accumulator, t, r);
    }
    lines
}

/// Zero the (rho, theta) window around a peak. Theta wraps at pi, where the
/// same line reappears with rho negated.
fn suppress(accumulator: &mut [Vec<u32>], t: usize, r: usize) {
    let steps = accumulator.len() as isize;
    let theta_window = (HOUGH_SUPPRESSION_THETA as isize).min((steps - 1) / 2);
    for dt in -theta_window..=theta_window {
        let raw = t as isize + dt;
        let column = &mut accumulator[raw.rem_euclid(steps) as usize];
        let n_rho = column.len();
        let center = if (0..steps).contains(&raw) { r } else { n_rho - 1 - r };
        let lo = center.saturating_sub(HOUGH_SUPPRESSION_RHO);
        let hi = (center + HOUGH_SUPPRESSION_RHO).min(n_rho - 1);
        for v in &mut column[lo..=hi] {
            *v = 0;
        }
    }
}

/// Set every pixel within `half_width` of the line and return the moments of
/// the pixels belonging to it.
fn draw_line(mask: &mut Array2<bool>, line: &HoughLine, half_width: f64) -> Moments {
    let (sin_t, cos_t) = line.theta.sin_cos();
    let mut moments = Moments::default();
    for ((r, c), px) in mask.indexed_iter_mut() {
        let dist = (c as f64 * cos_t + r as f64 * sin_t - line.rho).abs();
        if dist <= half_width {
            *px = true;
            moments.push(r, c);
        }
    }
    moments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_edge_column_gives_vertical_line() {
        let edges: Vec<(usize, usize)> = (0..100).map(|r| (r, 40)).collect();
        let params = HoughParams::default();
        let lines = find_lines(&edges, (100, 100), &params);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].votes, 100);
        assert!(lines[0].theta.abs() < 1e-9);
        assert!((lines[0].rho - 40.0).abs() < 1e-9);
    }

    #[test]
    fn no_edges_no_lines() {
        assert!(find_lines(&[], (50, 50), &HoughParams::default()).is_empty());
    }
}
