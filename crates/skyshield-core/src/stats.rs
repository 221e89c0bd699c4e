//! Order statistics and robust estimators shared by the detector, the
//! scorer, the night aggregator and the ODC estimator.
//!
//! All percentiles use linear interpolation between closest ranks:
//! for sorted values `v[0..n]` the p-th percentile sits at fractional rank
//! `p / 100 * (n - 1)`. Even-length medians therefore average the two middle
//! values. Sorting uses `total_cmp`, so results do not depend on input order.

use crate::consts::{EPSILON, MAD_TO_SIGMA};

/// Percentile of already-sorted values. `p` is clamped to [0, 100].
/// Returns `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile of unsorted values (copied, then sorted).
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, p)
}

/// Several percentiles of the same values with a single sort.
pub fn percentiles(values: &[f64], ps: &[f64]) -> Option<Vec<f64>> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    ps.iter().map(|&p| percentile_sorted(&sorted, p)).collect()
}

/// Median using `select_nth_unstable`; reorders `values` in place.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        Some(*values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1)
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let upper = values[mid];
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        Some((values[mid - 1] + upper) / 2.0)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut owned = values.to_vec();
    median_in_place(&mut owned)
}

/// Population mean and standard deviation.
pub fn mean_stddev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Robust sigma: 1.4826 * median absolute deviation around `center`.
pub fn robust_sigma(values: &[f64], center: f64) -> f64 {
    let mut deviations: Vec<f64> = values.iter().map(|&v| (v - center).abs()).collect();
    median_in_place(&mut deviations).unwrap_or(0.0) * MAD_TO_SIGMA
}

/// Result of an iterative sigma-clip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClippedStats {
    /// Median of the surviving values.
    pub median: f64,
    /// Mean of the surviving values.
    pub mean: f64,
    /// Robust sigma (scaled MAD) of the surviving values.
    pub sigma: f64,
    /// Number of values that survived clipping.
    pub retained: usize,
}

/// Iteratively reject values further than `sigma` robust deviations from the
/// median. Stops early when nothing is rejected or the spread collapses.
/// Returns `None` for an empty input.
pub fn sigma_clipped_stats(values: &[f64], sigma: f64, max_iterations: usize) -> Option<ClippedStats> {
    if values.is_empty() {
        return None;
    }
    let mut kept: Vec<f64> = values.to_vec();

    for _ in 0..max_iterations {
        let center = median(&kept)?;
        let spread = robust_sigma(&kept, center);
        if spread < EPSILON {
            break;
        }
        let lo = center - sigma * spread;
        let hi = center + sigma * spread;
        let before = kept.len();
        kept.retain(|&v| v >= lo && v <= hi);
        if kept.len() == before || kept.is_empty() {
            break;
        }
    }

    if kept.is_empty() {
        // Pathological spread: fall back to the unclipped sample.
        kept = values.to_vec();
    }

    let center = median(&kept)?;
    let (mean, _) = mean_stddev(&kept);
    Some(ClippedStats {
        median: center,
        mean,
        sigma: robust_sigma(&kept, center),
        retained: kept.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let v = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(percentile(&v, 0.0), Some(0.0));
        assert_eq!(percentile(&v, 100.0), Some(30.0));
        assert!((percentile(&v, 50.0).unwrap() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn sigma_clip_rejects_outliers() {
        let mut v: Vec<f64> = (0..100).map(|i| 10.0 + (i % 5) as f64 * 0.1).collect();
        v.push(1000.0);
        v.push(-1000.0);
        let s = sigma_clipped_stats(&v, 3.0, 5).unwrap();
        assert_eq!(s.retained, 100);
        assert!((s.median - 10.2).abs() < 1e-9);
    }
}
