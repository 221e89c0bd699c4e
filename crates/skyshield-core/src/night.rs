use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consts::DEFAULT_SEVERITY_BINS;
use crate::error::{Result, SkyShieldError};
use crate::quality::FrameQuality;
use crate::stats::percentiles;

const MAX_LABEL_DECIMALS: usize = 17;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightConfig {
    /// Number of equal-width severity bins over [0, 1].
    pub severity_bins: usize,
}

impl Default for NightConfig {
    fn default() -> Self {
        Self {
            severity_bins: DEFAULT_SEVERITY_BINS,
        }
    }
}

/// Folder-level contamination statistics, serialised as `night_summary.json`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NightSummary {
    pub dataset_id: String,
    pub n_frames: usize,
    pub affected_frames: usize,
    pub median_streak_area_fraction: Option<f64>,
    pub p95_streak_area_fraction: Option<f64>,
    pub severity_histogram: BTreeMap<String, usize>,
}

impl NightSummary {
    /// Schema-conformant summary for a night with no scored frames.
    pub fn insufficient(dataset_id: &str, config: &NightConfig) -> Self {
        Self {
            dataset_id: dataset_id.to_string(),
            n_frames: 0,
            affected_frames: 0,
            median_streak_area_fraction: None,
            p95_streak_area_fraction: None,
            severity_histogram: empty_histogram(config.severity_bins),
        }
    }
}

/// Aggregate per-frame records into a night summary. The result does not
/// depend on the order of `records`.
pub fn aggregate(records: &[FrameQuality], dataset_id: &str, config: &NightConfig) -> Result<NightSummary> {
    if records.is_empty() {
        return Err(SkyShieldError::InsufficientData(
            "no frame quality records to aggregate".into(),
        ));
    }

    let fractions: Vec<f64> = records.iter().map(|r| r.streak_area_fraction).collect();
    let stats = percentiles(&fractions, &[50.0, 95.0]).ok_or_else(|| {
        SkyShieldError::InsufficientData("no area fractions to aggregate".into())
    })?;

    let bins = config.severity_bins.max(1);
    let labels = bin_labels(bins);
    let mut counts = vec![0usize; bins];
    for record in records {
        counts[bin_index(record.severity_score, bins)] += 1;
    }
    let severity_histogram = labels.into_iter().zip(counts).collect();

    let affected_frames = records.iter().filter(|r| r.num_streaks > 0).count();

    info!(
        dataset = dataset_id,
        n_frames = records.len(),
        affected_frames,
        median = stats[0],
        p95 = stats[1],
        "Night aggregated"
    );

    Ok(NightSummary {
        dataset_id: dataset_id.to_string(),
        n_frames: records.len(),
        affected_frames,
        median_streak_area_fraction: Some(stats[0]),
        p95_streak_area_fraction: Some(stats[1]),
        severity_histogram,
    })
}

/// Bin of a severity in [0, 1]; the last bin is closed on the right.
fn bin_index(severity: f64, bins: usize) -> usize {
    let s = if severity.is_finite() { severity.clamp(0.0, 1.0) } else { 0.0 };
    ((s * bins as f64).floor() as usize).min(bins - 1)
}

/// Labels with the fewest decimals that keep every bin distinct.
fn bin_labels(bins: usize) -> Vec<String> {
    let base = if 10 % bins == 0 { 1 } else { 2 };
    let mut labels = Vec::new();
    for precision in base..=MAX_LABEL_DECIMALS {
        labels = labels_with_precision(bins, precision);
        if labels.iter().collect::<BTreeSet<_>>().len() == bins {
            break;
        }
    }
    labels
}

fn labels_with_precision(bins: usize, precision: usize) -> Vec<String> {
    (0..bins)
        .map(|i| {
            let lo = i as f64 / bins as f64;
            let hi = (i + 1) as f64 / bins as f64;
            format!("{lo:.precision$}-{hi:.precision$}")
        })
        .collect()
}

fn empty_histogram(bins: usize) -> BTreeMap<String, usize> {
    bin_labels(bins.max(1)).into_iter().map(|l| (l, 0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_for_five_bins() {
        assert_eq!(
            bin_labels(5),
            vec!["0.0-0.2", "0.2-0.4", "0.4-0.6", "0.6-0.8", "0.8-1.0"]
        );
    }

    #[test]
    fn fine_binning_keeps_labels_distinct() {
        let labels = bin_labels(200);
        assert_eq!(labels.iter().collect::<BTreeSet<_>>().len(), 200);
        assert_eq!(labels[1], "0.005-0.010");
        assert_eq!(bin_labels(3), vec!["0.00-0.33", "0.33-0.67", "0.67-1.00"]);
    }

    #[test]
    fn last_bin_is_closed() {
        assert_eq!(bin_index(1.0, 5), 4);
        assert_eq!(bin_index(0.0, 5), 0);
        assert_eq!(bin_index(0.2, 5), 1);
    }
}
