//! Orbital Diffuse Contribution (ODC): the fraction of a night's sky
//! background attributable to unresolved satellite light, with a bootstrap
//! confidence interval.
//!
//! Two reference models are available. The residual-only model takes the
//! darkest frames of the night (a low percentile of their background levels)
//! as the natural sky. The physical model divides each level by the predicted
//! natural sky flux first, so moon and twilight variations across the night
//! do not read as contamination; the darkest ratios then fix the instrumental
//! scale. Either way the per-frame residual is the fractional excess over the
//! reference, and the night estimate is a robust aggregate of residuals.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::background::{baseline_reference, residuals, BackgroundEstimate};
use crate::consts::{
    DEFAULT_BASELINE_PERCENTILE, DEFAULT_BOOTSTRAP_SAMPLES, DEFAULT_BOOTSTRAP_SEED,
    DEFAULT_CLIP_ITERATIONS, DEFAULT_CLIP_SIGMA, DEFAULT_MAX_MASKED_FRACTION,
    DEFAULT_MIN_ODC_FRAMES, EPSILON,
};
use crate::frame::{FrameMetadata, Pointing, SiteMetadata};
use crate::sky_model::{SkyBrightness, SkyModelCache, SkyModelConfig};
use crate::stats::{median_in_place, percentiles, sigma_clipped_stats};

pub const METHOD_RESIDUAL: &str = "residual_baseline_v1";
pub const METHOD_PHYSICAL: &str = "physical_ks91_ratio_v1";

/// How per-frame residuals are combined into the night estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Median,
    /// Mean after a 3-sigma MAD clip.
    ClippedMean,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdcConfig {
    /// Fewer usable frames than this yields `insufficient_data`.
    pub min_frames: usize,
    /// Frames with a larger masked fraction are excluded.
    pub max_masked_fraction: f64,
    /// Percentile of levels (or ratios) taken as the natural reference.
    pub baseline_percentile: f64,
    pub aggregation: Aggregation,
    /// Bootstrap resamples; 0 disables the confidence interval.
    pub bootstrap_samples: usize,
    /// Resample `i` is drawn from a generator seeded with `seed + i`.
    pub seed: u64,
}

impl Default for OdcConfig {
    fn default() -> Self {
        Self {
            min_frames: DEFAULT_MIN_ODC_FRAMES,
            max_masked_fraction: DEFAULT_MAX_MASKED_FRACTION,
            baseline_percentile: DEFAULT_BASELINE_PERCENTILE,
            aggregation: Aggregation::default(),
            bootstrap_samples: DEFAULT_BOOTSTRAP_SAMPLES,
            seed: DEFAULT_BOOTSTRAP_SEED,
        }
    }
}

/// Everything the estimator needs to know about one frame.
#[derive(Clone, Debug)]
pub struct FrameObservation {
    pub name: String,
    pub area_fraction: f64,
    /// The frame's background, or why it has none.
    pub background: std::result::Result<BackgroundEstimate, String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub site: Option<SiteMetadata>,
    pub pointing: Option<Pointing>,
}

impl FrameObservation {
    pub fn new(
        metadata: &FrameMetadata,
        area_fraction: f64,
        background: std::result::Result<BackgroundEstimate, String>,
    ) -> Self {
        Self {
            name: metadata.name.clone(),
            area_fraction,
            background,
            timestamp: metadata.timestamp,
            site: metadata.site,
            pointing: metadata.pointing,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Ok,
    Degraded,
    InsufficientData,
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded => write!(f, "degraded"),
            Self::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FitQuality {
    pub fit_status: FitStatus,
    pub notes: Vec<String>,
}

/// A frame left out of the estimate and the reason.
#[derive(Clone, Debug, PartialEq)]
pub struct Exclusion {
    pub name: String,
    pub reason: String,
}

/// Night-level ODC estimate, serialised as `odc_report.json`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OdcReport {
    pub dataset_id: String,
    pub odc_percent: Option<f64>,
    /// Written as `[lo, hi]`, or `[null, null]` without an interval.
    #[serde(serialize_with = "serialize_interval")]
    pub odc_ci95: Option<[f64; 2]>,
    pub method: String,
    pub assumptions: Vec<String>,
    pub quality: FitQuality,
    pub n_frames_used: usize,
    pub bootstrap_samples: usize,
    pub seed: u64,
    #[serde(skip)]
    pub excluded: Vec<Exclusion>,
}

fn serialize_interval<S: Serializer>(ci: &Option<[f64; 2]>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let pair: [Option<f64>; 2] = match ci {
        Some([lo, hi]) => [Some(*lo), Some(*hi)],
        None => [None, None],
    };
    pair.serialize(serializer)
}

impl OdcReport {
    pub fn status(&self) -> FitStatus {
        self.quality.fit_status
    }
}

struct Usable<'a> {
    obs: &'a FrameObservation,
    level: f64,
}

/// Estimate the night's ODC.
///
/// Never fails: missing inputs lower the status to `degraded` or
/// `insufficient_data` and are explained in the report notes.
pub fn estimate_odc(
    observations: &[FrameObservation],
    dataset_id: &str,
    config: &OdcConfig,
    sky: &SkyModelConfig,
) -> OdcReport {
    let mut notes = Vec::new();
    let mut excluded = Vec::new();
    let mut usable: Vec<Usable> = Vec::with_capacity(observations.len());

    for obs in observations {
        let reason = if obs.area_fraction > config.max_masked_fraction {
            Some(format!(
                "masked fraction {:.4} exceeds {:.4}",
                obs.area_fraction, config.max_masked_fraction
            ))
        } else {
            match &obs.background {
                Ok(bg) if bg.level.is_finite() => {
                    usable.push(Usable { obs, level: bg.level });
                    None
                }
                Ok(_) => Some("non-finite background level".to_string()),
                Err(e) => Some(format!("no usable background ({e})")),
            }
        };
        if let Some(reason) = reason {
            notes.push(format!("excluded {}: {}", obs.name, reason));
            excluded.push(Exclusion {
                name: obs.name.clone(),
                reason,
            });
        }
    }

    let mut report = OdcReport {
        dataset_id: dataset_id.to_string(),
        odc_percent: None,
        odc_ci95: None,
        method: METHOD_RESIDUAL.to_string(),
        assumptions: Vec::new(),
        quality: FitQuality {
            fit_status: FitStatus::Ok,
            notes: Vec::new(),
        },
        n_frames_used: usable.len(),
        bootstrap_samples: config.bootstrap_samples,
        seed: config.seed,
        excluded,
    };

    if usable.len() < config.min_frames.max(1) {
        notes.push(format!(
            "{} usable frame(s) of {}, at least {} required",
            usable.len(),
            observations.len(),
            config.min_frames.max(1)
        ));
        warn!(dataset = dataset_id, usable = usable.len(), "Insufficient frames for ODC");
        report.quality = FitQuality {
            fit_status: FitStatus::InsufficientData,
            notes,
        };
        return report;
    }

    let mut status = FitStatus::Ok;
    let physical = if sky.enabled {
        match physical_ratios(&usable, sky) {
            Ok(ratios) => Some(ratios),
            Err(reason) => {
                notes.push(format!(
                    "physical sky model unavailable, falling back to residual baseline: {reason}"
                ));
                status = FitStatus::Degraded;
                None
            }
        }
    } else {
        notes.push("physical sky model disabled".to_string());
        None
    };

    let (signal, method) = match physical {
        Some(ratios) => (ratios, METHOD_PHYSICAL),
        None => (usable.iter().map(|u| u.level).collect::<Vec<f64>>(), METHOD_RESIDUAL),
    };
    report.method = method.to_string();
    report.assumptions = assumptions(method, config, sky);

    let per_frame = baseline_reference(&signal, config.baseline_percentile)
        .and_then(|reference| residuals(&signal, reference));
    let Some(per_frame) = per_frame else {
        notes.push("non-positive reference background; no estimate possible".to_string());
        report.quality = FitQuality {
            fit_status: FitStatus::Degraded,
            notes,
        };
        return report;
    };

    let Some(point) = aggregate(&per_frame, config.aggregation) else {
        notes.push("residual aggregation failed".to_string());
        report.quality = FitQuality {
            fit_status: FitStatus::Degraded,
            notes,
        };
        return report;
    };
    let point = point * 100.0;
    report.odc_percent = Some(point);

    if config.bootstrap_samples == 0 {
        notes.push("bootstrap disabled; no confidence interval".to_string());
    } else {
        match bootstrap_ci(&per_frame, point, config) {
            Some(ci) => {
                if ci.widened {
                    notes.push(format!(
                        "bootstrap interval [{:.4}, {:.4}] widened to contain the estimate",
                        ci.raw[0], ci.raw[1]
                    ));
                }
                report.odc_ci95 = Some(ci.bounds);
            }
            None => notes.push("bootstrap produced no estimates; no confidence interval".to_string()),
        }
    }

    info!(
        dataset = dataset_id,
        method,
        frames = usable.len(),
        odc_percent = point,
        status = %status,
        "ODC estimated"
    );

    report.quality = FitQuality {
        fit_status: status,
        notes,
    };
    report
}

/// Observed level over predicted natural flux, per usable frame.
fn physical_ratios(usable: &[Usable], sky: &SkyModelConfig) -> std::result::Result<Vec<f64>, String> {
    let mut cache = SkyModelCache::new();
    let mut ratios = Vec::with_capacity(usable.len());
    let mut missing = 0usize;
    let mut first_reason = None;

    for u in usable {
        match cache.predict(
            u.obs.site.as_ref(),
            u.obs.timestamp.as_ref(),
            u.obs.pointing.as_ref(),
            sky,
        ) {
            SkyBrightness::Available(p) if p.flux > EPSILON * EPSILON => {
                ratios.push(u.level / p.flux);
            }
            SkyBrightness::Available(_) => {
                missing += 1;
                first_reason.get_or_insert_with(|| format!("{}: zero predicted flux", u.obs.name));
            }
            SkyBrightness::Unavailable { reason } => {
                missing += 1;
                first_reason.get_or_insert_with(|| format!("{}: {}", u.obs.name, reason));
            }
        }
    }

    debug!(predictions = usable.len(), geometries = cache.len(), "Sky model evaluated");

    if missing > 0 {
        return Err(format!(
            "{missing} frame(s) lack metadata (first: {})",
            first_reason.unwrap_or_default()
        ));
    }
    Ok(ratios)
}

fn aggregate(values: &[f64], method: Aggregation) -> Option<f64> {
    match method {
        Aggregation::Median => median_in_place(&mut values.to_vec()),
        Aggregation::ClippedMean => {
            sigma_clipped_stats(values, DEFAULT_CLIP_SIGMA, DEFAULT_CLIP_ITERATIONS).map(|s| s.mean)
        }
    }
}

struct BootstrapInterval {
    /// 2.5th and 97.5th percentiles of the resampled estimates.
    raw: [f64; 2],
    /// `raw` extended to contain the point estimate.
    bounds: [f64; 2],
    widened: bool,
}

/// Percentile bootstrap over the per-frame residuals. The interval is widened
/// where needed so that it always contains `point`.
fn bootstrap_ci(per_frame: &[f64], point: f64, config: &OdcConfig) -> Option<BootstrapInterval> {
    let n = per_frame.len();
    let estimates: Vec<f64> = (0..config.bootstrap_samples)
        .into_par_iter()
        .filter_map(|i| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
            let mut sample: Vec<f64> = (0..n).map(|_| per_frame[rng.random_range(0..n)]).collect();
            let value = match config.aggregation {
                Aggregation::Median => median_in_place(&mut sample),
                Aggregation::ClippedMean => aggregate(&sample, config.aggregation),
            };
            value.map(|v| v * 100.0)
        })
        .collect();

    let p = percentiles(&estimates, &[2.5, 97.5])?;
    let raw = [p[0], p[1]];
    let bounds = [raw[0].min(point), raw[1].max(point)];
    Some(BootstrapInterval {
        raw,
        bounds,
        widened: bounds != raw,
    })
}

fn assumptions(method: &str, config: &OdcConfig, sky: &SkyModelConfig) -> Vec<String> {
    let mut list = vec![
        format!(
            "frames with masked fraction above {} are excluded",
            config.max_masked_fraction
        ),
        "background excess over the natural reference is attributed to unresolved satellites"
            .to_string(),
    ];
    if method == METHOD_PHYSICAL {
        list.push(format!(
            "natural sky follows Krisciunas & Schaefer (1991): dark sky {} mag/arcsec^2, extinction {} mag/airmass",
            sky.dark_sky_mag, sky.extinction
        ));
        list.push(format!(
            "instrument throughput is constant over the night; the {}th percentile of observed/model ratios is natural",
            config.baseline_percentile
        ));
    } else {
        list.push(format!(
            "the {}th percentile of background levels is the natural sky",
            config.baseline_percentile
        ));
    }
    list
}
