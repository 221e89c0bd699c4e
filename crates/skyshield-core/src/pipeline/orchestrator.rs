use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::background::{estimate_background, BackgroundEstimate};
use crate::detection::{build_detector, Detection, StreakDetector};
use crate::error::Result;
use crate::frame::Frame;
use crate::io::fits::write_mask;
use crate::io::reports::write_json;
use crate::io::{file_stem, list_frames, read_frame};
use crate::night::{aggregate, NightSummary};
use crate::odc::{estimate_odc, FrameObservation};
use crate::quality::{score_frame, FrameQuality};

use super::config::PipelineConfig;
use super::types::{FrameFailure, NoOpReporter, PipelineOutcome, PipelineStage, ProgressReporter};

/// Detection, scoring and background of one frame.
#[derive(Clone, Debug)]
pub struct FrameAnalysis {
    pub detection: Detection,
    pub quality: FrameQuality,
    /// Background level, or why none could be measured.
    pub background: std::result::Result<BackgroundEstimate, String>,
}

impl FrameAnalysis {
    pub fn observation(&self, frame: &Frame) -> FrameObservation {
        FrameObservation::new(
            &frame.metadata,
            self.quality.streak_area_fraction,
            self.background.clone(),
        )
    }
}

/// Run detector, scorer and background model on a frame already in memory.
pub fn analyze_frame(frame: &Frame, detector: &dyn StreakDetector, config: &PipelineConfig) -> Result<FrameAnalysis> {
    let detection = detector.detect(frame)?;
    let quality = score_frame(frame, &detection, &config.quality)?;
    let background = estimate_background(frame, &detection.mask, &config.background)
        .map_err(|e| e.to_string());
    Ok(FrameAnalysis {
        detection,
        quality,
        background,
    })
}

struct FrameProduct {
    quality: FrameQuality,
    observation: FrameObservation,
}

fn process_path(path: &Path, detector: &dyn StreakDetector, config: &PipelineConfig) -> Result<FrameProduct> {
    let frame = read_frame(path)?;
    let analysis = analyze_frame(&frame, detector, config)?;

    let stem = file_stem(path);
    let mask_written = write_mask(
        &config.masks_dir().join(format!("{stem}_mask.fits")),
        &analysis.detection.mask,
        Some(&frame.metadata.header),
    );
    let quality_written = write_json(
        &config.quality_dir().join(format!("{stem}_quality.json")),
        &analysis.quality,
    );
    first_error([mask_written, quality_written])?;

    Ok(FrameProduct {
        observation: analysis.observation(&frame),
        quality: analysis.quality,
    })
}

/// Every write has already been attempted; surface the first failure.
fn first_error<const N: usize>(results: [Result<()>; N]) -> Result<()> {
    for result in &results {
        if let Err(e) = result {
            warn!(error = %e, "Artifact write failed");
        }
    }
    results.into_iter().collect()
}

/// Run the full folder pipeline with a thread-safe progress reporter.
///
/// Frames are processed in parallel; a frame that fails is logged, recorded
/// in the outcome and left out of the night statistics. Only failures to
/// list the input or write the night reports abort the run.
pub fn run_pipeline_reported(
    config: &PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineOutcome> {
    let dataset_id = config.resolved_dataset_id();

    reporter.begin_stage(PipelineStage::Discovering, None);
    let paths = list_frames(&config.input)?;
    std::fs::create_dir_all(config.masks_dir())?;
    std::fs::create_dir_all(config.quality_dir())?;
    reporter.finish_stage();
    info!(
        dataset = %dataset_id,
        frames = paths.len(),
        detector = %config.detection.method,
        "Starting run"
    );

    let detector = build_detector(&config.detection);
    reporter.begin_stage(PipelineStage::ProcessingFrames, Some(paths.len()));
    let done = AtomicUsize::new(0);
    let results: Vec<(PathBuf, Result<FrameProduct>)> = paths
        .par_iter()
        .map(|path| {
            let result = process_path(path, detector.as_ref(), config);
            reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
            (path.clone(), result)
        })
        .collect();
    reporter.finish_stage();

    let mut records = Vec::with_capacity(results.len());
    let mut observations = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(product) => {
                records.push(product.quality);
                observations.push(product.observation);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Frame skipped");
                failures.push(FrameFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    reporter.begin_stage(PipelineStage::Aggregating, None);
    let night = match aggregate(&records, &dataset_id, &config.night) {
        Ok(summary) => summary,
        Err(e) => {
            warn!(dataset = %dataset_id, error = %e, "Writing empty night summary");
            NightSummary::insufficient(&dataset_id, &config.night)
        }
    };
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::EstimatingOdc, None);
    let odc = estimate_odc(&observations, &dataset_id, &config.odc, &config.sky_model);
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Writing, None);
    let night_summary_path = config.night_summary_path();
    let odc_report_path = config.odc_report_path();
    let night_written = write_json(&night_summary_path, &night);
    let odc_written = write_json(&odc_report_path, &odc);
    first_error([night_written, odc_written])?;
    reporter.finish_stage();

    info!(
        dataset = %dataset_id,
        processed = records.len(),
        failed = failures.len(),
        odc_status = %odc.quality.fit_status,
        "Run complete"
    );

    Ok(PipelineOutcome {
        records,
        failures,
        night,
        odc,
        night_summary_path,
        odc_report_path,
    })
}

/// Run the full folder pipeline without progress reporting.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome> {
    run_pipeline_reported(config, Arc::new(NoOpReporter))
}
