use std::path::PathBuf;

use crate::night::NightSummary;
use crate::odc::OdcReport;
use crate::quality::FrameQuality;

/// Stages of a folder run, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Discovering,
    ProcessingFrames,
    Aggregating,
    EstimatingOdc,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovering => write!(f, "Discovering frames"),
            Self::ProcessingFrames => write!(f, "Detecting streaks"),
            Self::Aggregating => write!(f, "Aggregating night"),
            Self::EstimatingOdc => write!(f, "Estimating ODC"),
            Self::Writing => write!(f, "Writing reports"),
        }
    }
}

/// A frame that could not be processed; the run continues without it.
#[derive(Clone, Debug)]
pub struct FrameFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Everything a folder run produced.
#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    /// Quality records of successfully processed frames, in file order.
    pub records: Vec<FrameQuality>,
    pub failures: Vec<FrameFailure>,
    pub night: NightSummary,
    pub odc: OdcReport,
    pub night_summary_path: PathBuf,
    pub odc_report_path: PathBuf,
}

/// Receives progress events from a folder run. Events for the frame stage
/// arrive from worker threads, hence `Send + Sync`. Every method defaults to
/// doing nothing.
pub trait ProgressReporter: Send + Sync {
    /// `total_items` is the frame count for `ProcessingFrames`, `None` for
    /// the single-step stages.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` frames of the current stage are finished.
    fn advance(&self, _items_done: usize) {}

    fn finish_stage(&self) {}
}

/// Discards all progress events.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
