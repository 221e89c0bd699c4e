pub mod config;
mod orchestrator;
mod types;

pub use config::PipelineConfig;
pub use orchestrator::{analyze_frame, run_pipeline, run_pipeline_reported, FrameAnalysis};
pub use types::{FrameFailure, NoOpReporter, PipelineOutcome, PipelineStage, ProgressReporter};
