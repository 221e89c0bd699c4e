use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use skyshield_core::detection::DetectorMethod;
use skyshield_core::pipeline::{run_pipeline_reported, PipelineConfig, PipelineStage, ProgressReporter};
use tracing::warn;

use crate::summary::{print_outcome, print_run_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum DetectorArg {
    Percentile,
    Hough,
}

impl From<DetectorArg> for DetectorMethod {
    fn from(arg: DetectorArg) -> Self {
        match arg {
            DetectorArg::Percentile => DetectorMethod::Percentile,
            DetectorArg::Hough => DetectorMethod::Hough,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Folder of FITS (or PNG/TIFF) frames from one night
    pub input: PathBuf,

    /// Output folder for masks, quality records and night reports
    #[arg(short, long)]
    pub output: PathBuf,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dataset identifier (defaults to the input folder name)
    #[arg(long)]
    pub dataset_id: Option<String>,

    /// Streak detector
    #[arg(long, value_enum)]
    pub detector: Option<DetectorArg>,

    /// Brightness percentile for the percentile detector (0-100)
    #[arg(long)]
    pub percentile: Option<f64>,

    /// Bootstrap resamples for the ODC confidence interval
    #[arg(long)]
    pub bootstrap: Option<usize>,

    /// Bootstrap seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable the physical sky model
    #[arg(long)]
    pub no_sky_model: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;
    print_run_summary(&config);

    let reporter = Arc::new(BarReporter::new()?);
    let outcome = run_pipeline_reported(&config, reporter.clone())
        .with_context(|| format!("Run failed on {}", config.input.display()))?;
    reporter.finish("Done");
    if !outcome.failures.is_empty() {
        warn!(failed = outcome.failures.len(), "Some frames could not be processed");
    }

    print_outcome(&outcome);
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = super::load_config(args.config.as_deref())?;
    config.input = args.input.clone();
    config.output = args.output.clone();

    if let Some(ref id) = args.dataset_id {
        config.dataset_id = Some(id.clone());
    }
    if let Some(detector) = args.detector {
        config.detection.method = detector.into();
    }
    if let Some(p) = args.percentile {
        anyhow::ensure!((0.0..=100.0).contains(&p), "--percentile must be within 0-100, got {p}");
        config.detection.percentile.percentile = p;
    }
    if let Some(n) = args.bootstrap {
        config.odc.bootstrap_samples = n;
    }
    if let Some(seed) = args.seed {
        config.odc.seed = seed;
    }
    if args.no_sky_model {
        config.sky_model.enabled = false;
    }
    Ok(config)
}

/// Drives an indicatif bar from pipeline progress callbacks.
struct BarReporter {
    bar: ProgressBar,
    total: Mutex<Option<usize>>,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}%")?
                .progress_chars("=> "),
        );
        Ok(Self {
            bar,
            total: Mutex::new(None),
        })
    }

    fn finish(&self, message: &'static str) {
        self.bar.finish_with_message(message);
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        if let Ok(mut total) = self.total.lock() {
            *total = total_items;
        }
        self.bar.set_message(stage.to_string());
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        let total = self.total.lock().ok().and_then(|t| *t);
        if let Some(total) = total.filter(|&t| t > 0) {
            self.bar.set_position((items_done * 100 / total) as u64);
        }
    }

    fn finish_stage(&self) {
        self.bar.set_position(100);
    }
}
