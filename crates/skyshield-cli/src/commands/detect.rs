use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use skyshield_core::background::BackgroundEstimate;
use skyshield_core::detection::{build_detector, StreakGeometry};
use skyshield_core::io::fits::write_mask;
use skyshield_core::io::image_io::save_mask_png;
use skyshield_core::io::{is_fits, read_frame};
use skyshield_core::pipeline::analyze_frame;
use skyshield_core::quality::FrameQuality;

use super::run::DetectorArg;

#[derive(Args)]
pub struct DetectArgs {
    /// Input frame (FITS, PNG or TIFF)
    pub file: PathBuf,

    /// Pipeline config file (TOML); only the detection and quality sections are used
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Streak detector
    #[arg(long, value_enum)]
    pub detector: Option<DetectorArg>,

    /// Brightness percentile for the percentile detector (0-100)
    #[arg(long)]
    pub percentile: Option<f64>,

    /// Write the mask here (.fits keeps provenance tags, anything else is saved as an image)
    #[arg(long)]
    pub mask: Option<PathBuf>,
}

#[derive(Serialize)]
struct DetectReport<'a> {
    quality: &'a FrameQuality,
    streaks: &'a [StreakGeometry],
    background: Option<&'a BackgroundEstimate>,
}

pub fn run(args: &DetectArgs) -> Result<()> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(detector) = args.detector {
        config.detection.method = detector.into();
    }
    if let Some(p) = args.percentile {
        anyhow::ensure!((0.0..=100.0).contains(&p), "--percentile must be within 0-100, got {p}");
        config.detection.percentile.percentile = p;
    }

    let frame = read_frame(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let detector = build_detector(&config.detection);
    let analysis = analyze_frame(&frame, detector.as_ref(), &config)?;

    if let Some(ref path) = args.mask {
        if is_fits(path) {
            write_mask(path, &analysis.detection.mask, Some(&frame.metadata.header))?;
        } else {
            save_mask_png(&analysis.detection.mask, path)?;
        }
        eprintln!("Mask saved to {}", path.display());
    }

    let report = DetectReport {
        quality: &analysis.quality,
        streaks: &analysis.detection.geometries,
        background: analysis.background.as_ref().ok(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
