use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skyshield_core::io::read_mask;
use skyshield_core::io::reports::write_json;
use skyshield_core::validation::{evaluate, evaluate_against_boxes, read_yolo_labels, ValidationConfig};

use crate::summary::print_metrics;

#[derive(Args)]
#[command(group(clap::ArgGroup::new("truth_source").required(true).args(["truth", "labels"])))]
pub struct ValidateArgs {
    /// Predicted mask (FITS or image)
    #[arg(long)]
    pub pred: PathBuf,

    /// Ground-truth mask (FITS or image)
    #[arg(long)]
    pub truth: Option<PathBuf>,

    /// Ground-truth YOLO label file (class cx cy w h, normalised)
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Minimum fraction of a predicted component inside a box to count the box as found
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Write the metrics as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &ValidateArgs) -> Result<()> {
    let predicted = read_mask(&args.pred)
        .with_context(|| format!("Failed to read mask {}", args.pred.display()))?;

    let metrics = if let Some(ref labels) = args.labels {
        let mut config = ValidationConfig::default();
        if let Some(overlap) = args.overlap {
            config.overlap_threshold = overlap;
        }
        let boxes = read_yolo_labels(labels, predicted.shape())
            .with_context(|| format!("Failed to read labels {}", labels.display()))?;
        evaluate_against_boxes(&predicted, &boxes, &config)?
    } else if let Some(ref truth) = args.truth {
        let truth_mask = read_mask(truth)
            .with_context(|| format!("Failed to read mask {}", truth.display()))?;
        evaluate(&predicted, &truth_mask)?
    } else {
        anyhow::bail!("either --truth or --labels is required");
    };

    print_metrics(&metrics);
    if let Some(ref path) = args.output {
        write_json(path, &metrics)?;
        println!("\nMetrics saved to {}", path.display());
    }
    Ok(())
}
