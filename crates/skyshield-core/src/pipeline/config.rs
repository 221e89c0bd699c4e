use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::background::BackgroundConfig;
use crate::detection::DetectorConfig;
use crate::night::NightConfig;
use crate::odc::OdcConfig;
use crate::quality::QualityConfig;
use crate::sky_model::SkyModelConfig;
use crate::validation::ValidationConfig;

/// Configuration of a folder run. Every section is optional in TOML and
/// falls back to its defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub input: PathBuf,
    #[serde(default)]
    pub output: PathBuf,
    /// Dataset identifier written to the night reports; defaults to the input
    /// folder name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub detection: DetectorConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub night: NightConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub sky_model: SkyModelConfig,
    #[serde(default)]
    pub odc: OdcConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl PipelineConfig {
    pub fn new(input: &Path, output: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn resolved_dataset_id(&self) -> String {
        self.dataset_id.clone().unwrap_or_else(|| {
            self.input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "dataset".to_string())
        })
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.output.join("masks")
    }

    pub fn quality_dir(&self) -> PathBuf {
        self.output.join("quality")
    }

    pub fn night_summary_path(&self) -> PathBuf {
        self.output.join("night_summary.json")
    }

    pub fn odc_report_path(&self) -> PathBuf {
        self.output.join("odc_report.json")
    }
}
