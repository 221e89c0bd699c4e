pub mod config;
pub mod detect;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use skyshield_core::pipeline::PipelineConfig;

/// Load a pipeline config from TOML, or start from defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Invalid pipeline config {}", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}
