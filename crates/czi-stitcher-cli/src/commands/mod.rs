pub mod check;
pub mod config;
pub mod info;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use czi_stitcher_core::pipeline::config::PipelineConfig;

/// Load `path` when given, otherwise start from the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}
