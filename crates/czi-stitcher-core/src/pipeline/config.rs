use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_EXPERIMENT_NAME, DEFAULT_FILENAME_FORMAT, DEFAULT_MAX_SHIFT, DEFAULT_PYRAMID_TILE_SIZE,
    DEFAULT_TILE_SIZE_X, DEFAULT_TILE_SIZE_Y,
};
use crate::error::{Result, StitcherError};
use crate::external::{AshlarCli, ImageJHeadless};
use crate::io::RuntimeConfig;
use crate::ome::{ExperimenterIdentity, MetadataTransform};

/// Settings for a whole batch run. Every machine-specific path lives here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fiji/ImageJ launcher.
    #[serde(default = "default_app_path")]
    pub app_path: PathBuf,
    /// BaSiC shading-correction script run inside ImageJ.
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,
    /// Parent of the per-acquisition scratch folders.
    #[serde(default = "default_scratch_root")]
    pub scratch_root: PathBuf,
    #[serde(default = "default_ashlar_path")]
    pub ashlar_path: PathBuf,
    /// Directory holding `bfconvert`; falls back to `$BFTOOLS_PATH` and `PATH`.
    #[serde(default)]
    pub bftools_path: Option<PathBuf>,
    #[serde(default)]
    pub bftools_debug: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub shading: ShadingConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
    #[serde(default)]
    pub experimenter: ExperimenterIdentity,
    #[serde(default = "default_transforms")]
    pub metadata_transforms: Vec<TransformStep>,
}

fn default_app_path() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/Fiji.app/Contents/MacOS/ImageJ-macosx")
    } else if cfg!(windows) {
        PathBuf::from("ImageJ-win64.exe")
    } else {
        PathBuf::from("ImageJ-linux64")
    }
}

fn default_script_path() -> PathBuf {
    PathBuf::from("scripts/imagej_basic_ashlar.py")
}

fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("czi-stitcher")
}

fn default_ashlar_path() -> PathBuf {
    PathBuf::from("ashlar")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_transforms() -> Vec<TransformStep> {
    vec![TransformStep::CollapseFilterSets, TransformStep::AttachExperimenter]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_path: default_app_path(),
            script_path: default_script_path(),
            scratch_root: default_scratch_root(),
            ashlar_path: default_ashlar_path(),
            bftools_path: None,
            bftools_debug: false,
            output_dir: default_output_dir(),
            normalize: NormalizeConfig::default(),
            shading: ShadingConfig::default(),
            stitch: StitchConfig::default(),
            experimenter: ExperimenterIdentity::default(),
            metadata_transforms: default_transforms(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(StitcherError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            bftools_path: self.bftools_path.clone(),
            debug: self.bftools_debug,
        }
    }

    /// The configured transform steps, resolved against the identity section.
    /// Attaching an empty identity is skipped so recorded experimenter
    /// fields survive.
    pub fn transforms(&self) -> Vec<MetadataTransform> {
        self.metadata_transforms
            .iter()
            .filter_map(|step| match step {
                TransformStep::CollapseFilterSets => Some(MetadataTransform::CollapseFilterSets),
                TransformStep::AttachExperimenter if self.experimenter.is_empty() => {
                    debug!("No experimenter identity configured; keeping recorded experimenter");
                    None
                }
                TransformStep::AttachExperimenter => Some(MetadataTransform::AttachExperimenter {
                    identity: self.experimenter.clone(),
                    index: 0,
                }),
            })
            .collect()
    }

    pub fn stitcher(&self) -> AshlarCli {
        AshlarCli::new(&self.ashlar_path)
    }

    pub fn shading_tool(&self) -> ImageJHeadless {
        ImageJHeadless::new(&self.app_path, &self.script_path)
    }
}

/// Metadata rewrite named in the config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStep {
    CollapseFilterSets,
    AttachExperimenter,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub tile_size_x: u32,
    pub tile_size_y: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            tile_size_x: DEFAULT_TILE_SIZE_X,
            tile_size_y: DEFAULT_TILE_SIZE_Y,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// Prefix of the profile file names.
    pub experiment_name: String,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            experiment_name: DEFAULT_EXPERIMENT_NAME.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Reference channel for registration.
    pub align_channel: usize,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Channels to write; empty writes all of them.
    pub output_channels: Vec<usize>,
    pub max_shift: f64,
    pub filter_sigma: f64,
    /// Mosaic file name; must contain `{channel}`, may contain `{cycle}`.
    pub filename_format: String,
    pub pyramid: bool,
    pub tile_size: u32,
    pub quiet: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            align_channel: 0,
            flip_x: false,
            flip_y: false,
            output_channels: Vec::new(),
            max_shift: DEFAULT_MAX_SHIFT,
            filter_sigma: 0.0,
            filename_format: DEFAULT_FILENAME_FORMAT.into(),
            pyramid: false,
            tile_size: DEFAULT_PYRAMID_TILE_SIZE,
            quiet: false,
        }
    }
}
