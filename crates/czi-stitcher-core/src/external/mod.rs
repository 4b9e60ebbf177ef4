//! External engines the pipeline delegates heavy work to: tile registration
//! and stitching, and shading-profile estimation.

pub mod ashlar;
pub mod imagej;

use std::path::PathBuf;

use crate::error::Result;

pub use ashlar::AshlarCli;
pub use imagej::ImageJHeadless;

/// Options controlling tile registration.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignerOptions {
    /// Channel used as the registration reference.
    pub channel: usize,
    pub verbose: bool,
    /// Largest per-tile shift accepted before it is rejected as an outlier.
    pub max_shift: f64,
    /// Gaussian smoothing applied before cross-correlation.
    pub filter_sigma: f64,
}

/// Options controlling mosaic assembly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MosaicOptions {
    /// Channels to write; `None` writes every channel.
    pub channels: Option<Vec<usize>>,
    /// Output tile size, set only for pyramidal output.
    pub tile_size: Option<u32>,
    pub verbose: bool,
}

/// One batch call into the stitching engine.
#[derive(Clone, Debug, PartialEq)]
pub struct StitchRequest {
    pub inputs: Vec<PathBuf>,
    /// Output path whose file name still holds the `{channel}` placeholder.
    pub output_template: PathBuf,
    pub flip_x: bool,
    pub flip_y: bool,
    /// One entry per input, or empty.
    pub flatfields: Vec<PathBuf>,
    /// One entry per input, or empty.
    pub darkfields: Vec<PathBuf>,
    pub aligner: AlignerOptions,
    pub mosaic: MosaicOptions,
    pub pyramid: bool,
    pub quiet: bool,
}

/// Registration/stitching engine: writes one mosaic per channel.
pub trait StitchEngine: Send + Sync {
    fn name(&self) -> &str;

    fn process_single(&self, request: &StitchRequest) -> Result<()>;
}

/// Inputs to shading-profile estimation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadingRequest {
    pub stack: PathBuf,
    pub output_dir: PathBuf,
    pub experiment_name: String,
}

/// Batch tool estimating flat-field and dark-field profiles from a stack.
pub trait ShadingTool: Send + Sync {
    fn name(&self) -> &str;

    fn estimate_profiles(&self, request: &ShadingRequest) -> Result<()>;
}
