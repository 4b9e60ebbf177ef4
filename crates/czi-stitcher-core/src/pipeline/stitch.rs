use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::consts::{
    CHANNEL_PLACEHOLDER, CYCLE_PLACEHOLDER, DEFAULT_MAX_SHIFT, DEFAULT_PYRAMID_TILE_SIZE,
    STITCH_FILENAME_FORMAT,
};
use crate::error::{Result, StitcherError};
use crate::external::{AlignerOptions, MosaicOptions, StitchEngine, StitchRequest};

use super::config::StitchConfig;

/// Everything one stitching call needs.
#[derive(Clone, Debug, PartialEq)]
pub struct StitchParams {
    pub stacks: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub align_channel: usize,
    pub flip_x: bool,
    pub flip_y: bool,
    pub output_channels: Vec<usize>,
    pub max_shift: f64,
    pub filter_sigma: f64,
    pub filename_format: String,
    pub pyramid: bool,
    pub tile_size: u32,
    /// Zero, one (shared by every stack) or one per stack.
    pub flatfields: Vec<PathBuf>,
    /// Zero, one (shared by every stack) or one per stack.
    pub darkfields: Vec<PathBuf>,
    pub quiet: bool,
    /// Substituted for `{cycle}` in `filename_format`.
    pub cycle: usize,
}

impl StitchParams {
    pub fn new(stacks: Vec<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            stacks,
            output_dir: output_dir.into(),
            align_channel: 0,
            flip_x: false,
            flip_y: false,
            output_channels: Vec::new(),
            max_shift: DEFAULT_MAX_SHIFT,
            filter_sigma: 0.0,
            filename_format: STITCH_FILENAME_FORMAT.into(),
            pyramid: false,
            tile_size: DEFAULT_PYRAMID_TILE_SIZE,
            flatfields: Vec::new(),
            darkfields: Vec::new(),
            quiet: false,
            cycle: 0,
        }
    }

    pub fn from_config(stacks: Vec<PathBuf>, output_dir: impl Into<PathBuf>, config: &StitchConfig) -> Self {
        Self {
            align_channel: config.align_channel,
            flip_x: config.flip_x,
            flip_y: config.flip_y,
            output_channels: config.output_channels.clone(),
            max_shift: config.max_shift,
            filter_sigma: config.filter_sigma,
            filename_format: config.filename_format.clone(),
            pyramid: config.pyramid,
            tile_size: config.tile_size,
            quiet: config.quiet,
            ..Self::new(stacks, output_dir)
        }
    }

    pub fn with_profiles(mut self, flatfields: Vec<PathBuf>, darkfields: Vec<PathBuf>) -> Self {
        self.flatfields = flatfields;
        self.darkfields = darkfields;
        self
    }
    /// Source channel index encoded in a mosaic's file name, read back
    /// through `filename_format`.
    pub fn channel_of(&self, mosaic: &Path) -> Option<usize> {
        let template = resolve_template(&self.filename_format, self.cycle).ok()?;
        channel_from_name(file_name(mosaic), &template)
    }
}

/// Result of a stitching call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StitchOutcome {
    /// The engine ran and wrote these mosaics.
    Computed(Vec<PathBuf>),
    /// Mosaics were already present; the engine was not called.
    Cached(Vec<PathBuf>),
    /// Parameters were rejected before anything ran.
    Rejected(String),
}

impl StitchOutcome {
    /// Mosaic paths in channel order; empty when rejected.
    pub fn mosaics(&self) -> &[PathBuf] {
        match self {
            Self::Computed(paths) | Self::Cached(paths) => paths,
            Self::Rejected(_) => &[],
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Register and stitch `params.stacks` into one mosaic per channel.
pub fn stitch(engine: &dyn StitchEngine, params: &StitchParams) -> Result<StitchOutcome> {
    if params.stacks.is_empty() {
        return Err(StitcherError::Usage("no stacks to stitch".into()));
    }
    let file_template = resolve_template(&params.filename_format, params.cycle)?;
    if !params.output_dir.is_dir() {
        error!(output_dir = %params.output_dir.display(), "Output directory not found");
        return Err(StitcherError::NotFound(params.output_dir.clone()));
    }

    let n = params.stacks.len();
    let flatfields = match broadcast("flat-field", &params.flatfields, n) {
        Ok(paths) => paths,
        Err(reason) => return Ok(reject(reason)),
    };
    let darkfields = match broadcast("dark-field", &params.darkfields, n) {
        Ok(paths) => paths,
        Err(reason) => return Ok(reject(reason)),
    };

    let existing = find_mosaics(&params.output_dir, &file_template)?;
    if !existing.is_empty() {
        info!(count = existing.len(), "Stitched files already exist. Skipping calculations");
        return Ok(StitchOutcome::Cached(existing));
    }

    let request = StitchRequest {
        inputs: params.stacks.clone(),
        output_template: params.output_dir.join(&file_template),
        flip_x: params.flip_x,
        flip_y: params.flip_y,
        flatfields,
        darkfields,
        aligner: AlignerOptions {
            channel: params.align_channel,
            verbose: !params.quiet,
            max_shift: params.max_shift,
            filter_sigma: params.filter_sigma,
        },
        mosaic: MosaicOptions {
            channels: (!params.output_channels.is_empty()).then(|| params.output_channels.clone()),
            tile_size: params.pyramid.then_some(params.tile_size),
            verbose: !params.quiet,
        },
        pyramid: params.pyramid,
        quiet: params.quiet,
    };
    info!(engine = engine.name(), stacks = n, "Stitching tiles");
    engine.process_single(&request)?;

    let mosaics = find_mosaics(&params.output_dir, &file_template)?;
    info!(count = mosaics.len(), "Stitching complete");
    Ok(StitchOutcome::Computed(mosaics))
}

fn reject(reason: String) -> StitchOutcome {
    error!("{reason}");
    StitchOutcome::Rejected(reason)
}

/// Substitute `{cycle}` and make sure `{channel}` is left for the engine.
fn resolve_template(format: &str, cycle: usize) -> Result<String> {
    if !format.contains(CHANNEL_PLACEHOLDER) {
        return Err(StitcherError::Usage(format!(
            "filename format '{format}' must contain {CHANNEL_PLACEHOLDER}"
        )));
    }
    Ok(format.replace(CYCLE_PLACEHOLDER, &cycle.to_string()))
}

fn broadcast(kind: &str, paths: &[PathBuf], n: usize) -> std::result::Result<Vec<PathBuf>, String> {
    match paths.len() {
        0 => Ok(Vec::new()),
        1 => Ok(vec![paths[0].clone(); n]),
        len if len == n => Ok(paths.to_vec()),
        len => Err(format!(
            "wrong number of {kind} profiles: got {len}, must be 0, 1 or {n} (one per stack)"
        )),
    }
}

/// Files in `dir` matching `template` with any `{channel}` value, in natural
/// file-name order.
pub fn find_mosaics(dir: &Path, template: &str) -> Result<Vec<PathBuf>> {
    let name_pattern = template
        .split(CHANNEL_PLACEHOLDER)
        .map(glob::Pattern::escape)
        .collect::<Vec<_>>()
        .join("*");
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped_dir).join(name_pattern).to_string_lossy().into_owned();
    debug!(%pattern, "Looking for mosaics");

    let mut found = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| StitcherError::Io(e.into()))?;
        if path.is_file() {
            found.push(path);
        }
    }
    found.sort_by(|a, b| natural_cmp(file_name(a), file_name(b)));
    Ok(found)
}

fn channel_from_name(name: &str, template: &str) -> Option<usize> {
    let (prefix, suffix) = template.split_once(CHANNEL_PLACEHOLDER)?;
    let suffix = suffix.replace(CHANNEL_PLACEHOLDER, "");
    name.strip_prefix(prefix)?
        .strip_suffix(suffix.as_str())?
        .parse()
        .ok()
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    Number(u128),
    Text(&'a str),
}

fn chunks(name: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = name.as_bytes();
    while start < bytes.len() {
        let digit = bytes[start].is_ascii_digit();
        let end = bytes[start..]
            .iter()
            .position(|b| b.is_ascii_digit() != digit)
            .map_or(bytes.len(), |p| start + p);
        let run = &name[start..end];
        out.push(if digit {
            run.parse().map_or(Chunk::Text(run), Chunk::Number)
        } else {
            Chunk::Text(run)
        });
        start = end;
    }
    out
}

/// Compare names with digit runs taken as numbers: `ch_2` < `ch_10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}
