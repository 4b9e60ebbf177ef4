use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::info;

use crate::error::{Result, StitcherError};
use crate::ome::OmeMetadata;

use super::bftools::{bfconvert, resolve_tool, BFCONVERT};
use super::ome_tiff::OmeTiffEngine;
use super::{FormatEngine, PlaneReader, PlaneWriter, ReaderOptions, WriterOptions};

/// Settings for the process-wide format runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding the Bio-Formats command-line tools.
    #[serde(default)]
    pub bftools_path: Option<PathBuf>,
    /// Pass `-debug` to the Bio-Formats tools.
    #[serde(default)]
    pub debug: bool,
}

/// The single multi-format reader/writer service shared by every stage.
///
/// TIFF-family files are handled natively. Anything else is first converted
/// with `bfconvert` into a private staging directory that lives until
/// [`FormatRuntime::shutdown`].
pub struct FormatRuntime {
    config: RuntimeConfig,
    native: OmeTiffEngine,
    staging: TempDir,
    staged: AtomicUsize,
}

impl FormatRuntime {
    pub fn init(config: RuntimeConfig) -> Result<Self> {
        let staging = tempfile::Builder::new().prefix("czi-stitcher-").tempdir()?;
        info!(
            staging = %staging.path().display(),
            bftools = ?config.bftools_path,
            "Format runtime initialized"
        );
        Ok(Self {
            config,
            native: OmeTiffEngine,
            staging,
            staged: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Remove the staging directory and every converted file in it.
    pub fn shutdown(self) -> Result<()> {
        let staged = self.staged.load(Ordering::Relaxed);
        self.staging.close()?;
        info!(staged, "Format runtime shut down");
        Ok(())
    }

    fn stage(&self, path: &Path, options: &ReaderOptions) -> Result<PathBuf> {
        let program = resolve_tool(BFCONVERT, self.config.bftools_path.as_deref()).ok_or_else(|| {
            StitcherError::read(path, "vendor format requires bfconvert, which was not found")
        })?;
        let n = self.staged.fetch_add(1, Ordering::Relaxed);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".into());
        let staged = self.staging.path().join(format!("{stem}-{n}.ome.tif"));
        info!(input = %path.display(), "Decoding vendor file with bfconvert");
        bfconvert(&program, path, &staged, options, self.config.debug)?;
        Ok(staged)
    }
}

/// True for extensions the native reader understands.
pub fn is_tiff_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "tif" | "tiff" | "btf" | "tf8"))
        .unwrap_or(false)
}

impl FormatEngine for FormatRuntime {
    fn name(&self) -> &str {
        "bio-formats"
    }

    fn open(&self, path: &Path, options: &ReaderOptions) -> Result<Box<dyn PlaneReader>> {
        if !path.exists() {
            return Err(StitcherError::NotFound(path.to_path_buf()));
        }
        if is_tiff_family(path) {
            return self.native.open(path, options);
        }
        let staged = self.stage(path, options)?;
        self.native.open(&staged, &ReaderOptions::default())
    }

    fn create(
        &self,
        path: &Path,
        metadata: &OmeMetadata,
        options: &WriterOptions,
    ) -> Result<Box<dyn PlaneWriter>> {
        self.native.create(path, metadata, options)
    }
}
