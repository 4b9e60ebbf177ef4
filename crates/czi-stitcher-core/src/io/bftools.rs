//! Bio-Formats command-line tools (`bftools`), used to decode vendor formats
//! the native TIFF reader cannot handle.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, StitcherError};
use crate::process::{find_executable, run_command};

use super::ReaderOptions;

pub const BFCONVERT: &str = "bfconvert";

/// Environment variable naming the bftools installation directory.
pub const BFTOOLS_PATH_ENV: &str = "BFTOOLS_PATH";

/// Resolve a bftools executable from the configured directory, then
/// `$BFTOOLS_PATH`, then `PATH`.
pub fn resolve_tool(tool: &str, configured_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = configured_dir {
        if let Some(found) = find_executable(tool, Some(dir)) {
            return Some(found);
        }
        warn!(dir = %dir.display(), tool, "bftools directory does not contain tool");
    }
    let env_dir = std::env::var_os(BFTOOLS_PATH_ENV).map(PathBuf::from);
    find_executable(tool, env_dir.as_deref())
}

/// Check that `bfconvert` is installed and starts.
///
/// Exit codes 0 and 1 both mean the tool ran; only a failure to locate or
/// start it is an error.
pub fn check_bftools(configured_dir: Option<&Path>) -> Result<PathBuf> {
    let program = resolve_tool(BFCONVERT, configured_dir).ok_or_else(|| {
        StitcherError::tool(
            BFCONVERT,
            format!("not found; set {BFTOOLS_PATH_ENV} or add bftools to PATH"),
        )
    })?;
    let output = run_command(&program, ["-version"])?;
    match output.status.code() {
        Some(0) | Some(1) => {
            info!(path = %program.display(), "Found bftools");
            Ok(program)
        }
        code => Err(StitcherError::tool(
            BFCONVERT,
            format!("unexpected exit status {code:?}: {}", output.stderr_tail()),
        )),
    }
}

/// Convert `input` into an OME-TIFF at `output`, forwarding reader options
/// as `-option key value` pairs.
pub fn bfconvert(
    program: &Path,
    input: &Path,
    output: &Path,
    options: &ReaderOptions,
    debug_log: bool,
) -> Result<()> {
    let mut args: Vec<String> = vec!["-no-upgrade".into(), "-overwrite".into()];
    if debug_log {
        args.push("-debug".into());
    }
    for (key, value) in options.iter() {
        args.push("-option".into());
        args.push(key.into());
        args.push(value.into());
    }
    args.push(input.display().to_string());
    args.push(output.display().to_string());

    let result = run_command(program, &args)?;
    if !result.success() {
        return Err(StitcherError::read(
            input,
            format!("bfconvert exited with {}: {}", result.status, result.stderr_tail()),
        ));
    }
    if !output.exists() {
        return Err(StitcherError::read(input, "bfconvert produced no output"));
    }
    debug!(input = %input.display(), output = %output.display(), "Staged through bfconvert");
    Ok(())
}
