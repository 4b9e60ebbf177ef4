use std::ffi::OsString;
use std::path::PathBuf;

use tracing::info;

use crate::error::{Result, StitcherError};
use crate::process::run_command;

use super::{StitchEngine, StitchRequest};

/// Drives the `ashlar` command-line stitcher.
#[derive(Clone, Debug)]
pub struct AshlarCli {
    program: PathBuf,
}

impl AshlarCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments equivalent to `request`.
    pub fn arguments(request: &StitchRequest) -> Result<Vec<OsString>> {
        let output_dir = request
            .output_template
            .parent()
            .map(|p| p.as_os_str().to_os_string())
            .unwrap_or_else(|| OsString::from("."));
        let filename_format = request
            .output_template
            .file_name()
            .ok_or_else(|| {
                StitcherError::Usage(format!(
                    "output template '{}' has no file name",
                    request.output_template.display()
                ))
            })?
            .to_os_string();

        let mut args: Vec<OsString> = request.inputs.iter().map(|p| p.as_os_str().into()).collect();
        args.push("-o".into());
        args.push(output_dir);
        args.push("-f".into());
        args.push(filename_format);
        args.push("-c".into());
        args.push(request.aligner.channel.to_string().into());
        args.push("-m".into());
        args.push(request.aligner.max_shift.to_string().into());
        args.push("--filter-sigma".into());
        args.push(request.aligner.filter_sigma.to_string().into());
        if request.flip_x {
            args.push("--flip-x".into());
        }
        if request.flip_y {
            args.push("--flip-y".into());
        }
        if let Some(ref channels) = request.mosaic.channels {
            args.push("--output-channels".into());
            args.extend(channels.iter().map(|c| OsString::from(c.to_string())));
        }
        if request.pyramid {
            args.push("--pyramid".into());
        }
        if let Some(tile_size) = request.mosaic.tile_size {
            args.push("--tile-size".into());
            args.push(tile_size.to_string().into());
        }
        if !request.flatfields.is_empty() {
            args.push("--ffp".into());
            args.extend(request.flatfields.iter().map(|p| p.as_os_str().to_os_string()));
        }
        if !request.darkfields.is_empty() {
            args.push("--dfp".into());
            args.extend(request.darkfields.iter().map(|p| p.as_os_str().to_os_string()));
        }
        if request.quiet {
            args.push("-q".into());
        }
        Ok(args)
    }
}

impl StitchEngine for AshlarCli {
    fn name(&self) -> &str {
        "ashlar"
    }

    fn process_single(&self, request: &StitchRequest) -> Result<()> {
        let args = Self::arguments(request)?;
        info!(inputs = request.inputs.len(), "Starting ashlar");
        let output = run_command(&self.program, &args)?;
        if !output.success() {
            return Err(StitcherError::tool(
                "ashlar",
                format!("exited with {}: {}", output.status, output.stderr_tail()),
            ));
        }
        Ok(())
    }
}
