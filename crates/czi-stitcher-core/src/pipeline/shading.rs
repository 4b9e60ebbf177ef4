use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::consts::{DARKFIELD_SUFFIX, FLATFIELD_SUFFIX};
use crate::error::{Result, StitcherError};
use crate::external::{ShadingRequest, ShadingTool};

/// Flat-field and dark-field profiles of one stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadingProfiles {
    pub flatfield: PathBuf,
    pub darkfield: PathBuf,
}

impl ShadingProfiles {
    fn exist(&self) -> bool {
        self.flatfield.exists() && self.darkfield.exists()
    }
}

/// Where the profiles for `experiment_name` are written inside `output_dir`.
pub fn profile_paths(output_dir: &Path, experiment_name: &str) -> ShadingProfiles {
    ShadingProfiles {
        flatfield: output_dir.join(format!("{experiment_name}{FLATFIELD_SUFFIX}")),
        darkfield: output_dir.join(format!("{experiment_name}{DARKFIELD_SUFFIX}")),
    }
}

/// Estimate shading profiles for `stack`, reusing them when both already exist.
pub fn generate_profiles(
    tool: &dyn ShadingTool,
    stack: &Path,
    output_dir: &Path,
    experiment_name: &str,
) -> Result<ShadingProfiles> {
    let profiles = profile_paths(output_dir, experiment_name);
    if profiles.exist() {
        info!("Shading profiles already exist. Skipping calculations");
        return Ok(profiles);
    }

    if !stack.exists() {
        error!(stack = %stack.display(), "Stack not found");
        return Err(StitcherError::NotFound(stack.to_path_buf()));
    }
    if !output_dir.is_dir() {
        error!(output_dir = %output_dir.display(), "Output directory not found");
        return Err(StitcherError::NotFound(output_dir.to_path_buf()));
    }

    info!(tool = tool.name(), "Calculating shading profiles");
    tool.estimate_profiles(&ShadingRequest {
        stack: stack.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        experiment_name: experiment_name.to_string(),
    })?;

    for profile in [&profiles.flatfield, &profiles.darkfield] {
        if !profile.exists() {
            return Err(StitcherError::tool(
                tool.name(),
                format!("finished without writing '{}'", profile.display()),
            ));
        }
    }
    debug!(
        flatfield = %profiles.flatfield.display(),
        darkfield = %profiles.darkfield.display(),
        "Shading profiles written"
    );
    Ok(profiles)
}
