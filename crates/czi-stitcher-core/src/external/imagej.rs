use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{Result, StitcherError};
use crate::process::run_command;

use super::{ShadingRequest, ShadingTool};

/// Runs the BaSiC shading-correction script in a headless Fiji/ImageJ.
#[derive(Clone, Debug)]
pub struct ImageJHeadless {
    app_path: PathBuf,
    script_path: PathBuf,
}

impl ImageJHeadless {
    pub fn new(app_path: impl Into<PathBuf>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            app_path: app_path.into(),
            script_path: script_path.into(),
        }
    }

    /// Inline script parameters, in the `key='value'` form ImageJ expects.
    pub fn script_parameters(request: &ShadingRequest) -> String {
        format!(
            "filename='{}',output_dir='{}',experiment_name='{}'",
            request.stack.display(),
            request.output_dir.display(),
            request.experiment_name
        )
    }
}

impl ShadingTool for ImageJHeadless {
    fn name(&self) -> &str {
        "imagej"
    }

    fn estimate_profiles(&self, request: &ShadingRequest) -> Result<()> {
        if !self.script_path.is_file() {
            return Err(StitcherError::tool(
                "imagej",
                format!(
                    "BaSiC script not found at '{}'; check script_path",
                    self.script_path.display()
                ),
            ));
        }
        debug!(script = %self.script_path.display(), "Found BaSiC illumination correction script");

        info!(stack = %request.stack.display(), "Running BaSiC in headless ImageJ");
        let script = self.script_path.display().to_string();
        let parameters = Self::script_parameters(request);
        let output = run_command(
            &self.app_path,
            ["--ij2", "--headless", "--run", script.as_str(), parameters.as_str()],
        )?;
        if !output.success() {
            return Err(StitcherError::tool(
                "imagej",
                format!("exited with {}: {}", output.status, output.stderr_tail()),
            ));
        }
        Ok(())
    }
}
