use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use czi_stitcher_core::consts::CHANNEL_PLACEHOLDER;
use czi_stitcher_core::io::FormatRuntime;
use czi_stitcher_core::pipeline::config::PipelineConfig;
use czi_stitcher_core::pipeline::{run_batch_reported, Engines};
use tracing::{debug, info};

use crate::progress::BarReporter;
use crate::summary::{print_batch_report, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Tiled acquisitions to process
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Flip tile positions left-to-right
    #[arg(long)]
    pub flip_x: bool,

    /// Flip tile positions top-to-bottom
    #[arg(long)]
    pub flip_y: bool,

    /// Mosaic file name; must contain {channel}, may contain {cycle}
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub filename_format: Option<String>,

    /// Root directory for intermediate files
    #[arg(long = "tmp", value_name = "DIR")]
    pub scratch_root: Option<PathBuf>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &RunArgs) -> Result<ExitCode> {
    if args.files.is_empty() {
        bail!("No input files given; see --help");
    }
    let config = build_config(args)?;
    if !config.stitch.filename_format.contains(CHANNEL_PLACEHOLDER) {
        bail!(
            "Filename format '{}' must contain {CHANNEL_PLACEHOLDER}",
            config.stitch.filename_format
        );
    }

    print_run_summary(&config, &args.files);

    let runtime = FormatRuntime::init(config.runtime()).context("Failed to start format runtime")?;
    debug!(stitcher = %config.ashlar_path.display(), imagej = %config.app_path.display(), "Engines configured");
    let stitcher = config.stitcher();
    let shading = config.shading_tool();
    let engines = Engines {
        format: &runtime,
        stitcher: &stitcher,
        shading: &shading,
    };

    info!(inputs = args.files.len(), "Starting batch");
    let reporter = Arc::new(BarReporter::new());
    let reports = run_batch_reported(&args.files, &config, &engines, reporter.clone());
    reporter.finish();
    runtime.shutdown().context("Failed to shut down format runtime")?;

    print_batch_report(&reports);
    if reports.iter().all(|r| r.is_ok()) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Config file (or defaults) with command-line flags layered on top.
fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = super::load_config(args.config.as_deref())?;
    if let Some(ref output) = args.output {
        config.output_dir = output.clone();
    }
    if let Some(ref root) = args.scratch_root {
        config.scratch_root = root.clone();
    }
    if let Some(ref format) = args.filename_format {
        config.stitch.filename_format = format.clone();
    }
    config.stitch.flip_x |= args.flip_x;
    config.stitch.flip_y |= args.flip_y;
    Ok(config)
}
