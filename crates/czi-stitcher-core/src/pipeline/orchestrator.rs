use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::consts::{OUTPUT_EXTENSION, STACK_FILENAME};
use crate::error::{Result, StitcherError};
use crate::external::{ShadingTool, StitchEngine};
use crate::io::FormatEngine;
use crate::scratch::ScratchDir;

use super::config::PipelineConfig;
use super::merge::merge;
use super::normalize::normalize;
use super::shading::generate_profiles;
use super::stitch::{stitch, StitchOutcome, StitchParams};
use super::types::{AcquisitionReport, NoOpReporter, PipelineStage, ProgressReporter};

/// The engines a run delegates to. The format engine is shared by every stage.
#[derive(Clone, Copy)]
pub struct Engines<'a> {
    pub format: &'a dyn FormatEngine,
    pub stitcher: &'a dyn StitchEngine,
    pub shading: &'a dyn ShadingTool,
}

/// File name of `input` up to its first `.`: `sample.czi` gives `sample`.
pub fn acquisition_basename(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}

/// Run every stage for one acquisition, writing intermediates into `scratch`.
pub fn process_acquisition(
    input: &Path,
    scratch: &ScratchDir,
    output: &Path,
    config: &PipelineConfig,
    engines: &Engines<'_>,
    reporter: &dyn ProgressReporter,
) -> Result<PathBuf> {
    let stack = scratch.path().join(STACK_FILENAME);
    let tile_size = (config.normalize.tile_size_x, config.normalize.tile_size_y);
    normalize(engines.format, input, &stack, tile_size, reporter)?;

    reporter.begin_stage(PipelineStage::ShadingProfiles, None);
    let profiles = generate_profiles(
        engines.shading,
        &stack,
        scratch.path(),
        &config.shading.experiment_name,
    )?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Stitching, None);
    let params = StitchParams::from_config(vec![stack.clone()], scratch.path(), &config.stitch)
        .with_profiles(vec![profiles.flatfield], vec![profiles.darkfield]);
    let mosaics = match stitch(engines.stitcher, &params)? {
        StitchOutcome::Computed(paths) | StitchOutcome::Cached(paths) => paths,
        StitchOutcome::Rejected(reason) => return Err(StitcherError::Usage(reason)),
    };
    reporter.finish_stage();
    if mosaics.is_empty() {
        return Err(StitcherError::tool(
            engines.stitcher.name(),
            format!("no mosaics found in '{}'", scratch.path().display()),
        ));
    }

    let channels: Vec<usize> = mosaics
        .iter()
        .enumerate()
        .map(|(i, path)| params.channel_of(path).unwrap_or(i))
        .collect();
    let transforms = config.transforms();
    merge(engines.format, &mosaics, &channels, &stack, output, &transforms, reporter)
}

/// Process every input in order; a failure only stops its own acquisition.
pub fn run_batch(inputs: &[PathBuf], config: &PipelineConfig, engines: &Engines<'_>) -> Vec<AcquisitionReport> {
    run_batch_reported(inputs, config, engines, Arc::new(NoOpReporter))
}

/// Run the batch with a thread-safe progress reporter.
pub fn run_batch_reported(
    inputs: &[PathBuf],
    config: &PipelineConfig,
    engines: &Engines<'_>,
    reporter: Arc<dyn ProgressReporter>,
) -> Vec<AcquisitionReport> {
    let total = inputs.len();
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            reporter.begin_acquisition(input, index, total);
            let started = Instant::now();
            let basename = acquisition_basename(input);
            let output = config.output_dir.join(format!("{basename}.{OUTPUT_EXTENSION}"));
            info!(input = %input.display(), output = %output.display(), "Processing acquisition");

            let result = prepare(config, &basename).and_then(|scratch| {
                process_acquisition(input, &scratch, &output, config, engines, reporter.as_ref())
            });
            let elapsed = started.elapsed();
            match &result {
                Ok(path) => info!(
                    output = %path.display(),
                    seconds = elapsed.as_secs_f64(),
                    "Acquisition complete"
                ),
                Err(e) => error!(input = %input.display(), error = %e, "Acquisition failed"),
            }
            AcquisitionReport {
                input: input.clone(),
                output,
                result,
                elapsed,
            }
        })
        .collect()
}

fn prepare(config: &PipelineConfig, basename: &str) -> Result<ScratchDir> {
    let scratch = ScratchDir::at(config.scratch_root.join(basename));
    scratch.ensure()?;
    if !config.output_dir.is_dir() {
        std::fs::create_dir_all(&config.output_dir)?;
    }
    Ok(scratch)
}
