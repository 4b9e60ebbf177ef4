use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::consts::CZI_AUTOSTITCH_OPTION;
use crate::error::{Result, StitcherError};
use crate::io::{FormatEngine, ReaderOptions, WriterOptions};

use super::types::{PipelineStage, ProgressReporter};

/// Convert a tiled multi-series acquisition into a planar stack.
///
/// Every series is copied plane by plane, in order, with the vendor reader's
/// auto-stitching switched off so each tile stays its own series. An existing
/// `output` is returned untouched without opening `input`.
pub fn normalize(
    format: &dyn FormatEngine,
    input: &Path,
    output: &Path,
    tile_size: (u32, u32),
    reporter: &dyn ProgressReporter,
) -> Result<PathBuf> {
    if !input.exists() {
        error!(input = %input.display(), "Input file not found");
        return Err(StitcherError::NotFound(input.to_path_buf()));
    }
    if output.exists() {
        info!(output = %output.display(), "Stacked tiles already exist. Skipping conversion");
        return Ok(output.to_path_buf());
    }

    debug!(input = %input.display(), output = %output.display(), "Normalizing acquisition");
    if let Err(e) = copy_series(format, input, output, tile_size, reporter) {
        if output.exists() {
            warn!(output = %output.display(), "Removing partial stack");
            fs::remove_file(output)?;
        }
        return Err(e);
    }
    Ok(output.to_path_buf())
}

fn copy_series(
    format: &dyn FormatEngine,
    input: &Path,
    output: &Path,
    tile_size: (u32, u32),
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let mut options = ReaderOptions::default();
    options.set_bool(CZI_AUTOSTITCH_OPTION, false);
    let mut reader = format.open(input, &options)?;

    let writer_options = WriterOptions {
        tile_size: Some(tile_size),
    };
    let mut writer = format.create(output, reader.metadata(), &writer_options)?;

    let series_count = reader.series_count();
    info!(series = series_count, "Converting tiled image to stacked");
    reporter.begin_stage(PipelineStage::Normalizing, Some(series_count));

    for series in 0..series_count {
        reader.set_series(series)?;
        writer.set_series(series)?;
        for plane in 0..reader.image_count() {
            let bytes = reader.open_bytes(plane)?;
            writer.save_bytes(plane, &bytes)?;
        }
        reporter.advance(series + 1);
    }

    writer.close()?;
    reporter.finish_stage();
    Ok(())
}
