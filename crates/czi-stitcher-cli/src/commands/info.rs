use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use czi_stitcher_core::io::{FormatEngine, FormatRuntime, ReaderOptions, RuntimeConfig};

#[derive(Args)]
pub struct InfoArgs {
    /// Image file (OME-TIFF, TIFF or any format bfconvert reads)
    pub file: PathBuf,

    /// Directory holding bfconvert
    #[arg(long)]
    pub bftools_path: Option<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let runtime = FormatRuntime::init(RuntimeConfig {
        bftools_path: args.bftools_path.clone(),
        debug: false,
    })?;
    let mut reader = runtime
        .open(&args.file, &ReaderOptions::default())
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    println!("File:          {}", args.file.display());
    println!("Series:        {}", reader.series_count());
    for series in 0..reader.series_count() {
        reader.set_series(series)?;
        let interleaved = if reader.samples_per_pixel() > 1 { " (interleaved)" } else { "" };
        println!(
            "  #{:<4} {} plane(s), {}x{}x{} {}{}",
            series,
            reader.image_count(),
            reader.size_x(),
            reader.size_y(),
            reader.samples_per_pixel(),
            reader.pixel_type(),
            interleaved
        );
    }

    let metadata = reader.metadata();
    println!("Images:        {}", metadata.image_count());
    println!("Channels:      {}", metadata.channel_count(0));
    println!("Filter sets:   {}", metadata.filter_set_count());
    println!("Experimenters: {}", metadata.experimenter_count());

    drop(reader);
    runtime.shutdown()?;
    Ok(())
}
