use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{Result, StitcherError};
use crate::io::{FormatEngine, PixelType, ReaderOptions, WriterOptions};
use crate::ome::{retain_single_image, MetadataTransform, OmeMetadata};

use super::types::{PipelineStage, ProgressReporter};

/// Combine single-plane channel mosaics into one multi-plane OME-TIFF.
///
/// `channels[i]` is the source channel that `mosaics[i]` was stitched from;
/// the Channel entries of `metadata_source` are selected to match. The
/// metadata is reduced to one image sized like the first mosaic, passed
/// through `transforms` in order, and written along with one plane per
/// mosaic. Later mosaics of another size are cropped or zero-padded to the
/// first one. Any existing `output` is replaced; a failed write leaves no
/// output behind.
pub fn merge(
    format: &dyn FormatEngine,
    mosaics: &[PathBuf],
    channels: &[usize],
    metadata_source: &Path,
    output: &Path,
    transforms: &[MetadataTransform],
    reporter: &dyn ProgressReporter,
) -> Result<PathBuf> {
    let Some(first) = mosaics.first() else {
        return Err(StitcherError::Usage("no channel mosaics to merge".into()));
    };
    if channels.len() != mosaics.len() {
        return Err(StitcherError::Usage(format!(
            "{} mosaics but {} channel indices",
            mosaics.len(),
            channels.len()
        )));
    }
    for path in mosaics.iter().map(PathBuf::as_path).chain([metadata_source]) {
        if !path.exists() {
            error!(path = %path.display(), "Merge input not found");
            return Err(StitcherError::NotFound(path.to_path_buf()));
        }
    }

    info!(channels = mosaics.len(), output = %output.display(), "Merging channels");
    let geometry = {
        let reader = format.open(first, &ReaderOptions::default())?;
        PlaneGeometry {
            size_x: reader.size_x(),
            size_y: reader.size_y(),
            pixel_type: reader.pixel_type(),
        }
    };
    debug!(
        size_x = geometry.size_x,
        size_y = geometry.size_y,
        pixel_type = %geometry.pixel_type,
        "Mosaic geometry"
    );

    reporter.begin_stage(PipelineStage::Reconciling, None);
    let metadata = reconcile(format, metadata_source, output, channels, &geometry, transforms)?;
    reporter.finish_stage();

    if output.exists() {
        debug!(output = %output.display(), "Deleting previous output");
        fs::remove_file(output)?;
    }

    reporter.begin_stage(PipelineStage::Merging, Some(mosaics.len()));
    if let Err(e) = write_planes(format, mosaics, output, &metadata, &geometry, reporter) {
        if output.exists() {
            warn!(output = %output.display(), "Removing partial merge output");
            fs::remove_file(output)?;
        }
        return Err(e);
    }
    reporter.finish_stage();

    info!(output = %output.display(), "Merged output written");
    Ok(output.to_path_buf())
}

#[derive(Clone, Copy, Debug)]
struct PlaneGeometry {
    size_x: u32,
    size_y: u32,
    pixel_type: PixelType,
}

fn reconcile(
    format: &dyn FormatEngine,
    metadata_source: &Path,
    output: &Path,
    channels: &[usize],
    geometry: &PlaneGeometry,
    transforms: &[MetadataTransform],
) -> Result<OmeMetadata> {
    let mut metadata = format.read_metadata(metadata_source)?;
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    retain_single_image(&mut metadata, &name, geometry.size_x, geometry.size_y)?;
    metadata.set_pixel_type(0, geometry.pixel_type)?;

    let found = metadata.select_channels(0, channels)?;
    if found != channels.len() {
        warn!(
            requested = ?channels,
            found,
            "Metadata source lacks some mosaic channels"
        );
    }
    metadata.set_samples_per_pixel(0, 1)?;

    let info = metadata.pixels_info(0)?;
    if info.plane_count() != channels.len() || info.size_c as usize != channels.len() {
        warn!(
            declared = info.plane_count(),
            channels = channels.len(),
            "Plane count differs from channel count; rewriting extents"
        );
        metadata.set_plane_extents(0, 1, channels.len() as u32, 1)?;
    }

    Ok(transforms.iter().fold(metadata, |metadata, transform| {
        debug!(%transform, "Applying metadata transform");
        transform.apply(metadata)
    }))
}

fn write_planes(
    format: &dyn FormatEngine,
    mosaics: &[PathBuf],
    output: &Path,
    metadata: &OmeMetadata,
    geometry: &PlaneGeometry,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let mut writer = format.create(output, metadata, &WriterOptions::default())?;
    writer.set_series(0)?;
    for (plane, path) in mosaics.iter().enumerate() {
        debug!(plane, mosaic = %path.display(), "Writing plane");
        let mut reader = format.open(path, &ReaderOptions::default())?;
        if reader.pixel_type() != geometry.pixel_type {
            return Err(StitcherError::write(
                output,
                format!(
                    "mosaic '{}' is {}, expected {}",
                    path.display(),
                    reader.pixel_type(),
                    geometry.pixel_type
                ),
            ));
        }
        let (size_x, size_y) = (reader.size_x(), reader.size_y());
        let bytes = reader.open_bytes(0)?;
        let bytes = if (size_x, size_y) == (geometry.size_x, geometry.size_y) {
            bytes
        } else {
            warn!(
                mosaic = %path.display(),
                size_x,
                size_y,
                target_x = geometry.size_x,
                target_y = geometry.size_y,
                "Mosaic size differs from the first channel; cropping or padding"
            );
            fit_plane(&bytes, (size_x, size_y), (geometry.size_x, geometry.size_y), geometry.pixel_type)
        };
        writer.save_bytes(plane, &bytes)?;
        reporter.advance(plane + 1);
    }
    writer.close()
}

/// Crop or zero-pad a plane to `to`, anchored at the top-left corner.
fn fit_plane(bytes: &[u8], from: (u32, u32), to: (u32, u32), pixel_type: PixelType) -> Vec<u8> {
    let sample = pixel_type.bytes_per_sample();
    let src_row = from.0 as usize * sample;
    let dst_row = to.0 as usize * sample;
    let copy = src_row.min(dst_row);
    let mut out = vec![0u8; dst_row * to.1 as usize];
    if copy == 0 {
        return out;
    }
    for (dst, src) in out.chunks_exact_mut(dst_row).zip(bytes.chunks_exact(src_row)) {
        dst[..copy].copy_from_slice(&src[..copy]);
    }
    out
}
