use std::fs::File;
use std::io::{BufReader, Seek, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffKind, TiffKindBig, TiffValue};
use tiff::tags::Tag;
use tiff::TiffResult;
use tracing::{debug, info};

use crate::consts::BIGTIFF_THRESHOLD_BYTES;
use crate::error::{Result, StitcherError};
use crate::ome::xml::Element;
use crate::ome::{OmeMetadata, PixelsInfo};

use super::{FormatEngine, PixelType, PlaneReader, PlaneWriter, ReaderOptions, WriterOptions};

/// Reads TIFF / OME-TIFF files and writes OME-TIFF files natively.
#[derive(Clone, Copy, Debug, Default)]
pub struct OmeTiffEngine;

impl FormatEngine for OmeTiffEngine {
    fn name(&self) -> &str {
        "ome-tiff"
    }

    fn open(&self, path: &Path, options: &ReaderOptions) -> Result<Box<dyn PlaneReader>> {
        if !options.is_empty() {
            debug!(path = %path.display(), "Reader options do not apply to TIFF input");
        }
        Ok(Box::new(OmeTiffReader::open(path)?))
    }

    fn create(
        &self,
        path: &Path,
        metadata: &OmeMetadata,
        options: &WriterOptions,
    ) -> Result<Box<dyn PlaneWriter>> {
        Ok(Box::new(OmeTiffWriter::create(path, metadata, options)?))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct SeriesLayout {
    first_ifd: usize,
    planes: usize,
    size_x: u32,
    size_y: u32,
    pixel_type: PixelType,
    samples: u32,
}

/// Plane reader over a TIFF file. OME-TIFF files expose one series per
/// `<Image>`; plain TIFFs expose a single series with one plane per IFD.
pub struct OmeTiffReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    metadata: OmeMetadata,
    layout: Vec<SeriesLayout>,
    series: usize,
}

impl OmeTiffReader {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StitcherError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| StitcherError::read(path, e))?
            .with_limits(Limits::unlimited());

        let description = decoder.get_tag_ascii_string(Tag::ImageDescription).ok();
        let ifd_count = count_ifds(&mut decoder).map_err(|e| StitcherError::read(path, e))?;

        let ome = match description {
            Some(ref text) if text.contains("<OME") => Some(OmeMetadata::parse(text)?),
            _ => None,
        };

        let (metadata, layout) = match ome {
            Some(metadata) => {
                let layout = layout_from_metadata(path, &metadata, ifd_count)?;
                (metadata, layout)
            }
            None => {
                let (size_x, size_y) = decoder.dimensions().map_err(|e| StitcherError::read(path, e))?;
                let (pixel_type, samples) =
                    decoder_pixel_type(&mut decoder).map_err(|e| StitcherError::read(path, e))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let metadata = OmeMetadata::interleaved_image(
                    &name,
                    size_x,
                    size_y,
                    ifd_count as u32,
                    samples,
                    pixel_type,
                );
                let layout = vec![SeriesLayout {
                    first_ifd: 0,
                    planes: ifd_count,
                    size_x,
                    size_y,
                    pixel_type,
                    samples,
                }];
                (metadata, layout)
            }
        };

        debug!(
            path = %path.display(),
            series = layout.len(),
            ifds = ifd_count,
            "Opened TIFF"
        );

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            metadata,
            layout,
            series: 0,
        })
    }

    fn current(&self) -> &SeriesLayout {
        &self.layout[self.series]
    }
}

impl PlaneReader for OmeTiffReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn series_count(&self) -> usize {
        self.layout.len()
    }

    fn series(&self) -> usize {
        self.series
    }

    fn set_series(&mut self, series: usize) -> Result<()> {
        if series >= self.layout.len() {
            return Err(StitcherError::read(
                &self.path,
                format!("series {series} out of range (total: {})", self.layout.len()),
            ));
        }
        self.series = series;
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.current().planes
    }

    fn size_x(&self) -> u32 {
        self.current().size_x
    }

    fn size_y(&self) -> u32 {
        self.current().size_y
    }

    fn pixel_type(&self) -> PixelType {
        self.current().pixel_type
    }

    fn samples_per_pixel(&self) -> u32 {
        self.current().samples
    }

    fn open_bytes(&mut self, plane: usize) -> Result<Vec<u8>> {
        let layout = *self.current();
        if plane >= layout.planes {
            return Err(StitcherError::read(
                &self.path,
                format!("plane {plane} out of range (total: {})", layout.planes),
            ));
        }
        self.decoder
            .seek_to_image(layout.first_ifd + plane)
            .map_err(|e| StitcherError::read(&self.path, e))?;
        let decoded = self
            .decoder
            .read_image()
            .map_err(|e| StitcherError::read(&self.path, e))?;
        let bytes = samples_to_le_bytes(decoded).map_err(|e| StitcherError::read(&self.path, e))?;

        let expected = layout.size_x as usize
            * layout.size_y as usize
            * layout.samples as usize
            * layout.pixel_type.bytes_per_sample();
        if bytes.len() != expected {
            return Err(StitcherError::read(
                &self.path,
                format!(
                    "plane {plane} holds {} bytes, expected {expected} for {}x{}x{} {}",
                    bytes.len(),
                    layout.size_x,
                    layout.size_y,
                    layout.samples,
                    layout.pixel_type
                ),
            ));
        }
        Ok(bytes)
    }

    fn metadata(&self) -> &OmeMetadata {
        &self.metadata
    }
}

fn count_ifds<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<usize> {
    let mut count = 1;
    while decoder.more_images() {
        decoder.next_image()?;
        count += 1;
    }
    decoder.seek_to_image(0)?;
    Ok(count)
}

/// Sample type and interleaved samples per pixel of the current IFD.
fn decoder_pixel_type<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Result<(PixelType, u32)> {
    let (bits, samples) = match decoder.colortype().map_err(|e| StitcherError::UnsupportedPixelType(e.to_string()))? {
        tiff::ColorType::Gray(bits) => (bits, 1),
        tiff::ColorType::RGB(bits @ (8 | 16)) => (bits, 3),
        other => return Err(StitcherError::UnsupportedPixelType(format!("{other:?}"))),
    };
    let sample_format = decoder.get_tag_u32(Tag::SampleFormat).unwrap_or(1);
    Ok((PixelType::from_tiff(sample_format, bits)?, samples))
}

fn layout_from_metadata(path: &Path, metadata: &OmeMetadata, ifd_count: usize) -> Result<Vec<SeriesLayout>> {
    let mut layout = Vec::with_capacity(metadata.image_count());
    let mut next_ifd = 0usize;
    for image in 0..metadata.image_count() {
        let info = metadata.pixels_info(image)?;
        layout.push(SeriesLayout {
            first_ifd: next_ifd,
            planes: info.plane_count(),
            size_x: info.size_x,
            size_y: info.size_y,
            pixel_type: info.pixel_type,
            samples: info.samples_per_pixel,
        });
        next_ifd += info.plane_count();
    }
    if layout.is_empty() {
        return Err(StitcherError::read(path, "OME-XML declares no images"));
    }
    if next_ifd > ifd_count {
        return Err(StitcherError::read(
            path,
            format!("OME-XML declares {next_ifd} planes but the file holds {ifd_count} IFDs"),
        ));
    }
    Ok(layout)
}

fn samples_to_le_bytes(decoded: DecodingResult) -> std::result::Result<Vec<u8>, String> {
    Ok(match decoded {
        DecodingResult::U8(v) => v,
        DecodingResult::I8(v) => v.into_iter().map(|s| s as u8).collect(),
        DecodingResult::U16(v) => {
            let mut out = vec![0u8; v.len() * 2];
            LittleEndian::write_u16_into(&v, &mut out);
            out
        }
        DecodingResult::I16(v) => {
            let mut out = vec![0u8; v.len() * 2];
            LittleEndian::write_i16_into(&v, &mut out);
            out
        }
        DecodingResult::U32(v) => {
            let mut out = vec![0u8; v.len() * 4];
            LittleEndian::write_u32_into(&v, &mut out);
            out
        }
        DecodingResult::I32(v) => {
            let mut out = vec![0u8; v.len() * 4];
            LittleEndian::write_i32_into(&v, &mut out);
            out
        }
        DecodingResult::F32(v) => {
            let mut out = vec![0u8; v.len() * 4];
            LittleEndian::write_f32_into(&v, &mut out);
            out
        }
        DecodingResult::F64(v) => {
            let mut out = vec![0u8; v.len() * 8];
            LittleEndian::write_f64_into(&v, &mut out);
            out
        }
        _ => return Err("64-bit integer samples are not supported".into()),
    })
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

enum TiffSink {
    Standard(TiffEncoder<File>),
    Big(TiffEncoder<File, TiffKindBig>),
}

/// Sequential OME-TIFF writer. The OME-XML block, with regenerated
/// `TiffData` entries, is stored in the first IFD.
pub struct OmeTiffWriter {
    path: PathBuf,
    sink: TiffSink,
    description: Option<String>,
    layout: Vec<PixelsInfo>,
    written: Vec<usize>,
    series: usize,
    rows_per_strip: Option<u32>,
}

impl OmeTiffWriter {
    pub fn create(path: &Path, metadata: &OmeMetadata, options: &WriterOptions) -> Result<Self> {
        let mut metadata = metadata.clone();
        let layout = (0..metadata.image_count())
            .map(|i| metadata.pixels_info(i))
            .collect::<Result<Vec<_>>>()?;
        if layout.is_empty() {
            return Err(StitcherError::write(path, "metadata describes no images"));
        }
        if let Some(info) = layout.iter().find(|i| !is_writable_layout(i)) {
            return Err(StitcherError::write(
                path,
                unsupported_layout(info.samples_per_pixel, info.pixel_type),
            ));
        }

        let mut first_ifd = 0usize;
        for (image, info) in layout.iter().enumerate() {
            if let Some(pixels) = metadata.pixels_mut(image) {
                pixels.remove_children(|e| e.is("TiffData") || e.is("BinData") || e.is("MetadataOnly"));
                pixels.insert_before(
                    Element::new("TiffData")
                        .with_attr("IFD", first_ifd.to_string())
                        .with_attr("PlaneCount", info.plane_count().to_string()),
                    &["Plane"],
                );
            }
            first_ifd += info.plane_count();
        }
        let description = metadata.to_xml()?;

        let total_bytes: u64 = layout
            .iter()
            .map(|info| info.plane_bytes() as u64 * info.plane_count() as u64)
            .sum();
        let file = File::create(path).map_err(|e| StitcherError::write(path, e))?;
        let sink = if total_bytes > BIGTIFF_THRESHOLD_BYTES {
            info!(path = %path.display(), bytes = total_bytes, "Writing BigTIFF");
            TiffSink::Big(TiffEncoder::new_big(file).map_err(|e| StitcherError::write(path, e))?)
        } else {
            TiffSink::Standard(TiffEncoder::new(file).map_err(|e| StitcherError::write(path, e))?)
        };

        Ok(Self {
            path: path.to_path_buf(),
            sink,
            description: Some(description),
            written: vec![0; layout.len()],
            layout,
            series: 0,
            rows_per_strip: options.tile_size.map(|(_, h)| h),
        })
    }
}

impl PlaneWriter for OmeTiffWriter {
    fn set_series(&mut self, series: usize) -> Result<()> {
        if series >= self.layout.len() {
            return Err(StitcherError::write(
                &self.path,
                format!("series {series} out of range (total: {})", self.layout.len()),
            ));
        }
        self.series = series;
        Ok(())
    }

    fn save_bytes(&mut self, plane: usize, bytes: &[u8]) -> Result<()> {
        let series = self.series;
        let info = self.layout[series];

        let earlier_complete = (0..series).all(|s| self.written[s] == self.layout[s].plane_count());
        if !earlier_complete || plane != self.written[series] || plane >= info.plane_count() {
            return Err(StitcherError::write(
                &self.path,
                format!(
                    "planes must be written in order: got series {series} plane {plane}, expected plane {}",
                    self.written[series]
                ),
            ));
        }
        if bytes.len() != info.plane_bytes() {
            return Err(StitcherError::write(
                &self.path,
                format!(
                    "plane {plane} has {} bytes, expected {} for {}x{}x{} {}",
                    bytes.len(),
                    info.plane_bytes(),
                    info.size_x,
                    info.size_y,
                    info.samples_per_pixel,
                    info.pixel_type
                ),
            ));
        }

        let description = self.description.take();
        let result = match &mut self.sink {
            TiffSink::Standard(encoder) => {
                write_page(encoder, &info, bytes, description.as_deref(), self.rows_per_strip)
            }
            TiffSink::Big(encoder) => {
                write_page(encoder, &info, bytes, description.as_deref(), self.rows_per_strip)
            }
        };
        result.map_err(|e| StitcherError::write(&self.path, e))?;
        self.written[series] += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let expected: usize = self.layout.iter().map(PixelsInfo::plane_count).sum();
        let written: usize = self.written.iter().sum();
        if written != expected {
            return Err(StitcherError::write(
                &self.path,
                format!("incomplete file: wrote {written} of {expected} planes"),
            ));
        }
        debug!(path = %self.path.display(), planes = written, "Closed OME-TIFF");
        Ok(())
    }
}

fn write_page<W: Write + Seek, K: TiffKind>(
    encoder: &mut TiffEncoder<W, K>,
    info: &PixelsInfo,
    bytes: &[u8],
    description: Option<&str>,
    rows_per_strip: Option<u32>,
) -> std::result::Result<(), String> {
    let result = match (info.samples_per_pixel, info.pixel_type) {
        (1, _) => write_gray_page(encoder, info, bytes, description, rows_per_strip),
        (3, PixelType::Uint8) => put_image::<_, _, colortype::RGB8>(encoder, info, bytes, description, rows_per_strip),
        (3, PixelType::Uint16) => {
            let mut samples = vec![0u16; bytes.len() / 2];
            LittleEndian::read_u16_into(bytes, &mut samples);
            put_image::<_, _, colortype::RGB16>(encoder, info, &samples, description, rows_per_strip)
        }
        (samples, pixel_type) => return Err(unsupported_layout(samples, pixel_type)),
    };
    result.map_err(|e| e.to_string())
}

fn is_writable_layout(info: &PixelsInfo) -> bool {
    matches!(
        (info.samples_per_pixel, info.pixel_type),
        (1, _) | (3, PixelType::Uint8 | PixelType::Uint16)
    )
}

fn unsupported_layout(samples: u32, pixel_type: PixelType) -> String {
    format!("{samples} interleaved {pixel_type} samples per pixel are not supported")
}

fn write_gray_page<W: Write + Seek, K: TiffKind>(
    encoder: &mut TiffEncoder<W, K>,
    info: &PixelsInfo,
    bytes: &[u8],
    description: Option<&str>,
    rows_per_strip: Option<u32>,
) -> TiffResult<()> {
    match info.pixel_type {
        PixelType::Uint8 => put_image::<_, _, colortype::Gray8>(encoder, info, bytes, description, rows_per_strip),
        PixelType::Int8 => {
            let samples: Vec<i8> = bytes.iter().map(|&b| b as i8).collect();
            put_image::<_, _, colortype::GrayI8>(encoder, info, &samples, description, rows_per_strip)
        }
        PixelType::Uint16 => {
            let mut samples = vec![0u16; bytes.len() / 2];
            LittleEndian::read_u16_into(bytes, &mut samples);
            put_image::<_, _, colortype::Gray16>(encoder, info, &samples, description, rows_per_strip)
        }
        PixelType::Int16 => {
            let mut samples = vec![0i16; bytes.len() / 2];
            LittleEndian::read_i16_into(bytes, &mut samples);
            put_image::<_, _, colortype::GrayI16>(encoder, info, &samples, description, rows_per_strip)
        }
        PixelType::Uint32 => {
            let mut samples = vec![0u32; bytes.len() / 4];
            LittleEndian::read_u32_into(bytes, &mut samples);
            put_image::<_, _, colortype::Gray32>(encoder, info, &samples, description, rows_per_strip)
        }
        PixelType::Int32 => {
            let mut samples = vec![0i32; bytes.len() / 4];
            LittleEndian::read_i32_into(bytes, &mut samples);
            put_image::<_, _, colortype::GrayI32>(encoder, info, &samples, description, rows_per_strip)
        }
        PixelType::Float => {
            let mut samples = vec![0f32; bytes.len() / 4];
            LittleEndian::read_f32_into(bytes, &mut samples);
            put_image::<_, _, colortype::Gray32Float>(encoder, info, &samples, description, rows_per_strip)
        }
        PixelType::Double => {
            let mut samples = vec![0f64; bytes.len() / 8];
            LittleEndian::read_f64_into(bytes, &mut samples);
            put_image::<_, _, colortype::Gray64Float>(encoder, info, &samples, description, rows_per_strip)
        }
    }
}

fn put_image<W: Write + Seek, K: TiffKind, C: ColorType>(
    encoder: &mut TiffEncoder<W, K>,
    info: &PixelsInfo,
    samples: &[C::Inner],
    description: Option<&str>,
    rows_per_strip: Option<u32>,
) -> TiffResult<()>
where
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(info.size_x, info.size_y)?;
    if let Some(text) = description {
        image.encoder().write_tag(Tag::ImageDescription, text)?;
    }
    if let Some(rows) = rows_per_strip {
        image.rows_per_strip(rows.clamp(1, info.size_y.max(1)))?;
    }
    image.write_data(samples)
}
