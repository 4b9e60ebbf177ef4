use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use czi_stitcher_core::error::{Result, StitcherError};
use czi_stitcher_core::external::{ShadingRequest, ShadingTool, StitchEngine, StitchRequest};
use czi_stitcher_core::io::{
    FormatEngine, OmeTiffEngine, PixelType, PlaneReader, PlaneWriter, ReaderOptions, WriterOptions,
};
use czi_stitcher_core::ome::OmeMetadata;

/// Grid of the synthetic acquisitions: 2x2 tiles.
pub const TILES_X: u32 = 2;
pub const TILES_Y: u32 = 2;
pub const CHANNELS: u32 = 3;

// ---------------------------------------------------------------------------
// Format engine wrapper
// ---------------------------------------------------------------------------

/// Native engine that records every open and create call.
#[derive(Default)]
pub struct CountingFormat {
    inner: OmeTiffEngine,
    pub opened: Mutex<Vec<(PathBuf, ReaderOptions)>>,
    pub created: Mutex<Vec<PathBuf>>,
}

impl CountingFormat {
    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl FormatEngine for CountingFormat {
    fn name(&self) -> &str {
        "counting"
    }

    fn open(&self, path: &Path, options: &ReaderOptions) -> Result<Box<dyn PlaneReader>> {
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), options.clone()));
        self.inner.open(path, options)
    }

    fn create(
        &self,
        path: &Path,
        metadata: &OmeMetadata,
        options: &WriterOptions,
    ) -> Result<Box<dyn PlaneWriter>> {
        self.created.lock().unwrap().push(path.to_path_buf());
        self.inner.create(path, metadata, options)
    }
}

// ---------------------------------------------------------------------------
// Stitching engine fake
// ---------------------------------------------------------------------------

/// Places tile `s` of each channel at grid cell (s % TILES_X, s / TILES_X)
/// and writes one single-plane mosaic per channel.
#[derive(Default)]
pub struct FakeStitcher {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<StitchRequest>>,
}

impl FakeStitcher {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<StitchRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl StitchEngine for FakeStitcher {
    fn name(&self) -> &str {
        "fake-stitcher"
    }

    fn process_single(&self, request: &StitchRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let engine = OmeTiffEngine;
        let mut reader = engine.open(&request.inputs[0], &ReaderOptions::default())?;
        let tile_w = reader.size_x() as usize;
        let tile_h = reader.size_y() as usize;
        let pixel_type = reader.pixel_type();
        let bps = pixel_type.bytes_per_sample();
        let width = tile_w * TILES_X as usize;
        let height = tile_h * TILES_Y as usize;

        let channels: Vec<usize> = match request.mosaic.channels {
            Some(ref c) => c.clone(),
            None => (0..reader.image_count()).collect(),
        };
        let template = request.output_template.to_string_lossy().into_owned();

        for channel in channels {
            let mut mosaic = vec![0u8; width * height * bps];
            for series in 0..reader.series_count() {
                reader.set_series(series)?;
                let tile = reader.open_bytes(channel)?;
                let x0 = (series % TILES_X as usize) * tile_w;
                let y0 = (series / TILES_X as usize) * tile_h;
                for row in 0..tile_h {
                    let src = &tile[row * tile_w * bps..(row + 1) * tile_w * bps];
                    let start = ((y0 + row) * width + x0) * bps;
                    mosaic[start..start + tile_w * bps].copy_from_slice(src);
                }
            }
            let path = PathBuf::from(template.replace("{channel}", &channel.to_string()));
            write_single_plane(&path, width as u32, height as u32, pixel_type, &mosaic)?;
        }
        Ok(())
    }
}

/// Stitcher that always fails, for error-path tests.
pub struct FailingStitcher;

impl StitchEngine for FailingStitcher {
    fn name(&self) -> &str {
        "failing-stitcher"
    }

    fn process_single(&self, _request: &StitchRequest) -> Result<()> {
        Err(StitcherError::ExternalTool {
            tool: "failing-stitcher".into(),
            message: "boom".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Shading tool fake
// ---------------------------------------------------------------------------

pub struct FakeShading {
    pub calls: AtomicUsize,
    /// When false the tool "succeeds" without writing anything.
    pub writes_outputs: bool,
}

impl FakeShading {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            writes_outputs: true,
        }
    }

    pub fn silent() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            writes_outputs: false,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShadingTool for FakeShading {
    fn name(&self) -> &str {
        "fake-shading"
    }

    fn estimate_profiles(&self, request: &ShadingRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.writes_outputs {
            let name = &request.experiment_name;
            let flat = vec![0u8; 4 * 4 * 4];
            write_single_plane(
                &request.output_dir.join(format!("{name}-ffp-basic.tif")),
                4,
                4,
                PixelType::Float,
                &flat,
            )?;
            write_single_plane(
                &request.output_dir.join(format!("{name}-dfp-basic.tif")),
                4,
                4,
                PixelType::Float,
                &flat,
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Sample value of tile `series`, channel `channel` at pixel `index`.
pub fn sample_value(series: usize, channel: usize, index: usize) -> u16 {
    (series * 1000 + channel * 100 + index % 97) as u16
}

fn plane_bytes(series: usize, channel: usize, tile: u32) -> Vec<u8> {
    let n = (tile * tile) as usize;
    (0..n)
        .flat_map(|i| sample_value(series, channel, i).to_le_bytes())
        .collect()
}

/// OME-XML for an acquisition: one Image per tile, each with CHANNELS
/// channels pointing at their own FilterSet.
pub fn acquisition_xml(tile: u32) -> String {
    let series = (TILES_X * TILES_Y) as usize;
    let mut instrument = String::from(r#"<Instrument ID="Instrument:0">"#);
    for c in 0..CHANNELS {
        instrument.push_str(&format!(r#"<Dichroic ID="Dichroic:{c}" Model="D{c}"/>"#));
        instrument.push_str(&format!(r#"<Filter ID="Filter:Ex:{c}" Model="EX{c}"/>"#));
        instrument.push_str(&format!(r#"<Filter ID="Filter:Em:{c}" Model="EM{c}"/>"#));
    }
    for c in 0..CHANNELS {
        instrument.push_str(&format!(
            r#"<FilterSet ID="FilterSet:{c}"><ExcitationFilterRef ID="Filter:Ex:{c}"/><DichroicRef ID="Dichroic:{c}"/><EmissionFilterRef ID="Filter:Em:{c}"/></FilterSet>"#
        ));
    }
    instrument.push_str("</Instrument>");

    let mut images = String::new();
    for s in 0..series {
        let mut channels = String::new();
        for c in 0..CHANNELS {
            channels.push_str(&format!(
                r#"<Channel ID="Channel:{s}:{c}" Name="C{c}" SamplesPerPixel="1"><FilterSetRef ID="FilterSet:{c}"/></Channel>"#
            ));
        }
        images.push_str(&format!(
            r#"<Image ID="Image:{s}" Name="sample.czi #{n}"><InstrumentRef ID="Instrument:0"/><Pixels ID="Pixels:{s}" DimensionOrder="XYCZT" Type="uint16" SizeX="{tile}" SizeY="{tile}" SizeZ="1" SizeC="{CHANNELS}" SizeT="1">{channels}</Pixels></Image>"#,
            n = s + 1
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">{instrument}{images}</OME>"#
    )
}

/// Write a synthetic tiled acquisition: TILES_X * TILES_Y series of
/// CHANNELS uint16 planes of `tile` x `tile`.
pub fn write_acquisition(path: &Path, tile: u32) {
    let metadata = OmeMetadata::parse(&acquisition_xml(tile)).unwrap();
    let mut writer = OmeTiffEngine
        .create(path, &metadata, &WriterOptions::default())
        .unwrap();
    for series in 0..(TILES_X * TILES_Y) as usize {
        writer.set_series(series).unwrap();
        for channel in 0..CHANNELS as usize {
            writer
                .save_bytes(channel, &plane_bytes(series, channel, tile))
                .unwrap();
        }
    }
    writer.close().unwrap();
}

/// Write a one-plane OME-TIFF.
pub fn write_single_plane(
    path: &Path,
    width: u32,
    height: u32,
    pixel_type: PixelType,
    bytes: &[u8],
) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = OmeMetadata::single_image(&name, width, height, 1, pixel_type);
    let mut writer = OmeTiffEngine.create(path, &metadata, &WriterOptions::default())?;
    writer.set_series(0)?;
    writer.save_bytes(0, bytes)?;
    writer.close()
}

/// A one-plane interleaved RGB8 OME-TIFF, like a slide preview series.
/// Returns the written bytes.
pub fn write_rgb_preview(path: &Path, width: u32, height: u32) -> Vec<u8> {
    let bytes: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
    let metadata = OmeMetadata::interleaved_image("preview", width, height, 1, 3, PixelType::Uint8);
    let mut writer = OmeTiffEngine
        .create(path, &metadata, &WriterOptions::default())
        .unwrap();
    writer.set_series(0).unwrap();
    writer.save_bytes(0, &bytes).unwrap();
    writer.close().unwrap();
    bytes
}

/// A uint16 mosaic filled with `value`.
pub fn write_mosaic(path: &Path, width: u32, height: u32, value: u16) {
    let bytes: Vec<u8> = (0..width * height).flat_map(|_| value.to_le_bytes()).collect();
    write_single_plane(path, width, height, PixelType::Uint16, &bytes).unwrap();
}

/// Every plane of every series, in order.
pub fn read_all_planes(path: &Path) -> Vec<Vec<Vec<u8>>> {
    let mut reader = OmeTiffEngine.open(path, &ReaderOptions::default()).unwrap();
    let mut series = Vec::new();
    for s in 0..reader.series_count() {
        reader.set_series(s).unwrap();
        let planes = (0..reader.image_count())
            .map(|p| reader.open_bytes(p).unwrap())
            .collect();
        series.push(planes);
    }
    series
}

pub fn read_u16(bytes: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([bytes[index * 2], bytes[index * 2 + 1]])
}
