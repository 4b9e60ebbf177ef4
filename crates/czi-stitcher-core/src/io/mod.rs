//! Plane-level access to microscopy image files.
//!
//! Pipeline stages talk to a [`FormatEngine`]: open a file, walk its series
//! and planes as raw little-endian sample bytes, and write planes into a new
//! OME-TIFF carrying a metadata tree.

pub mod bftools;
pub mod ome_tiff;
pub mod runtime;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, StitcherError};
use crate::ome::OmeMetadata;

pub use ome_tiff::OmeTiffEngine;
pub use runtime::{FormatRuntime, RuntimeConfig};

/// Sample type of a plane, named as in the OME `Pixels/@Type` attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float,
    Double,
}

impl PixelType {
    pub fn from_ome(name: &str) -> Result<Self> {
        match name {
            "int8" => Ok(Self::Int8),
            "uint8" => Ok(Self::Uint8),
            "int16" => Ok(Self::Int16),
            "uint16" => Ok(Self::Uint16),
            "int32" => Ok(Self::Int32),
            "uint32" => Ok(Self::Uint32),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            other => Err(StitcherError::UnsupportedPixelType(other.to_string())),
        }
    }

    pub fn as_ome(&self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Map a TIFF SampleFormat (1 = unsigned, 2 = signed, 3 = float) and
    /// BitsPerSample pair.
    pub fn from_tiff(sample_format: u32, bits: u8) -> Result<Self> {
        match (sample_format, bits) {
            (1, 8) => Ok(Self::Uint8),
            (1, 16) => Ok(Self::Uint16),
            (1, 32) => Ok(Self::Uint32),
            (2, 8) => Ok(Self::Int8),
            (2, 16) => Ok(Self::Int16),
            (2, 32) => Ok(Self::Int32),
            (3, 32) => Ok(Self::Float),
            (3, 64) => Ok(Self::Double),
            _ => Err(StitcherError::UnsupportedPixelType(format!(
                "TIFF sample format {sample_format} with {bits} bits"
            ))),
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float => 4,
            Self::Double => 8,
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ome())
    }
}

/// Format-specific reader switches, e.g. `zeissczi.autostitch = false`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    values: BTreeMap<String, String>,
}

impl ReaderOptions {
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.set(key, value.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Layout hints for a new OME-TIFF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Preferred tile size; the height doubles as the strip height.
    pub tile_size: Option<(u32, u32)>,
}

/// An open image file positioned on one series at a time.
pub trait PlaneReader {
    fn path(&self) -> &Path;

    fn series_count(&self) -> usize;

    fn series(&self) -> usize;

    fn set_series(&mut self, series: usize) -> Result<()>;

    /// Number of planes in the current series.
    fn image_count(&self) -> usize;

    fn size_x(&self) -> u32;

    fn size_y(&self) -> u32;

    fn pixel_type(&self) -> PixelType;

    /// Interleaved samples per pixel in the current series; 3 for RGB.
    fn samples_per_pixel(&self) -> u32;

    /// Raw sample bytes (little-endian) of `plane` in the current series.
    fn open_bytes(&mut self, plane: usize) -> Result<Vec<u8>>;

    fn metadata(&self) -> &OmeMetadata;
}

/// A new OME-TIFF being filled plane by plane.
///
/// Planes must arrive in series order and, within a series, in plane order.
pub trait PlaneWriter {
    fn set_series(&mut self, series: usize) -> Result<()>;

    fn save_bytes(&mut self, plane: usize, bytes: &[u8]) -> Result<()>;

    /// Finish the file. Fails if fewer planes were written than the metadata
    /// declares.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Process-wide multi-format reader/writer service.
pub trait FormatEngine: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self, path: &Path, options: &ReaderOptions) -> Result<Box<dyn PlaneReader>>;

    fn create(
        &self,
        path: &Path,
        metadata: &OmeMetadata,
        options: &WriterOptions,
    ) -> Result<Box<dyn PlaneWriter>>;

    /// Load only the metadata tree of `path`.
    fn read_metadata(&self, path: &Path) -> Result<OmeMetadata> {
        let reader = self.open(path, &ReaderOptions::default())?;
        Ok(reader.metadata().clone())
    }
}
