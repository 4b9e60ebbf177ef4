use crate::error::{Result, StitcherError};
use crate::io::PixelType;

use super::xml::{self, Element};

const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

/// Children of `<OME>` that the schema places before `<Experimenter>`.
const BEFORE_EXPERIMENTER: &[&str] = &[
    "ExperimenterGroup",
    "Instrument",
    "Image",
    "StructuredAnnotations",
    "ROI",
    "BinaryOnly",
];

/// Children of `<Pixels>` that the schema places after `<Channel>`.
const AFTER_CHANNEL: &[&str] = &["BinData", "TiffData", "MetadataOnly", "Plane"];

/// Children of `<Channel>` that the schema places after `<FilterSetRef>`.
const AFTER_FILTER_SET_REF: &[&str] = &["AnnotationRef", "LightPath"];

/// An OME-XML metadata tree loaded from one file.
///
/// The tree keeps every element it was parsed with; the accessors below only
/// cover the parts the pipeline reads or rewrites.
#[derive(Clone, Debug, PartialEq)]
pub struct OmeMetadata {
    root: Element,
}

/// Geometry and sample type of one `<Pixels>` block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelsInfo {
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub size_c: u32,
    pub size_t: u32,
    pub pixel_type: PixelType,
    /// Interleaved samples per pixel; 3 for an RGB plane.
    pub samples_per_pixel: u32,
}

impl PixelsInfo {
    /// Number of 2D planes stored for this block. Interleaved channels share
    /// a plane.
    pub fn plane_count(&self) -> usize {
        let planes_c = (self.size_c / self.samples_per_pixel.max(1)).max(1);
        self.size_z as usize * planes_c as usize * self.size_t as usize
    }

    pub fn plane_bytes(&self) -> usize {
        self.size_x as usize
            * self.size_y as usize
            * self.samples_per_pixel.max(1) as usize
            * self.pixel_type.bytes_per_sample()
    }
}

impl OmeMetadata {
    pub fn parse(xml: &str) -> Result<Self> {
        let root = xml::parse(xml)?;
        if !root.is("OME") {
            return Err(StitcherError::InvalidMetadata(format!(
                "root element is <{}>, expected <OME>",
                root.name
            )));
        }
        Ok(Self { root })
    }

    pub fn to_xml(&self) -> Result<String> {
        xml::serialize(&self.root)
    }

    /// Minimal tree describing a single image of `size_c` planes.
    pub fn single_image(name: &str, size_x: u32, size_y: u32, size_c: u32, pixel_type: PixelType) -> Self {
        Self::interleaved_image(name, size_x, size_y, size_c, 1, pixel_type)
    }

    /// Like [`single_image`](Self::single_image), with `samples` interleaved
    /// channels stored in each of the `planes` planes.
    pub fn interleaved_image(
        name: &str,
        size_x: u32,
        size_y: u32,
        planes: u32,
        samples: u32,
        pixel_type: PixelType,
    ) -> Self {
        let samples = samples.max(1);
        let size_c = planes * samples;
        let mut pixels = Element::new("Pixels")
            .with_attr("ID", "Pixels:0")
            .with_attr("DimensionOrder", "XYCZT")
            .with_attr("Type", pixel_type.as_ome())
            .with_attr("SizeX", size_x.to_string())
            .with_attr("SizeY", size_y.to_string())
            .with_attr("SizeZ", "1")
            .with_attr("SizeC", size_c.to_string())
            .with_attr("SizeT", "1");
        for c in 0..planes {
            pixels = pixels.with_child(
                Element::new("Channel")
                    .with_attr("ID", format!("Channel:0:{c}"))
                    .with_attr("SamplesPerPixel", samples.to_string()),
            );
        }
        let image = Element::new("Image")
            .with_attr("ID", "Image:0")
            .with_attr("Name", name)
            .with_child(pixels);
        let root = Element::new("OME")
            .with_attr("xmlns", OME_NAMESPACE)
            .with_child(image);
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    // -- Images -------------------------------------------------------------

    pub fn image_count(&self) -> usize {
        self.root.children_named("Image").count()
    }

    pub fn image(&self, index: usize) -> Option<&Element> {
        self.root.children_named("Image").nth(index)
    }

    pub fn image_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.root.children_named_mut("Image").nth(index)
    }

    pub fn image_name(&self, index: usize) -> Option<&str> {
        self.image(index).and_then(|i| i.attr("Name"))
    }

    pub fn pixels(&self, image: usize) -> Option<&Element> {
        self.image(image).and_then(|i| i.child("Pixels"))
    }

    pub fn pixels_mut(&mut self, image: usize) -> Option<&mut Element> {
        self.image_mut(image).and_then(|i| i.child_mut("Pixels"))
    }

    /// Parsed geometry of image `image`'s Pixels block.
    pub fn pixels_info(&self, image: usize) -> Result<PixelsInfo> {
        let pixels = self
            .pixels(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        let dim = |key: &str, default: Option<u32>| -> Result<u32> {
            match pixels.attr(key) {
                Some(v) => v.trim().parse().map_err(|_| {
                    StitcherError::InvalidMetadata(format!("Pixels {key}='{v}' is not a positive integer"))
                }),
                None => default.ok_or_else(|| {
                    StitcherError::InvalidMetadata(format!("Pixels of Image {image} lacks {key}"))
                }),
            }
        };
        let type_name = pixels
            .attr("Type")
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Pixels of Image {image} lacks Type")))?;
        let size_c = dim("SizeC", Some(1))?;
        let samples_per_pixel = match pixels.child("Channel").and_then(|c| c.attr("SamplesPerPixel")) {
            Some(v) => v.trim().parse::<u32>().ok().filter(|&n| n > 0).ok_or_else(|| {
                StitcherError::InvalidMetadata(format!("Channel SamplesPerPixel='{v}' is not a positive integer"))
            })?,
            None => 1,
        };
        if size_c % samples_per_pixel != 0 {
            return Err(StitcherError::InvalidMetadata(format!(
                "Pixels of Image {image}: SizeC={size_c} is not a multiple of SamplesPerPixel={samples_per_pixel}"
            )));
        }
        Ok(PixelsInfo {
            size_x: dim("SizeX", None)?,
            size_y: dim("SizeY", None)?,
            size_z: dim("SizeZ", Some(1))?,
            size_c,
            size_t: dim("SizeT", Some(1))?,
            pixel_type: PixelType::from_ome(type_name)?,
            samples_per_pixel,
        })
    }

    pub fn set_image_name(&mut self, image: usize, name: &str) -> Result<()> {
        let element = self
            .image_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("no Image {image}")))?;
        element.set_attr("Name", name);
        Ok(())
    }

    pub fn set_pixels_size(&mut self, image: usize, size_x: u32, size_y: u32) -> Result<()> {
        let pixels = self
            .pixels_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        pixels.set_attr("SizeX", size_x.to_string());
        pixels.set_attr("SizeY", size_y.to_string());
        Ok(())
    }

    pub fn set_pixel_type(&mut self, image: usize, pixel_type: PixelType) -> Result<()> {
        let pixels = self
            .pixels_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        pixels.set_attr("Type", pixel_type.as_ome());
        Ok(())
    }

    /// Set the Z/C/T extents of image `image`. Channel entries beyond
    /// `size_c` are dropped so the block stays self-consistent.
    pub fn set_plane_extents(&mut self, image: usize, size_z: u32, size_c: u32, size_t: u32) -> Result<()> {
        let pixels = self
            .pixels_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        pixels.set_attr("SizeZ", size_z.to_string());
        pixels.set_attr("SizeC", size_c.to_string());
        pixels.set_attr("SizeT", size_t.to_string());
        let mut seen = 0u32;
        pixels.remove_children(|e| {
            if !e.is("Channel") {
                return false;
            }
            seen += 1;
            seen > size_c
        });
        Ok(())
    }

    /// Keep only image `keep`, discarding every other `<Image>`.
    pub fn retain_image(&mut self, keep: usize) -> Result<()> {
        if keep >= self.image_count() {
            return Err(StitcherError::InvalidMetadata(format!(
                "cannot keep Image {keep}: tree has {} images",
                self.image_count()
            )));
        }
        let mut index = 0usize;
        self.root.remove_children(|e| {
            if !e.is("Image") {
                return false;
            }
            let drop = index != keep;
            index += 1;
            drop
        });
        Ok(())
    }

    // -- Channels -----------------------------------------------------------

    pub fn channel_count(&self, image: usize) -> usize {
        self.pixels(image)
            .map(|p| p.children_named("Channel").count())
            .unwrap_or(0)
    }

    /// Keep only the channels of `image` at `indices`, in that order, and
    /// renumber the `TheC` of their Plane entries. Returns how many of the
    /// requested channels existed.
    pub fn select_channels(&mut self, image: usize, indices: &[usize]) -> Result<usize> {
        let pixels = self
            .pixels_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        let channels = pixels.remove_children(|e| e.is("Channel"));
        let selected: Vec<Element> = indices.iter().filter_map(|&i| channels.get(i).cloned()).collect();
        let found = selected.len();
        for channel in selected {
            pixels.insert_before(channel, AFTER_CHANNEL);
        }

        pixels.remove_children(|e| {
            e.is("Plane")
                && e.attr("TheC")
                    .and_then(|c| c.parse::<usize>().ok())
                    .is_some_and(|c| !indices.contains(&c))
        });
        for plane in pixels.children_named_mut("Plane") {
            let remapped = plane
                .attr("TheC")
                .and_then(|c| c.parse::<usize>().ok())
                .and_then(|c| indices.iter().position(|&i| i == c));
            if let Some(new_c) = remapped {
                plane.set_attr("TheC", new_c.to_string());
            }
        }
        Ok(found)
    }

    /// Mark every channel of `image` as storing `samples` samples per pixel.
    pub fn set_samples_per_pixel(&mut self, image: usize, samples: u32) -> Result<()> {
        let pixels = self
            .pixels_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        for channel in pixels.children_named_mut("Channel") {
            channel.set_attr("SamplesPerPixel", samples.to_string());
        }
        Ok(())
    }

    /// FilterSet ID referenced by each channel of `image`, in channel order.
    pub fn channel_filter_sets(&self, image: usize) -> Vec<Option<String>> {
        self.pixels(image)
            .map(|p| {
                p.children_named("Channel")
                    .map(|c| {
                        c.child("FilterSetRef")
                            .and_then(|r| r.attr("ID"))
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Point channel `channel` of `image` at FilterSet `filter_set_id`.
    pub fn link_channel_filter_set(&mut self, image: usize, channel: usize, filter_set_id: &str) -> Result<()> {
        let pixels = self
            .pixels_mut(image)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Pixels")))?;
        let element = pixels
            .children_named_mut("Channel")
            .nth(channel)
            .ok_or_else(|| StitcherError::InvalidMetadata(format!("Image {image} has no Channel {channel}")))?;
        match element.child_mut("FilterSetRef") {
            Some(r) => r.set_attr("ID", filter_set_id),
            None => element.insert_before(
                Element::new("FilterSetRef").with_attr("ID", filter_set_id),
                AFTER_FILTER_SET_REF,
            ),
        }
        Ok(())
    }

    // -- Instrument ---------------------------------------------------------

    pub fn instruments(&self) -> impl Iterator<Item = &Element> {
        self.root.children_named("Instrument")
    }

    pub fn filter_set_count(&self) -> usize {
        self.instruments()
            .map(|i| i.children_named("FilterSet").count())
            .sum()
    }

    pub fn filter_count(&self) -> usize {
        self.instruments()
            .map(|i| i.children_named("Filter").count())
            .sum()
    }

    pub fn dichroic_count(&self) -> usize {
        self.instruments()
            .map(|i| i.children_named("Dichroic").count())
            .sum()
    }

    pub fn find_filter_set(&self, id: &str) -> Option<&Element> {
        self.instruments()
            .flat_map(|i| i.children_named("FilterSet"))
            .find(|fs| fs.attr("ID") == Some(id))
    }

    /// Remove every instrument component named `kind` with the given ID.
    /// Returns how many elements were removed.
    pub fn remove_instrument_component(&mut self, kind: &str, id: &str) -> usize {
        self.root
            .children_named_mut("Instrument")
            .map(|instrument| {
                instrument
                    .remove_children(|e| e.is(kind) && e.attr("ID") == Some(id))
                    .len()
            })
            .sum()
    }

    /// Number of `*Ref` elements anywhere in the tree pointing at `id`.
    pub fn reference_count(&self, id: &str) -> usize {
        let mut count = 0usize;
        self.root.walk(&mut |e: &Element| {
            if e.name.ends_with("Ref") && e.attr("ID") == Some(id) {
                count += 1;
            }
        });
        count
    }

    // -- Experimenter -------------------------------------------------------

    pub fn experimenter_count(&self) -> usize {
        self.root.children_named("Experimenter").count()
    }

    pub fn experimenter(&self, index: usize) -> Option<&Element> {
        self.root.children_named("Experimenter").nth(index)
    }

    /// Experimenter `index`, creating it and any missing lower-indexed
    /// records at their schema position.
    pub fn experimenter_mut(&mut self, index: usize) -> &mut Element {
        while self.experimenter_count() <= index {
            let id = format!("Experimenter:{}", self.experimenter_count());
            self.root
                .insert_before(Element::new("Experimenter").with_attr("ID", id), BEFORE_EXPERIMENTER);
        }
        self.root
            .children_named_mut("Experimenter")
            .nth(index)
            .expect("experimenter inserted above")
    }
}
