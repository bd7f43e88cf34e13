use bytes::Bytes;
use serde_json::json;
use tracing::{debug, info};

use crate::decoded::{Decoded, Metadata};
use crate::error::DecodeError;
use crate::format::calibration::{Calibration, LengthUnit};
use crate::format::tiff::{
    read_directories, SampleEncoding, StripLayout, TagDirectory, TiffHeader, ValueReader,
};
use crate::image::Image;

use super::mapping::TagIdMap;
use super::slots::{mapped_entry, resolve_default_slot, DefaultSlot};

/// Channels stored in metres and reported in nanometres.
const METRE_CHANNELS: [&str; 3] = ["height", "measuredHeight", "amplitude"];

/// Options for one JPK decode call.
#[derive(Debug, Clone, PartialEq)]
pub struct JpkOptions {
    pub tag_map: TagIdMap,
    /// Flip rows top-to-bottom after scaling; the instrument stores rows
    /// bottom-up.
    pub flip_vertical: bool,
}

impl JpkOptions {
    pub fn new(tag_map: TagIdMap) -> Self {
        Self {
            tag_map,
            flip_vertical: true,
        }
    }

    pub fn with_flip(mut self, flip_vertical: bool) -> Self {
        self.flip_vertical = flip_vertical;
        self
    }

    /// Options using the bundled tag mapping.
    pub fn builtin() -> Result<Self, DecodeError> {
        Ok(Self::new(TagIdMap::builtin()?))
    }
}

/// A channel page located in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDescriptor {
    /// `<channel_name>_<trace|retrace>`
    pub name: String,
    /// Value of the channel-name tag, without the trace suffix
    pub base_name: String,
    /// Directory index of the page
    pub page: usize,
}

/// Parsed container: header, all directories, and the channel pages.
pub(crate) struct JpkContainer {
    data: Bytes,
    header: TiffHeader,
    directories: Vec<TagDirectory>,
    channels: Vec<ChannelDescriptor>,
}

impl JpkContainer {
    pub(crate) fn parse(data: Bytes, map: &TagIdMap) -> Result<Self, DecodeError> {
        let (header, directories) = read_directories(&data)?;
        if directories.is_empty() {
            return Err(DecodeError::corrupt("TIFF container has no directories"));
        }

        let reader = ValueReader::new(&data, &header);
        let mut channels = Vec::with_capacity(directories.len() - 1);
        // Page 0 holds acquisition-wide tags and a thumbnail
        for (page, dir) in directories.iter().enumerate().skip(1) {
            let base_name =
                reader.read_string(mapped_entry(dir, map.channel_name, "channel_name")?)?;
            let trace = reader.read_u64(mapped_entry(dir, map.trace_retrace, "trace_retrace")?)?;
            let suffix = if trace == 0 { "trace" } else { "retrace" };
            let name = format!("{base_name}_{suffix}");

            if channels.iter().any(|c: &ChannelDescriptor| c.name == name) {
                return Err(DecodeError::corrupt(format!(
                    "channel '{name}' appears on more than one page"
                )));
            }
            channels.push(ChannelDescriptor {
                name,
                base_name,
                page,
            });
        }

        debug!(
            pages = directories.len(),
            channels = channels.len(),
            "Parsed JPK container"
        );

        Ok(Self {
            data,
            header,
            directories,
            channels,
        })
    }

    pub(crate) fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    fn find(&self, channel: &str) -> Result<&ChannelDescriptor, DecodeError> {
        self.channels
            .iter()
            .find(|c| c.name == channel)
            .ok_or_else(|| DecodeError::ChannelNotFound {
                requested: channel.to_string(),
                available: self.channels.iter().map(|c| c.name.clone()).collect(),
            })
    }

    /// Nanometres per pixel from the page-0 grid tags.
    fn calibration(&self, map: &TagIdMap) -> Result<(Calibration, GridExtent), DecodeError> {
        let reader = ValueReader::new(&self.data, &self.header);
        let grid = &self.directories[0];

        let extent = GridExtent {
            ulength: reader.read_f64(mapped_entry(grid, map.grid_ulength, "grid_ulength")?)?,
            vlength: reader.read_f64(mapped_entry(grid, map.grid_vlength, "grid_vlength")?)?,
            ilength: reader.read_u64(mapped_entry(grid, map.grid_ilength, "grid_ilength")?)?,
            jlength: reader.read_u64(mapped_entry(grid, map.grid_jlength, "grid_jlength")?)?,
        };

        let calibration = Calibration::square(
            extent.ulength,
            extent.ilength,
            extent.vlength,
            extent.jlength,
            LengthUnit::Metre,
        )?;
        Ok((calibration, extent))
    }

    pub(crate) fn decode(&self, channel: &str, options: &JpkOptions) -> Result<Decoded, DecodeError> {
        let descriptor = self.find(channel)?;
        let page = &self.directories[descriptor.page];
        let map = &options.tag_map;

        let reader = ValueReader::new(&self.data, &self.header);
        let slot = resolve_default_slot(&reader, page, map, channel)?;

        let layout = StripLayout::from_directory(&self.data, &self.header, page)?;
        let samples = layout.read_samples(&self.data)?;
        let mut image = Image::from_vec(layout.height, layout.width, samples)?;

        let to_nm = METRE_CHANNELS.contains(&descriptor.base_name.as_str());
        let scaling = slot.scaling;
        image.map_in_place(|v| {
            let value = scaling.apply(v);
            if to_nm {
                LengthUnit::Metre.to_nanometres(value)
            } else {
                value
            }
        });
        if options.flip_vertical {
            image.flip_vertical();
        }

        let (calibration, extent) = self.calibration(map)?;
        let metadata = self.metadata(descriptor, &slot, &layout.encoding, &extent, options);

        Ok(Decoded::single(image, calibration, metadata))
    }

    fn metadata(
        &self,
        descriptor: &ChannelDescriptor,
        slot: &DefaultSlot,
        encoding: &SampleEncoding,
        extent: &GridExtent,
        options: &JpkOptions,
    ) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("channel".into(), json!(descriptor.name));
        metadata.insert("channel_name".into(), json!(descriptor.base_name));
        metadata.insert("page".into(), json!(descriptor.page));
        metadata.insert("default_slot".into(), json!(slot.name));
        metadata.insert("slot_index".into(), json!(slot.index));
        metadata.insert("scaling_type".into(), json!(slot.scaling.kind()));
        metadata.insert("scale".into(), json!(slot.scaling.scale()));
        metadata.insert("offset".into(), json!(slot.scaling.offset()));
        metadata.insert("grid_ulength".into(), json!(extent.ulength));
        metadata.insert("grid_vlength".into(), json!(extent.vlength));
        metadata.insert("grid_ilength".into(), json!(extent.ilength));
        metadata.insert("grid_jlength".into(), json!(extent.jlength));
        metadata.insert("bits_per_sample".into(), json!(encoding.bits));
        metadata.insert(
            "sample_format".into(),
            json!(format!("{:?}", encoding.kind).to_lowercase()),
        );
        metadata.insert("flipped".into(), json!(options.flip_vertical));
        metadata.insert("bigtiff".into(), json!(self.header.is_bigtiff));
        metadata
    }
}

/// Physical scan extent (metres) and grid size (pixels) from page 0.
#[derive(Debug, Clone, Copy)]
struct GridExtent {
    ulength: f64,
    vlength: f64,
    ilength: u64,
    jlength: u64,
}

pub(crate) fn decode_container(
    data: Bytes,
    channel: &str,
    options: &JpkOptions,
) -> Result<Decoded, DecodeError> {
    let container = JpkContainer::parse(data, &options.tag_map)?;
    let decoded = container.decode(channel, options)?;
    info!(
        channel,
        shape = ?decoded.data.shape(),
        nm_per_pixel = decoded.calibration.nm_per_pixel(),
        "Decoded JPK channel"
    );
    Ok(decoded)
}
