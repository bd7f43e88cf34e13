//! Test utilities for integration tests.
//!
//! Builders for synthetic instrument files: Gwyddion object trees, TIFF
//! containers carrying JPK vendor tags, and ASD movies.

use bytes::{BufMut, Bytes, BytesMut};
use std::path::PathBuf;

use probescan::format::jpk::TagIdMap;

// =============================================================================
// Files on disk
// =============================================================================

/// Write `data` into a fresh temporary directory under `name`.
///
/// The directory is returned so it outlives the test body.
pub fn write_temp(name: &str, data: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    (dir, path)
}

// =============================================================================
// Gwyddion Builders
// =============================================================================

fn cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Encode an object: name, body size, then the concatenated components.
pub fn gwy_object(name: &str, components: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = components.concat();
    let mut out = Vec::new();
    cstr(&mut out, name);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend(body);
    out
}

fn gwy_component(name: &str, tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    cstr(&mut out, name);
    out.push(tag);
    out.extend_from_slice(value);
    out
}

pub fn gwy_int(name: &str, value: i32) -> Vec<u8> {
    gwy_component(name, b'i', &value.to_le_bytes())
}

pub fn gwy_double(name: &str, value: f64) -> Vec<u8> {
    gwy_component(name, b'd', &value.to_le_bytes())
}

pub fn gwy_string(name: &str, value: &str) -> Vec<u8> {
    let mut encoded = Vec::new();
    cstr(&mut encoded, value);
    gwy_component(name, b's', &encoded)
}

pub fn gwy_nested(name: &str, object: Vec<u8>) -> Vec<u8> {
    gwy_component(name, b'o', &object)
}

pub fn gwy_doubles(name: &str, values: &[f64]) -> Vec<u8> {
    let mut encoded = (values.len() as u32).to_le_bytes().to_vec();
    for v in values {
        encoded.extend_from_slice(&v.to_le_bytes());
    }
    gwy_component(name, b'D', &encoded)
}

fn gwy_unit(symbol: &str) -> Vec<u8> {
    gwy_object("GwySIUnit", &[gwy_string("unitstr", symbol)])
}

/// A `GwyDataField` of `yres` rows by `xres` columns.
pub fn gwy_data_field(
    xres: i32,
    yres: i32,
    xreal: f64,
    yreal: f64,
    xy_unit: &str,
    data: &[f64],
) -> Vec<u8> {
    gwy_object(
        "GwyDataField",
        &[
            gwy_int("xres", xres),
            gwy_int("yres", yres),
            gwy_double("xreal", xreal),
            gwy_double("yreal", yreal),
            gwy_nested("si_unit_xy", gwy_unit(xy_unit)),
            gwy_doubles("data", data),
        ],
    )
}

/// A complete `.gwy` file with one `(title, data field)` per channel.
pub fn gwy_file(channels: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut components = Vec::new();
    for (id, (title, field)) in channels.iter().enumerate() {
        components.push(gwy_nested(&format!("/{id}/data"), field.clone()));
        components.push(gwy_string(&format!("/{id}/data/title"), title));
    }
    components.push(gwy_nested(
        "/0/meta",
        gwy_object("GwyContainer", &[gwy_string("Operator", "lab")]),
    ));

    let mut out = b"GWYP".to_vec();
    out.extend(gwy_object("GwyContainer", &components));
    out
}

/// 4x4 "Height" plus 4x4 "Phase" over a 40 nm square.
pub fn create_gwy_two_channels() -> Vec<u8> {
    let height: Vec<f64> = (0..16).map(f64::from).collect();
    let phase: Vec<f64> = (0..16).map(|i| f64::from(i) * 0.5).collect();
    gwy_file(&[
        ("Height", gwy_data_field(4, 4, 40.0, 40.0, "nm", &height)),
        ("Phase", gwy_data_field(4, 4, 40.0, 40.0, "nm", &phase)),
    ])
}

// =============================================================================
// TIFF Builders
// =============================================================================

#[derive(Clone, Copy, Debug)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Typed value of one tag entry.
#[derive(Clone, Debug)]
pub enum TagValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Double(Vec<f64>),
    Ascii(String),
}

impl TagValue {
    /// `(field type, count, encoded bytes)`
    fn encode(&self, order: ByteOrderType) -> (u16, u64, Vec<u8>) {
        let mut out = Vec::new();
        match self {
            TagValue::Short(values) => {
                for v in values {
                    write_value(&mut out, order, u64::from(*v), 2);
                }
                (3, values.len() as u64, out)
            }
            TagValue::Long(values) => {
                for v in values {
                    write_value(&mut out, order, u64::from(*v), 4);
                }
                (4, values.len() as u64, out)
            }
            TagValue::Double(values) => {
                for v in values {
                    write_value(&mut out, order, v.to_bits(), 8);
                }
                (12, values.len() as u64, out)
            }
            TagValue::Ascii(text) => {
                out.extend_from_slice(text.as_bytes());
                out.push(0);
                (2, out.len() as u64, out)
            }
        }
    }
}

/// Pixel samples of a single-strip page.
#[derive(Clone, Debug)]
pub enum Samples {
    U16(Vec<u16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

impl Samples {
    /// `(bits per sample, sample format, encoded strip)`
    fn encode(&self, order: ByteOrderType) -> (u16, u16, Vec<u8>) {
        let mut out = Vec::new();
        match self {
            Samples::U16(values) => {
                for v in values {
                    write_value(&mut out, order, u64::from(*v), 2);
                }
                (16, 1, out)
            }
            Samples::I32(values) => {
                for v in values {
                    write_value(&mut out, order, u64::from(*v as u32), 4);
                }
                (32, 2, out)
            }
            Samples::F32(values) => {
                for v in values {
                    write_value(&mut out, order, u64::from(v.to_bits()), 4);
                }
                (32, 3, out)
            }
        }
    }
}

/// Builder for one directory (page).
#[derive(Clone, Debug, Default)]
pub struct IfdBuilder {
    entries: Vec<(u16, TagValue)>,
    image: Option<(u32, u32, Samples)>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag entry.
    pub fn add_entry(&mut self, tag: u16, value: TagValue) -> &mut Self {
        self.entries.push((tag, value));
        self
    }

    /// Attach an uncompressed single-strip raster.
    pub fn with_strip(&mut self, width: u32, height: u32, samples: Samples) -> &mut Self {
        self.image = Some((width, height, samples));
        self
    }
}

/// Builder for test TIFF files.
///
/// Pixel data and out-of-line values come first and the directories last, so
/// cutting the file anywhere leaves a directory pointing past the end.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    ifds: Vec<IfdBuilder>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            ifds: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    pub fn add_ifd(mut self, ifd: IfdBuilder) -> Self {
        self.ifds.push(ifd);
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let order = self.byte_order;
        let inline_size = if self.is_bigtiff { 8 } else { 4 };

        let mut data = Vec::new();
        match order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        if self.is_bigtiff {
            write_value(&mut data, order, 43, 2);
            write_value(&mut data, order, 8, 2);
            write_value(&mut data, order, 0, 2);
        } else {
            write_value(&mut data, order, 42, 2);
        }
        let first_ifd_pos = data.len();
        write_value(&mut data, order, 0, inline_size);

        // Resolve every entry to (tag, type, count, value field)
        let mut resolved: Vec<Vec<(u16, u16, u64, Vec<u8>)>> = Vec::new();
        for ifd in &self.ifds {
            let mut entries = Vec::new();

            let mut all = ifd.entries.clone();
            if let Some((width, height, samples)) = &ifd.image {
                let (bits, format, strip) = samples.encode(order);
                align(&mut data);
                let strip_offset = data.len() as u32;
                data.extend_from_slice(&strip);

                all.push((256, TagValue::Long(vec![*width])));
                all.push((257, TagValue::Long(vec![*height])));
                all.push((258, TagValue::Short(vec![bits])));
                all.push((259, TagValue::Short(vec![1])));
                all.push((273, TagValue::Long(vec![strip_offset])));
                all.push((277, TagValue::Short(vec![1])));
                all.push((278, TagValue::Long(vec![*height])));
                all.push((279, TagValue::Long(vec![strip.len() as u32])));
                all.push((339, TagValue::Short(vec![format])));
            }
            all.sort_by_key(|(tag, _)| *tag);

            for (tag, value) in all {
                let (field_type, count, bytes) = value.encode(order);
                let field = if bytes.len() <= inline_size {
                    let mut field = bytes;
                    field.resize(inline_size, 0);
                    field
                } else {
                    align(&mut data);
                    let offset = data.len() as u64;
                    data.extend_from_slice(&bytes);
                    let mut field = Vec::new();
                    write_value(&mut field, order, offset, inline_size);
                    field
                };
                entries.push((tag, field_type, count, field));
            }
            resolved.push(entries);
        }

        // Directories at the end, each linked to the next
        align(&mut data);
        let (count_size, entry_size) = if self.is_bigtiff { (8, 20) } else { (2, 12) };
        let mut offset = data.len();
        let mut ifd_offsets = Vec::new();
        for entries in &resolved {
            ifd_offsets.push(offset as u64);
            offset += count_size + entries.len() * entry_size + inline_size;
        }

        for (idx, entries) in resolved.iter().enumerate() {
            write_value(&mut data, order, entries.len() as u64, count_size);
            for (tag, field_type, count, field) in entries {
                write_value(&mut data, order, u64::from(*tag), 2);
                write_value(&mut data, order, u64::from(*field_type), 2);
                write_value(&mut data, order, *count, inline_size);
                data.extend_from_slice(field);
            }
            let next = ifd_offsets.get(idx + 1).copied().unwrap_or(0);
            write_value(&mut data, order, next, inline_size);
        }

        let first = ifd_offsets.first().copied().unwrap_or(0);
        let mut patch = Vec::new();
        write_value(&mut patch, order, first, inline_size);
        data[first_ifd_pos..first_ifd_pos + inline_size].copy_from_slice(&patch);

        data
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn align(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

fn write_value(data: &mut Vec<u8>, byte_order: ByteOrderType, value: u64, size: usize) {
    match byte_order {
        ByteOrderType::LittleEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_le_bytes()),
            4 => data.extend(&(value as u32).to_le_bytes()),
            8 => data.extend(&value.to_le_bytes()),
            _ => {}
        },
        ByteOrderType::BigEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_be_bytes()),
            4 => data.extend(&(value as u32).to_be_bytes()),
            8 => data.extend(&value.to_be_bytes()),
            _ => {}
        },
    }
}

// =============================================================================
// JPK Builders
// =============================================================================

/// One calibration slot of a channel page.
#[derive(Clone, Debug)]
pub struct SlotSpec {
    pub name: &'static str,
    pub scaling: &'static str,
    pub scale: f64,
    pub offset: f64,
}

impl SlotSpec {
    pub fn linear(name: &'static str, scale: f64, offset: f64) -> Self {
        Self {
            name,
            scaling: "LinearScaling",
            scale,
            offset,
        }
    }

    pub fn null(name: &'static str) -> Self {
        Self {
            name,
            scaling: "NullScaling",
            scale: 1.0,
            offset: 0.0,
        }
    }
}

/// One channel page.
#[derive(Clone, Debug)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub retrace: bool,
    pub default_slot: &'static str,
    pub slots: Vec<SlotSpec>,
    pub samples: Samples,
}

/// Scan grid of page 0.
#[derive(Clone, Copy, Debug)]
pub struct GridSpec {
    /// Metres
    pub ulength: f64,
    pub vlength: f64,
    /// Pixels
    pub ilength: u32,
    pub jlength: u32,
}

/// Build a JPK container with tag ids taken from `map`.
pub fn jpk_file(
    order: ByteOrderType,
    map: &TagIdMap,
    grid: GridSpec,
    channels: &[ChannelSpec],
) -> Vec<u8> {
    jpk_builder(order, map, grid, channels).build()
}

/// Page 0 with the grid, then one page per channel, ready to build.
pub fn jpk_builder(
    order: ByteOrderType,
    map: &TagIdMap,
    grid: GridSpec,
    channels: &[ChannelSpec],
) -> TiffBuilder {
    let mut page0 = IfdBuilder::new();
    page0
        .add_entry(map.grid_ulength, TagValue::Double(vec![grid.ulength]))
        .add_entry(map.grid_vlength, TagValue::Double(vec![grid.vlength]))
        .add_entry(map.grid_ilength, TagValue::Long(vec![grid.ilength]))
        .add_entry(map.grid_jlength, TagValue::Long(vec![grid.jlength]))
        .with_strip(1, 1, Samples::U16(vec![0]));

    let mut builder = TiffBuilder::new().with_byte_order(order).add_ifd(page0);

    for channel in channels {
        let mut page = IfdBuilder::new();
        page.add_entry(map.channel_name, TagValue::Ascii(channel.name.to_string()))
            .add_entry(map.trace_retrace, TagValue::Short(vec![u16::from(channel.retrace)]))
            .add_entry(map.n_slots, TagValue::Long(vec![channel.slots.len() as u32]))
            .add_entry(
                map.default_slot,
                TagValue::Ascii(channel.default_slot.to_string()),
            );

        for (k, slot) in channel.slots.iter().enumerate() {
            let id = |base: u16| base + k as u16 * map.slot_size;
            page.add_entry(id(map.first_slot_tag), TagValue::Ascii(slot.name.to_string()))
                .add_entry(
                    id(map.first_scaling_type),
                    TagValue::Ascii(slot.scaling.to_string()),
                );
            if slot.scaling == "LinearScaling" {
                page.add_entry(id(map.first_scaling_name), TagValue::Double(vec![slot.scale]))
                    .add_entry(id(map.first_offset_name), TagValue::Double(vec![slot.offset]));
            }
        }

        page.with_strip(grid.ilength, grid.jlength, channel.samples.clone());
        builder = builder.add_ifd(page);
    }

    builder
}

/// 2 columns by 3 rows over a 1 um by 1.5 um scan.
pub fn standard_grid() -> GridSpec {
    GridSpec {
        ulength: 1e-6,
        vlength: 1.5e-6,
        ilength: 2,
        jlength: 3,
    }
}

/// Height trace (linear slot, metres) and error trace (null slot).
pub fn standard_channels() -> Vec<ChannelSpec> {
    vec![
        ChannelSpec {
            name: "height",
            retrace: false,
            default_slot: "nominal",
            slots: vec![
                SlotSpec::null("raw"),
                SlotSpec::linear("nominal", 0.5e-9, 1e-9),
            ],
            samples: Samples::I32(vec![0, 2, 4, 6, 8, 10]),
        },
        ChannelSpec {
            name: "height",
            retrace: true,
            default_slot: "nominal",
            slots: vec![SlotSpec::linear("nominal", 1e-9, 0.0)],
            samples: Samples::I32(vec![1, 1, 2, 2, 3, 3]),
        },
        ChannelSpec {
            name: "vDeflection",
            retrace: false,
            default_slot: "raw",
            slots: vec![SlotSpec::null("raw")],
            samples: Samples::F32(vec![0.25, 0.5, 0.75, 1.0, 1.25, 1.5]),
        },
    ]
}

pub fn create_jpk(order: ByteOrderType) -> Vec<u8> {
    let map = TagIdMap::builtin().unwrap();
    jpk_file(order, &map, standard_grid(), &standard_channels())
}

pub fn create_jpk_bigtiff(order: ByteOrderType) -> Vec<u8> {
    let map = TagIdMap::builtin().unwrap();
    jpk_builder(order, &map, standard_grid(), &standard_channels())
        .with_bigtiff(true)
        .build()
}

/// A mapping document with every id moved to a different range.
pub const ALTERNATE_TAG_MAP: &str = r#"{
  "channel_name": 40000,
  "trace_retrace": 40001,
  "grid_ulength": 40002,
  "grid_vlength": 40003,
  "grid_ilength": 40004,
  "grid_jlength": 40005,
  "n_slots": 40006,
  "default_slot": 40007,
  "first_slot_tag": 41000,
  "first_scaling_type": 41001,
  "first_scaling_name": 41002,
  "first_offset_name": 41003,
  "slot_size": 16
}"#;

// =============================================================================
// ASD Builders
// =============================================================================

/// Settings of a synthetic movie.
#[derive(Clone, Debug)]
pub struct AsdSpec {
    /// Header layout, 0 or 1
    pub version: i32,
    pub channels: [&'static str; 2],
    pub x_pixels: i32,
    pub y_pixels: i32,
    pub x_nm: i32,
    pub y_nm: i32,
    pub range_code: u32,
    pub bits: i32,
    pub scanner_sensitivity: f32,
    pub phase_sensitivity: f32,
    pub z_piezo_extension: f32,
    pub z_piezo_gain: f32,
    /// Raw levels per channel, per frame
    pub frames: [Vec<Vec<i16>>; 2],
}

fn put_channel_code(buf: &mut BytesMut, code: &str) {
    let mut units: Vec<u8> = code.encode_utf16().flat_map(u16::to_le_bytes).collect();
    units.resize(4, 0);
    buf.put_slice(&units);
}

fn put_v0_header(buf: &mut BytesMut, spec: &AsdSpec, frame_count: i32) {
    let user_name: Vec<u8> = "lab1".encode_utf16().flat_map(u16::to_le_bytes).collect();

    buf.put_i32_le(0); // version
    buf.put_slice(spec.channels[0].as_bytes());
    buf.put_slice(spec.channels[1].as_bytes());
    buf.put_i32_le(0); // header length
    buf.put_i32_le(32); // frame header length
    buf.put_i32_le(user_name.len() as i32);
    buf.put_i32_le(4); // comment offset size
    buf.put_i32_le(3); // comment size
    buf.put_i16_le(spec.x_pixels as i16);
    buf.put_i16_le(spec.y_pixels as i16);
    buf.put_i16_le(spec.x_nm as i16);
    buf.put_i16_le(spec.y_nm as i16);
    buf.put_f32_le(0.1); // frame time
    buf.put_f32_le(spec.z_piezo_extension);
    buf.put_f32_le(spec.z_piezo_gain);
    buf.put_u32_le(spec.range_code);
    buf.put_i32_le(spec.bits);
    buf.put_u8(0); // averaged
    buf.put_i32_le(1); // averaging window
    buf.put_i16_le(0);
    buf.put_i16_le(2023);
    for v in [11u8, 2, 9, 15, 30] {
        buf.put_u8(v);
    }
    buf.put_u8(0); // rounding degree
    buf.put_f32_le(1000.0);
    buf.put_f32_le(1000.0);
    buf.put_slice(&[0u8; 12]);
    buf.put_i32_le(frame_count);
    buf.put_i32_le(frame_count);
    buf.put_i32_le(3); // afm id
    buf.put_i16_le(42); // file id
    buf.put_slice(&user_name);
    buf.put_f32_le(spec.scanner_sensitivity);
    buf.put_f32_le(spec.phase_sensitivity);
    buf.put_i32_le(0); // scan direction
    buf.put_slice(&[0u8; 4]);
    buf.put_slice(b"old");
}

fn put_v1_header(buf: &mut BytesMut, spec: &AsdSpec, frame_count: i32) {
    buf.put_i32_le(1); // version
    buf.put_i32_le(0); // header length
    buf.put_i32_le(32); // frame header length
    buf.put_i32_le(0); // text encoding
    buf.put_i32_le(4); // user name size
    buf.put_i32_le(0); // comment size
    put_channel_code(buf, spec.channels[0]);
    put_channel_code(buf, spec.channels[1]);
    buf.put_i32_le(frame_count);
    buf.put_i32_le(frame_count);
    buf.put_i32_le(0); // scan direction
    buf.put_i32_le(42); // file id
    buf.put_i32_le(spec.x_pixels);
    buf.put_i32_le(spec.y_pixels);
    buf.put_i32_le(spec.x_nm);
    buf.put_i32_le(spec.y_nm);
    buf.put_u8(0); // averaged
    buf.put_i32_le(1); // averaging window
    for v in [2023, 11, 2, 9, 15, 30] {
        buf.put_i32_le(v);
    }
    buf.put_i32_le(0); // x rounding
    buf.put_i32_le(0); // y rounding
    buf.put_f32_le(0.1); // frame time
    buf.put_f32_le(spec.scanner_sensitivity);
    buf.put_f32_le(spec.phase_sensitivity);
    buf.put_i32_le(0); // offset
    buf.put_slice(&[0u8; 12]);
    buf.put_i32_le(3); // afm id
    buf.put_u32_le(spec.range_code);
    buf.put_i32_le(spec.bits);
    buf.put_f32_le(1000.0);
    buf.put_f32_le(1000.0);
    buf.put_f32_le(1.0);
    buf.put_f32_le(1.0);
    buf.put_f32_le(spec.z_piezo_extension);
    buf.put_f32_le(spec.z_piezo_gain);
    buf.put_slice(b"lab1");
}

/// Encode a movie: header, then every frame of channel 1, then every frame
/// of channel 2.
pub fn asd_file(spec: &AsdSpec) -> Vec<u8> {
    let frame_count = spec.frames[0].len() as i32;
    let mut buf = BytesMut::new();

    match spec.version {
        0 => put_v0_header(&mut buf, spec, frame_count),
        _ => put_v1_header(&mut buf, spec, frame_count),
    }

    for channel_frames in &spec.frames {
        for (number, levels) in channel_frames.iter().enumerate() {
            buf.put_i32_le(number as i32);
            buf.put_i16_le(levels.iter().copied().max().unwrap_or(0));
            buf.put_i16_le(levels.iter().copied().min().unwrap_or(0));
            buf.put_i16_le(0);
            buf.put_i16_le(0);
            buf.put_f32_le(0.0);
            buf.put_f32_le(0.0);
            buf.put_u8(0);
            buf.put_slice(&[0u8; 11]);
            for level in levels {
                buf.put_i16_le(*level);
            }
        }
    }

    buf.to_vec()
}

/// Three 2x2 frames of topography and phase, bipolar 2.5 V, 12 bits.
pub fn standard_movie() -> AsdSpec {
    AsdSpec {
        version: 1,
        channels: ["TP", "PH"],
        x_pixels: 2,
        y_pixels: 2,
        x_nm: 200,
        y_nm: 200,
        range_code: 0x0002_0000,
        bits: 12,
        scanner_sensitivity: 2.0,
        phase_sensitivity: 4.0,
        z_piezo_extension: 2.0,
        z_piezo_gain: 1.0,
        frames: [
            vec![
                vec![0, 1024, 2048, 3072],
                vec![2048, 2048, 2048, 2048],
                vec![4096, 0, 0, 4096],
            ],
            vec![
                vec![0, 0, 0, 0],
                vec![1024, 1024, 1024, 1024],
                vec![2048, 2048, 2048, 2048],
            ],
        ],
    }
}

pub fn create_asd() -> Bytes {
    Bytes::from(asd_file(&standard_movie()))
}
