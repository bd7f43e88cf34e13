//! ASD file header parsing.
//!
//! Three header layouts exist. All values are little-endian.
//!
//! ```text
//! v0  i32 version, then 2-byte ASCII channel codes, 16-bit geometry,
//!     user name, sensitivities, and a comment behind a skipped block
//! v1  i32 version, then lengths and text encoding, 4-byte UTF-16LE
//!     channel codes, 32-bit geometry, piezo settings, user name, comment
//! v2  the v1 layout followed by feed-forward settings, colour scale
//!     bounds and RGB anchor-point arrays
//! ```
//!
//! The header is read sequentially; the stored `header_length` is kept as
//! metadata only.

use serde::Serialize;
use tracing::debug;

use crate::error::DecodeError;
use crate::io::{ByteCursor, ByteOrder, TextEncoding};

const LE: ByteOrder = ByteOrder::LittleEndian;

/// Bytes of the fixed frame header structure every record starts with.
pub const FRAME_HEADER_SIZE: usize = 32;

/// Acquisition timestamp as stored (no timezone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcquisitionDate {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

/// Colour map settings only present in version 2 files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColourSettings {
    pub number_of_frames: i32,
    pub x_feed_forward_integer: i32,
    pub x_feed_forward_double: f64,
    pub max_colour_scale: i32,
    pub min_colour_scale: i32,
    pub red_anchor_points: Vec<(i32, i32)>,
    pub green_anchor_points: Vec<(i32, i32)>,
    pub blue_anchor_points: Vec<(i32, i32)>,
}

/// Parsed movie header, common to all versions.
///
/// Fields that only exist in some versions are `Option`s.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsdHeader {
    pub version: i32,
    pub channel1: String,
    pub channel2: String,
    pub header_length: i32,
    pub frame_header_length: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_encoding: Option<i32>,
    pub user_name_size: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_offset_size: Option<i32>,
    pub comment_size: i32,
    pub x_pixels: i32,
    pub y_pixels: i32,
    pub x_nm: i32,
    pub y_nm: i32,
    pub frame_time: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_piezo_extension: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_piezo_extension: Option<f32>,
    pub z_piezo_extension: f32,
    pub z_piezo_gain: f32,
    pub analogue_digital_range: u32,
    pub analogue_digital_data_bits_size: i32,
    pub is_averaged: bool,
    pub averaging_window: i32,
    pub date: AcquisitionDate,
    pub x_rounding_degree: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_rounding_degree: Option<i32>,
    pub max_x_scan_range: f32,
    pub max_y_scan_range: f32,
    pub initial_frames: i32,
    pub num_frames: i32,
    pub afm_id: i32,
    pub file_id: i32,
    pub user_name: String,
    pub scanner_sensitivity: f32,
    pub phase_sensitivity: f32,
    pub scan_direction: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour: Option<ColourSettings>,
}

impl AsdHeader {
    /// Parse the version field and the matching header layout.
    ///
    /// On success the cursor sits on the first frame record.
    pub fn parse(cursor: &mut ByteCursor) -> Result<Self, DecodeError> {
        let version = cursor.read_i32(LE)?;
        let header = match version {
            0 => parse_v0(cursor)?,
            1 => parse_v1(cursor, 1)?,
            2 => {
                let mut header = parse_v1(cursor, 2)?;
                header.colour = Some(parse_colour_settings(cursor)?);
                header
            }
            other => {
                return Err(DecodeError::unsupported(format!(
                    "ASD file version {other} is not supported"
                )))
            }
        };

        header.validate()?;
        debug!(
            version,
            channel1 = %header.channel1,
            channel2 = %header.channel2,
            frames = header.num_frames,
            x_pixels = header.x_pixels,
            y_pixels = header.y_pixels,
            "Parsed ASD header"
        );
        Ok(header)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.x_pixels <= 0 || self.y_pixels <= 0 {
            return Err(DecodeError::corrupt(format!(
                "frame size {}x{} pixels must be positive",
                self.x_pixels, self.y_pixels
            )));
        }
        if self.x_nm <= 0 || self.y_nm <= 0 {
            return Err(DecodeError::corrupt(format!(
                "scan extent {}x{} nm must be positive",
                self.x_nm, self.y_nm
            )));
        }
        if self.num_frames < 0 {
            return Err(DecodeError::corrupt(format!(
                "negative frame count {}",
                self.num_frames
            )));
        }
        if (self.frame_header_length as i64) < FRAME_HEADER_SIZE as i64 {
            return Err(DecodeError::corrupt(format!(
                "frame header length {} is shorter than the {FRAME_HEADER_SIZE}-byte frame header",
                self.frame_header_length
            )));
        }
        Ok(())
    }

    /// Declared channel codes, skipping an empty second slot.
    pub fn channels(&self) -> Vec<String> {
        [&self.channel1, &self.channel2]
            .into_iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect()
    }

    /// Pixels per frame.
    pub fn frame_samples(&self) -> usize {
        self.x_pixels as usize * self.y_pixels as usize
    }
}

// =============================================================================
// Layout readers
// =============================================================================

fn read_size(cursor: &mut ByteCursor, field: &str) -> Result<i32, DecodeError> {
    let value = cursor.read_i32(LE)?;
    if value < 0 {
        return Err(DecodeError::corrupt(format!("negative {field} {value}")));
    }
    Ok(value)
}

/// User names in version 0 are UTF-16LE; an odd length can only be bytes.
fn read_wide_text(cursor: &mut ByteCursor, len: i32) -> Result<String, DecodeError> {
    let len = len as usize;
    let encoding = if len % 2 == 0 {
        TextEncoding::Utf16Le
    } else {
        TextEncoding::Latin1
    };
    cursor.read_fixed_string(len, encoding)
}

fn parse_v0(cursor: &mut ByteCursor) -> Result<AsdHeader, DecodeError> {
    let channel1 = cursor.read_fixed_string(2, TextEncoding::Ascii)?;
    let channel2 = cursor.read_fixed_string(2, TextEncoding::Ascii)?;
    let header_length = cursor.read_i32(LE)?;
    let frame_header_length = cursor.read_i32(LE)?;
    let user_name_size = read_size(cursor, "user name size")?;
    let comment_offset_size = read_size(cursor, "comment offset size")?;
    let comment_size = read_size(cursor, "comment size")?;
    let x_pixels = i32::from(cursor.read_i16(LE)?);
    let y_pixels = i32::from(cursor.read_i16(LE)?);
    let x_nm = i32::from(cursor.read_i16(LE)?);
    let y_nm = i32::from(cursor.read_i16(LE)?);
    let frame_time = cursor.read_f32(LE)?;
    let z_piezo_extension = cursor.read_f32(LE)?;
    let z_piezo_gain = cursor.read_f32(LE)?;
    let analogue_digital_range = cursor.read_u32(LE)?;
    let analogue_digital_data_bits_size = cursor.read_i32(LE)?;
    let is_averaged = cursor.read_bool()?;
    let averaging_window = cursor.read_i32(LE)?;
    cursor.skip(2)?;
    let date = AcquisitionDate {
        year: i32::from(cursor.read_i16(LE)?),
        month: i32::from(cursor.read_u8()?),
        day: i32::from(cursor.read_u8()?),
        hour: i32::from(cursor.read_u8()?),
        minute: i32::from(cursor.read_u8()?),
        second: i32::from(cursor.read_u8()?),
    };
    let x_rounding_degree = i32::from(cursor.read_u8()?);
    let max_x_scan_range = cursor.read_f32(LE)?;
    let max_y_scan_range = cursor.read_f32(LE)?;
    cursor.skip(12)?;
    let initial_frames = cursor.read_i32(LE)?;
    let num_frames = cursor.read_i32(LE)?;
    let afm_id = cursor.read_i32(LE)?;
    let file_id = i32::from(cursor.read_i16(LE)?);
    let user_name = read_wide_text(cursor, user_name_size)?;
    let scanner_sensitivity = cursor.read_f32(LE)?;
    let phase_sensitivity = cursor.read_f32(LE)?;
    let scan_direction = cursor.read_i32(LE)?;
    cursor.skip(comment_offset_size as usize)?;
    let comment = cursor.read_fixed_string(comment_size as usize, TextEncoding::Latin1)?;

    Ok(AsdHeader {
        version: 0,
        channel1,
        channel2,
        header_length,
        frame_header_length,
        text_encoding: None,
        user_name_size,
        comment_offset_size: Some(comment_offset_size),
        comment_size,
        x_pixels,
        y_pixels,
        x_nm,
        y_nm,
        frame_time,
        x_piezo_extension: None,
        y_piezo_extension: None,
        z_piezo_extension,
        z_piezo_gain,
        analogue_digital_range,
        analogue_digital_data_bits_size,
        is_averaged,
        averaging_window,
        date,
        x_rounding_degree,
        y_rounding_degree: None,
        max_x_scan_range,
        max_y_scan_range,
        initial_frames,
        num_frames,
        afm_id,
        file_id,
        user_name,
        scanner_sensitivity,
        phase_sensitivity,
        scan_direction,
        offset: None,
        comment,
        colour: None,
    })
}

fn parse_v1(cursor: &mut ByteCursor, version: i32) -> Result<AsdHeader, DecodeError> {
    let header_length = cursor.read_i32(LE)?;
    let frame_header_length = cursor.read_i32(LE)?;
    let text_encoding = cursor.read_i32(LE)?;
    let user_name_size = read_size(cursor, "user name size")?;
    let comment_size = read_size(cursor, "comment size")?;
    let channel1 = cursor.read_fixed_string(4, TextEncoding::Utf16Le)?;
    let channel2 = cursor.read_fixed_string(4, TextEncoding::Utf16Le)?;
    let initial_frames = cursor.read_i32(LE)?;
    let num_frames = cursor.read_i32(LE)?;
    let scan_direction = cursor.read_i32(LE)?;
    let file_id = cursor.read_i32(LE)?;
    let x_pixels = cursor.read_i32(LE)?;
    let y_pixels = cursor.read_i32(LE)?;
    let x_nm = cursor.read_i32(LE)?;
    let y_nm = cursor.read_i32(LE)?;
    let is_averaged = cursor.read_bool()?;
    let averaging_window = cursor.read_i32(LE)?;
    let date = AcquisitionDate {
        year: cursor.read_i32(LE)?,
        month: cursor.read_i32(LE)?,
        day: cursor.read_i32(LE)?,
        hour: cursor.read_i32(LE)?,
        minute: cursor.read_i32(LE)?,
        second: cursor.read_i32(LE)?,
    };
    let x_rounding_degree = cursor.read_i32(LE)?;
    let y_rounding_degree = cursor.read_i32(LE)?;
    let frame_time = cursor.read_f32(LE)?;
    let scanner_sensitivity = cursor.read_f32(LE)?;
    let phase_sensitivity = cursor.read_f32(LE)?;
    let offset = cursor.read_i32(LE)?;
    cursor.skip(12)?;
    let afm_id = cursor.read_i32(LE)?;
    let analogue_digital_range = cursor.read_u32(LE)?;
    let analogue_digital_data_bits_size = cursor.read_i32(LE)?;
    let max_x_scan_range = cursor.read_f32(LE)?;
    let max_y_scan_range = cursor.read_f32(LE)?;
    let x_piezo_extension = cursor.read_f32(LE)?;
    let y_piezo_extension = cursor.read_f32(LE)?;
    let z_piezo_extension = cursor.read_f32(LE)?;
    let z_piezo_gain = cursor.read_f32(LE)?;
    let user_name = cursor.read_fixed_string(user_name_size as usize, TextEncoding::Latin1)?;
    let comment = cursor.read_fixed_string(comment_size as usize, TextEncoding::Latin1)?;

    Ok(AsdHeader {
        version,
        channel1,
        channel2,
        header_length,
        frame_header_length,
        text_encoding: Some(text_encoding),
        user_name_size,
        comment_offset_size: None,
        comment_size,
        x_pixels,
        y_pixels,
        x_nm,
        y_nm,
        frame_time,
        x_piezo_extension: Some(x_piezo_extension),
        y_piezo_extension: Some(y_piezo_extension),
        z_piezo_extension,
        z_piezo_gain,
        analogue_digital_range,
        analogue_digital_data_bits_size,
        is_averaged,
        averaging_window,
        date,
        x_rounding_degree,
        y_rounding_degree: Some(y_rounding_degree),
        max_x_scan_range,
        max_y_scan_range,
        initial_frames,
        num_frames,
        afm_id,
        file_id,
        user_name,
        scanner_sensitivity,
        phase_sensitivity,
        scan_direction,
        offset: Some(offset),
        comment,
        colour: None,
    })
}

fn read_anchor_points(cursor: &mut ByteCursor, count: i32) -> Result<Vec<(i32, i32)>, DecodeError> {
    cursor.ensure_elements(count as u64, 8)?;
    (0..count)
        .map(|_| -> Result<(i32, i32), DecodeError> {
            Ok((cursor.read_i32(LE)?, cursor.read_i32(LE)?))
        })
        .collect()
}

fn parse_colour_settings(cursor: &mut ByteCursor) -> Result<ColourSettings, DecodeError> {
    let number_of_frames = cursor.read_i32(LE)?;
    let x_feed_forward_integer = cursor.read_i32(LE)?;
    let x_feed_forward_double = cursor.read_f64(LE)?;
    let max_colour_scale = cursor.read_i32(LE)?;
    let min_colour_scale = cursor.read_i32(LE)?;
    let red = read_size(cursor, "red anchor point count")?;
    let green = read_size(cursor, "green anchor point count")?;
    let blue = read_size(cursor, "blue anchor point count")?;

    Ok(ColourSettings {
        number_of_frames,
        x_feed_forward_integer,
        x_feed_forward_double,
        max_colour_scale,
        min_colour_scale,
        red_anchor_points: read_anchor_points(cursor, red)?,
        green_anchor_points: read_anchor_points(cursor, green)?,
        blue_anchor_points: read_anchor_points(cursor, blue)?,
    })
}

// =============================================================================
// Frame header
// =============================================================================

/// Per-frame record header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameHeader {
    pub number: i32,
    pub max_data: i16,
    pub min_data: i16,
    pub x_offset: i16,
    pub y_offset: i16,
    pub x_tilt: f32,
    pub y_tilt: f32,
    pub is_stimulated: bool,
}

impl FrameHeader {
    /// Parse the fixed structure; reserved trailing bytes are skipped.
    pub fn parse(cursor: &mut ByteCursor) -> Result<Self, DecodeError> {
        let header = FrameHeader {
            number: cursor.read_i32(LE)?,
            max_data: cursor.read_i16(LE)?,
            min_data: cursor.read_i16(LE)?,
            x_offset: cursor.read_i16(LE)?,
            y_offset: cursor.read_i16(LE)?,
            x_tilt: cursor.read_f32(LE)?,
            y_tilt: cursor.read_f32(LE)?,
            is_stimulated: cursor.read_bool()?,
        };
        // i8, i16, i32, i32 reserved
        cursor.skip(11)?;
        Ok(header)
    }
}
