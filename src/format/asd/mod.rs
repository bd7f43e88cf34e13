//! High-speed AFM movies (`.asd`).
//!
//! An ASD file is a header followed by fixed-size frame records: all frames
//! of the first channel, then all frames of the second. Each record is a
//! small frame header plus `x_pixels * y_pixels` little-endian `i16` levels,
//! which are converted to physical values through the A/D range and a
//! channel-specific scaling factor.
//!
//! Frames can be decoded eagerly ([`decode_asd`]) or one at a time through
//! [`AsdReader::frames`], which keeps only the current frame in memory.
//!
//! # Example
//!
//! ```no_run
//! use probescan::format::asd::AsdReader;
//!
//! let reader = AsdReader::open("movie.asd", "TP")?;
//! for frame in reader.frames().take(10) {
//!     let frame = frame?;
//!     println!("frame {}: sum {}", frame.index, frame.image.sum());
//! }
//! # Ok::<(), probescan::DecodeError>(())
//! ```

mod converter;
mod header;
mod reader;

pub use converter::{scaling_factor, AdRange, LevelConverter, ADC_RESOLUTION};
pub use header::{AcquisitionDate, AsdHeader, ColourSettings, FrameHeader, FRAME_HEADER_SIZE};
pub use reader::{AsdReader, FrameRecord, Records};

use std::path::Path;

use bytes::Bytes;

use crate::decoded::Decoded;
use crate::error::DecodeError;
use crate::io::ByteCursor;

/// Decode every frame of one channel (`TP`, `ER` or `PH`) of an `.asd` file.
pub fn decode_asd(path: impl AsRef<Path>, channel: &str) -> Result<Decoded, DecodeError> {
    AsdReader::open(path, channel)?.into_decoded()
}

/// Decode every frame of one channel of an in-memory `.asd` buffer.
pub fn decode_asd_bytes(bytes: Bytes, channel: &str) -> Result<Decoded, DecodeError> {
    AsdReader::from_bytes(bytes, channel)?.into_decoded()
}

/// Channel codes declared in the header.
pub fn list_channels(bytes: Bytes) -> Result<Vec<String>, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);
    Ok(AsdHeader::parse(&mut cursor)?.channels())
}
