//! Gwyddion native (`.gwy`) files.
//!
//! Gwyddion stores a self-describing tree of typed objects. Decoding happens
//! in two steps: [`parse_gwy`] builds the bounded object tree, then
//! [`project_channel`] pulls one channel's data field out of it as a
//! calibrated image. The tree is dropped as soon as the projection returns.
//!
//! # Example
//!
//! ```no_run
//! use probescan::format::gwy;
//!
//! let decoded = gwy::decode_gwy("scan.gwy", "Height")?;
//! println!("{} nm per pixel", decoded.calibration.nm_per_pixel());
//! # Ok::<(), probescan::DecodeError>(())
//! ```

mod channel;
mod parser;
mod value;

pub use channel::{find_channels, project_channel, GwyChannel};
pub use parser::{is_gwy_header, parse_gwy, GWY_MAGIC, MAX_NESTING_DEPTH};
pub use value::{tag, GwyObject, GwyValue};

use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::decoded::Decoded;
use crate::error::DecodeError;
use crate::io::read_file;

/// Decode one channel of a `.gwy` file.
pub fn decode_gwy(path: impl AsRef<Path>, channel: &str) -> Result<Decoded, DecodeError> {
    let path = path.as_ref();
    info!(path = %path.display(), channel, "loading Gwyddion file");
    decode_gwy_bytes(read_file(path)?, channel)
}

/// Decode one channel of an in-memory `.gwy` buffer.
pub fn decode_gwy_bytes(bytes: Bytes, channel: &str) -> Result<Decoded, DecodeError> {
    let root = parse_gwy(bytes)?;
    project_channel(&root, channel)
}

/// Titles of every channel in a `.gwy` buffer.
pub fn list_channels(bytes: Bytes) -> Result<Vec<String>, DecodeError> {
    let root = parse_gwy(bytes)?;
    Ok(find_channels(&root)?.into_iter().map(|c| c.title).collect())
}
