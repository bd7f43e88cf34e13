//! JPK Instruments (`.jpk`, `.jpk-qi-image`) files.
//!
//! A JPK file is a TIFF container. Page 0 carries the scan grid (physical
//! lengths and pixel counts); every later page is one channel, named by a
//! vendor tag plus a trace/retrace flag. Raw samples are converted through
//! the page's default calibration slot.
//!
//! Vendor tag ids come from a [`TagIdMap`], so files written by other
//! software versions can be read by supplying a different mapping document.
//!
//! # Example
//!
//! ```no_run
//! use probescan::format::jpk::{self, JpkOptions};
//!
//! let options = JpkOptions::builtin()?.with_flip(false);
//! let decoded = jpk::decode_jpk("scan.jpk", "height_trace", &options)?;
//! # Ok::<(), probescan::DecodeError>(())
//! ```

mod decoder;
mod mapping;
mod slots;

pub use decoder::{ChannelDescriptor, JpkOptions};
pub use mapping::{TagIdMap, DEFAULT_TAG_MAP};
pub use slots::{DefaultSlot, Scaling};

use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::decoded::Decoded;
use crate::error::DecodeError;
use crate::io::read_file;

use decoder::{decode_container, JpkContainer};

/// Decode one channel (e.g. `height_trace`) of a `.jpk` file.
pub fn decode_jpk(
    path: impl AsRef<Path>,
    channel: &str,
    options: &JpkOptions,
) -> Result<Decoded, DecodeError> {
    let path = path.as_ref();
    info!(path = %path.display(), channel, "loading JPK file");
    decode_container(read_file(path)?, channel, options)
}

/// Decode one channel of an in-memory `.jpk` buffer.
pub fn decode_jpk_bytes(
    bytes: Bytes,
    channel: &str,
    options: &JpkOptions,
) -> Result<Decoded, DecodeError> {
    decode_container(bytes, channel, options)
}

/// Channel identifiers in page order.
pub fn list_channels(bytes: Bytes, map: &TagIdMap) -> Result<Vec<String>, DecodeError> {
    let container = JpkContainer::parse(bytes, map)?;
    Ok(container.channels().iter().map(|c| c.name.clone()).collect())
}

/// Channel pages with their directory index.
pub fn describe_channels(
    bytes: Bytes,
    map: &TagIdMap,
) -> Result<Vec<ChannelDescriptor>, DecodeError> {
    let container = JpkContainer::parse(bytes, map)?;
    Ok(container.channels().to_vec())
}
