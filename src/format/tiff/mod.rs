//! TIFF container parsing.
//!
//! Tag-container instrument files are TIFF files whose vendor tags carry the
//! acquisition parameters. This module knows nothing about those tags; it
//! exposes the directory chain, typed tag values, and uncompressed strip
//! rasters.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The parser handles both transparently.
//!
//! - **Directories**: Each page of the file is one directory of tagged entries.
//!   Directories form a singly linked chain starting at the header.
//!
//! - **Inline vs offset values**: Small values are stored inline in the entry,
//!   larger values are stored at an offset pointed to by the entry.

mod parser;
mod pixels;
mod tags;
mod values;

pub use parser::{
    read_directories, TagDirectory, TagEntry, TiffHeader, BIGTIFF_HEADER_SIZE,
    MAX_DIRECTORIES, TIFF_HEADER_SIZE,
};
pub use pixels::{SampleEncoding, SampleKind, StripLayout};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::ValueReader;
