//! Format detection for instrument files.
//!
//! The file extension decides first. When it is missing or unknown, the
//! leading bytes are checked against each format's signature:
//!
//! - **Gwyddion**: `GWYP` magic
//! - **JPK**: TIFF or BigTIFF header in either byte order
//! - **ASD**: little-endian version word 0, 1 or 2 (weakest, tried last)

use std::path::Path;

use crate::error::DecodeError;
use crate::io::ByteOrder;

use super::gwy::is_gwy_header;
use super::tiff::{BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

// =============================================================================
// FileFormat
// =============================================================================

/// Formats decoded natively by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Gwyddion native object tree
    Gwyddion,

    /// JPK Instruments TIFF container
    Jpk,

    /// High-speed AFM movie
    Asd,
}

impl FileFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            FileFormat::Gwyddion => "Gwyddion",
            FileFormat::Jpk => "JPK Instruments",
            FileFormat::Asd => "ASD movie",
        }
    }

    /// Extensions (without the dot, lowercase) claimed by the format.
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            FileFormat::Gwyddion => &["gwy"],
            FileFormat::Jpk => &["jpk", "jpk-qi-image"],
            FileFormat::Asd => &["asd"],
        }
    }

    /// Match a file extension, ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        [FileFormat::Gwyddion, FileFormat::Jpk, FileFormat::Asd]
            .into_iter()
            .find(|f| f.extensions().contains(&extension.as_str()))
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Lowercase extension of `path`, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Detect a format from the path's extension, falling back to magic bytes.
///
/// # Errors
/// `UnsupportedFormat` when neither the extension nor the leading bytes
/// identify a native format.
pub fn detect_format(path: &Path, leading: &[u8]) -> Result<FileFormat, DecodeError> {
    if let Some(format) = extension_of(path).as_deref().and_then(FileFormat::from_extension) {
        return Ok(format);
    }

    detect_from_magic(leading).ok_or_else(|| {
        DecodeError::unsupported(format!(
            "{} is not a recognised instrument file",
            path.display()
        ))
    })
}

/// Identify a format from the first bytes of a file.
pub fn detect_from_magic(bytes: &[u8]) -> Option<FileFormat> {
    if is_gwy_header(bytes) {
        return Some(FileFormat::Gwyddion);
    }
    if is_tiff_header(bytes) {
        return Some(FileFormat::Jpk);
    }
    if is_asd_header(bytes) {
        return Some(FileFormat::Asd);
    }
    None
}

/// Check if bytes represent a valid TIFF header.
///
/// This is a quick check that can be used before attempting full parsing.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    // Check magic bytes
    let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
    if magic != 0x4949 && magic != 0x4D4D {
        return false;
    }

    let byte_order = if magic == 0x4949 {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    };

    match byte_order.read_u16(&bytes[2..4]) {
        42 => true,
        43 => bytes.len() >= BIGTIFF_HEADER_SIZE,
        _ => false,
    }
}

/// Check for a plausible ASD version word.
///
/// ASD files carry no magic; this only rules files out.
pub fn is_asd_header(bytes: &[u8]) -> bool {
    match bytes {
        [a, b, c, d, ..] => matches!(i32::from_le_bytes([*a, *b, *c, *d]), 0..=2),
        _ => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
