//! TIFF header and directory parsing.
//!
//! This module handles parsing of TIFF and BigTIFF file headers and the
//! chain of tag directories that follows them.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first directory (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first directory (8 bytes)
//! ```
//!
//! # Directory Structure
//!
//! ```text
//! count                 u16 (u64 for BigTIFF)
//! count x entry         12 bytes each (20 for BigTIFF)
//!   tag                 u16
//!   field type          u16
//!   value count         u32 (u64)
//!   value or offset     4 bytes (8)
//! next directory        u32 (u64), 0 terminates the chain
//! ```

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use tracing::debug;

use crate::error::DecodeError;
use crate::io::{ByteCursor, ByteOrder};

use super::tags::FieldType;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

/// Upper bound on directories followed in one file.
pub const MAX_DIRECTORIES: usize = 1024;

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
///
/// Contains the essential information needed to begin parsing directories:
/// - Byte order for reading all subsequent values
/// - Whether this is classic TIFF or BigTIFF (affects entry sizes and offset widths)
/// - Location of the first directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first directory in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from the start of a file buffer.
    ///
    /// # Errors
    /// - `UnsupportedFormat` if the byte order marker or version is unknown,
    ///   or the BigTIFF offset size is not 8
    /// - `TruncatedData` if the buffer is shorter than the header, or the
    ///   first directory offset lies beyond the end of the buffer
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let file_size = bytes.len() as u64;
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(DecodeError::TruncatedData {
                offset: 0,
                needed: TIFF_HEADER_SIZE as u64,
                available: file_size,
            });
        }

        // Read as little-endian: we are matching a byte pattern, not a value
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => {
                return Err(DecodeError::unsupported(format!(
                    "invalid TIFF byte order marker 0x{magic:04X}"
                )))
            }
        };

        let version = byte_order.read_u16(&bytes[2..4]);

        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, u64::from(byte_order.read_u32(&bytes[4..8]))),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(DecodeError::TruncatedData {
                        offset: 0,
                        needed: BIGTIFF_HEADER_SIZE as u64,
                        available: file_size,
                    });
                }

                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(DecodeError::unsupported(format!(
                        "BigTIFF offset size must be 8, got {offset_size}"
                    )));
                }

                // Bytes 6-7 are reserved and not checked
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            _ => {
                return Err(DecodeError::unsupported(format!(
                    "invalid TIFF version {version}"
                )))
            }
        };

        if first_ifd_offset >= file_size {
            return Err(DecodeError::TruncatedData {
                offset: first_ifd_offset,
                needed: 1,
                available: 0,
            });
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Size of a directory entry in bytes.
    ///
    /// Classic TIFF: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the value/offset field in a directory entry.
    ///
    /// This is also the inline value threshold.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    fn read_offset(&self, cursor: &mut ByteCursor) -> Result<u64, DecodeError> {
        if self.is_bigtiff {
            cursor.read_u64(self.byte_order)
        } else {
            cursor.read_u32(self.byte_order).map(u64::from)
        }
    }

    /// Directory entry counts are 16-bit in classic TIFF and 64-bit in BigTIFF.
    fn read_entry_count(&self, cursor: &mut ByteCursor) -> Result<u64, DecodeError> {
        if self.is_bigtiff {
            cursor.read_u64(self.byte_order)
        } else {
            cursor.read_u16(self.byte_order).map(u64::from)
        }
    }
}

// =============================================================================
// TagEntry
// =============================================================================

/// One entry of a tag directory.
///
/// The value itself is not decoded here; see [`super::ValueReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// Numeric tag id
    pub tag: u16,

    /// Decoded field type, `None` if the type code is unknown
    pub field_type: Option<FieldType>,

    /// Raw field type code as stored in the file
    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw value/offset field, left-aligned; only the first
    /// `value_offset_size()` bytes are meaningful
    pub value_offset_bytes: [u8; 8],

    /// Offset interpretation of the value field
    pub value_offset: u64,

    /// Whether the value is stored in `value_offset_bytes`
    pub is_inline: bool,
}

impl TagEntry {
    fn parse(cursor: &mut ByteCursor, header: &TiffHeader) -> Result<Self, DecodeError> {
        let order = header.byte_order;
        let tag = cursor.read_u16(order)?;
        let field_type_raw = cursor.read_u16(order)?;
        let count = header.read_offset(cursor)?;

        let width = header.value_offset_size();
        let raw = cursor.read_bytes(width)?;
        let mut value_offset_bytes = [0u8; 8];
        value_offset_bytes[..width].copy_from_slice(&raw);

        let value_offset = if header.is_bigtiff {
            order.read_u64(&value_offset_bytes)
        } else {
            u64::from(order.read_u32(&value_offset_bytes))
        };

        let field_type = FieldType::from_u16(field_type_raw);
        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        Ok(TagEntry {
            tag,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            value_offset,
            is_inline,
        })
    }

    /// Total size of the value in bytes, `None` for unknown types or overflow.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .and_then(|ft| (ft.size_in_bytes() as u64).checked_mul(self.count))
    }
}

// =============================================================================
// TagDirectory
// =============================================================================

/// One parsed directory (page) of a TIFF file.
#[derive(Debug, Clone)]
pub struct TagDirectory {
    /// Absolute offset of this directory
    pub offset: u64,

    /// Entries keyed by tag id
    entries: HashMap<u16, TagEntry>,

    /// Offset of the next directory, 0 at the end of the chain
    pub next_offset: u64,
}

impl TagDirectory {
    /// Parse the directory at `offset`.
    ///
    /// When a tag id repeats, the first entry wins.
    pub fn parse(data: &Bytes, header: &TiffHeader, offset: u64) -> Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(data.clone());
        let start = usize::try_from(offset).map_err(|_| DecodeError::TruncatedData {
            offset,
            needed: 1,
            available: 0,
        })?;
        cursor.seek(start)?;

        let count = header.read_entry_count(&mut cursor)?;
        cursor.ensure_elements(count, header.ifd_entry_size())?;

        let mut entries = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let entry = TagEntry::parse(&mut cursor, header)?;
            entries.entry(entry.tag).or_insert(entry);
        }

        let next_offset = header.read_offset(&mut cursor)?;

        Ok(TagDirectory {
            offset,
            entries,
            next_offset,
        })
    }

    /// Look up an entry by tag id.
    #[inline]
    pub fn get(&self, tag: u16) -> Option<&TagEntry> {
        self.entries.get(&tag)
    }

    #[inline]
    pub fn contains(&self, tag: u16) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Number of distinct tags in this directory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in ascending tag order.
    pub fn entries(&self) -> impl Iterator<Item = &TagEntry> {
        let mut sorted: Vec<&TagEntry> = self.entries.values().collect();
        sorted.sort_by_key(|e| e.tag);
        sorted.into_iter()
    }
}

// =============================================================================
// Directory Chain
// =============================================================================

/// Parse the header and every directory in the chain, in file order.
///
/// # Errors
/// - `CorruptData` if the chain revisits a directory or exceeds
///   [`MAX_DIRECTORIES`]
/// - `TruncatedData` if a directory lies beyond the end of the buffer
pub fn read_directories(data: &Bytes) -> Result<(TiffHeader, Vec<TagDirectory>), DecodeError> {
    let header = TiffHeader::parse(data)?;

    let mut directories = Vec::new();
    let mut visited = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        if !visited.insert(offset) {
            return Err(DecodeError::corrupt(format!(
                "directory chain loops back to offset {offset}"
            )));
        }
        if directories.len() >= MAX_DIRECTORIES {
            return Err(DecodeError::corrupt(format!(
                "more than {MAX_DIRECTORIES} directories in chain"
            )));
        }

        let directory = TagDirectory::parse(data, &header, offset)?;
        offset = directory.next_offset;
        directories.push(directory);
    }

    debug!(
        directories = directories.len(),
        bigtiff = header.is_bigtiff,
        "Parsed TIFF directory chain"
    );

    Ok((header, directories))
}

// =============================================================================
// Tests
// =============================================================================
