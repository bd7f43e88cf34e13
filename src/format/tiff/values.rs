//! TIFF tag value reading.
//!
//! Values are stored either inline in the directory entry (when they fit in
//! the value/offset field) or at an offset elsewhere in the file. Offset
//! values are bounds-checked against the buffer before they are read.

use bytes::Bytes;

use crate::error::DecodeError;
use crate::io::{decode_text, ByteCursor, ByteOrder, TextEncoding};

use super::parser::{TagEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from an in-memory TIFF buffer.
///
/// Combines the file buffer with the header so values are decoded in the
/// file's byte order.
pub struct ValueReader<'a> {
    data: &'a Bytes,
    header: &'a TiffHeader,
}

impl<'a> ValueReader<'a> {
    pub fn new(data: &'a Bytes, header: &'a TiffHeader) -> Self {
        Self { data, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, slices them out of the file buffer.
    pub fn read_bytes(&self, entry: &TagEntry) -> Result<Bytes, DecodeError> {
        let size = entry.value_byte_size().ok_or_else(|| {
            DecodeError::corrupt(format!(
                "tag {} has unreadable field type {} with count {}",
                entry.tag, entry.field_type_raw, entry.count
            ))
        })?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let mut cursor = ByteCursor::new(self.data.clone());
        let start = usize::try_from(entry.value_offset).map_err(|_| DecodeError::TruncatedData {
            offset: entry.value_offset,
            needed: size,
            available: 0,
        })?;
        cursor.seek(start)?;
        let len = cursor.ensure_elements(size, 1)?;
        cursor.read_bytes(len)
    }

    /// Read every value of a numeric entry as f64.
    ///
    /// Accepts all integer, rational, and floating point field types.
    /// Rationals with a zero denominator are corrupt.
    pub fn read_f64_array(&self, entry: &TagEntry) -> Result<Vec<f64>, DecodeError> {
        let field_type = self.numeric_type(entry)?;
        let bytes = self.read_bytes(entry)?;
        let order = self.header.byte_order;
        let width = field_type.size_in_bytes();

        bytes
            .chunks_exact(width)
            .map(|chunk| match field_type {
                FieldType::Byte => Ok(f64::from(chunk[0])),
                FieldType::SByte => Ok(f64::from(chunk[0] as i8)),
                FieldType::Short => Ok(f64::from(order.read_u16(chunk))),
                FieldType::SShort => Ok(f64::from(order.read_u16(chunk) as i16)),
                FieldType::Long => Ok(f64::from(order.read_u32(chunk))),
                FieldType::SLong => Ok(f64::from(order.read_u32(chunk) as i32)),
                FieldType::Long8 => Ok(order.read_u64(chunk) as f64),
                FieldType::SLong8 => Ok(order.read_u64(chunk) as i64 as f64),
                FieldType::Float => Ok(f64::from(order.read_f32(chunk))),
                FieldType::Double => Ok(order.read_f64(chunk)),
                FieldType::Rational => {
                    let num = order.read_u32(&chunk[..4]);
                    let den = order.read_u32(&chunk[4..]);
                    ratio(entry.tag, f64::from(num), f64::from(den))
                }
                FieldType::SRational => {
                    let num = order.read_u32(&chunk[..4]) as i32;
                    let den = order.read_u32(&chunk[4..]) as i32;
                    ratio(entry.tag, f64::from(num), f64::from(den))
                }
                FieldType::Ascii | FieldType::Undefined => Err(not_numeric(entry)),
            })
            .collect()
    }

    /// Read a single numeric value as f64.
    pub fn read_f64(&self, entry: &TagEntry) -> Result<f64, DecodeError> {
        expect_single(entry)?;
        self.read_f64_array(entry)?
            .first()
            .copied()
            .ok_or_else(|| not_numeric(entry))
    }

    /// Read every value of an unsigned integer entry as u64.
    ///
    /// Accepts Byte, Short, Long, and Long8. Signed types are accepted when
    /// every value is non-negative.
    pub fn read_u64_array(&self, entry: &TagEntry) -> Result<Vec<u64>, DecodeError> {
        let field_type = self.numeric_type(entry)?;
        let bytes = self.read_bytes(entry)?;
        let order = self.header.byte_order;
        let width = field_type.size_in_bytes();

        bytes
            .chunks_exact(width)
            .map(|chunk| {
                let signed: i128 = match field_type {
                    FieldType::Byte => i128::from(chunk[0]),
                    FieldType::SByte => i128::from(chunk[0] as i8),
                    FieldType::Short => i128::from(order.read_u16(chunk)),
                    FieldType::SShort => i128::from(order.read_u16(chunk) as i16),
                    FieldType::Long => i128::from(order.read_u32(chunk)),
                    FieldType::SLong => i128::from(order.read_u32(chunk) as i32),
                    FieldType::Long8 => i128::from(order.read_u64(chunk)),
                    FieldType::SLong8 => i128::from(order.read_u64(chunk) as i64),
                    _ => return Err(not_integer(entry)),
                };
                u64::try_from(signed).map_err(|_| {
                    DecodeError::corrupt(format!(
                        "tag {} holds negative value {signed} where a size or offset was expected",
                        entry.tag
                    ))
                })
            })
            .collect()
    }

    /// Read a single unsigned integer value.
    pub fn read_u64(&self, entry: &TagEntry) -> Result<u64, DecodeError> {
        expect_single(entry)?;
        self.read_u64_array(entry)?
            .first()
            .copied()
            .ok_or_else(|| not_integer(entry))
    }

    /// Read an Ascii entry as a string.
    ///
    /// Trailing NULs are dropped. Bytes outside ASCII are decoded as UTF-8
    /// with a Latin-1 fallback, since instrument software is not strict.
    pub fn read_string(&self, entry: &TagEntry) -> Result<String, DecodeError> {
        match entry.field_type {
            Some(FieldType::Ascii) | Some(FieldType::Byte) | Some(FieldType::Undefined) => {}
            _ => {
                return Err(DecodeError::corrupt(format!(
                    "tag {} is not a string (field type {})",
                    entry.tag, entry.field_type_raw
                )))
            }
        }
        let bytes = self.read_bytes(entry)?;
        decode_text(&bytes, TextEncoding::Utf8)
    }

    fn numeric_type(&self, entry: &TagEntry) -> Result<FieldType, DecodeError> {
        match entry.field_type {
            Some(FieldType::Ascii) | Some(FieldType::Undefined) | None => Err(not_numeric(entry)),
            Some(ft) => Ok(ft),
        }
    }
}

fn ratio(tag: u16, num: f64, den: f64) -> Result<f64, DecodeError> {
    if den == 0.0 {
        return Err(DecodeError::corrupt(format!(
            "tag {tag} holds a rational with zero denominator"
        )));
    }
    Ok(num / den)
}

fn expect_single(entry: &TagEntry) -> Result<(), DecodeError> {
    if entry.count != 1 {
        return Err(DecodeError::corrupt(format!(
            "tag {}: expected count 1, got {}",
            entry.tag, entry.count
        )));
    }
    Ok(())
}

fn not_numeric(entry: &TagEntry) -> DecodeError {
    DecodeError::corrupt(format!(
        "tag {} is not numeric (field type {})",
        entry.tag, entry.field_type_raw
    ))
}

fn not_integer(entry: &TagEntry) -> DecodeError {
    DecodeError::corrupt(format!(
        "tag {} is not an integer (field type {})",
        entry.tag, entry.field_type_raw
    ))
}

// =============================================================================
// Tests
// =============================================================================
