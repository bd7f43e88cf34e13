//! Recursive-descent parser for the Gwyddion object grammar.
//!
//! # Wire Format
//!
//! ```text
//! file      := "GWYP" object
//! object    := name:cstring size:u32le component*     (components fill exactly `size` bytes)
//! component := name:cstring tag:u8 value
//! ```
//!
//! Arrays (`C I Q D S O`) carry a `u32le` element count before the elements.
//!
//! # Termination
//!
//! Each object's content is carved out of its parent's span with
//! [`ByteCursor::sub_cursor`], so a child can never read past what its parent
//! declared. Nesting is additionally capped at [`MAX_NESTING_DEPTH`] so
//! recursion depth does not scale with file size.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::DecodeError;
use crate::io::{ByteCursor, ByteOrder};

use super::value::{tag, GwyObject, GwyValue};

// =============================================================================
// Constants
// =============================================================================

/// File signature of Gwyddion native files
pub const GWY_MAGIC: &[u8; 4] = b"GWYP";

/// Deepest object nesting accepted before the file is declared corrupt.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Longest object/component name accepted.
const MAX_NAME_LEN: usize = 4096;

/// Smallest possible encoded object: empty name, NUL, 4-byte size.
const MIN_OBJECT_SIZE: usize = 5;

const LE: ByteOrder = ByteOrder::LittleEndian;

// =============================================================================
// Entry Point
// =============================================================================

/// Check whether a buffer starts with the Gwyddion signature.
pub fn is_gwy_header(bytes: &[u8]) -> bool {
    bytes.len() >= GWY_MAGIC.len() && &bytes[..GWY_MAGIC.len()] == GWY_MAGIC
}

/// Parse a complete `.gwy` buffer into its root object.
///
/// # Errors
/// - `UnsupportedFormat` if the signature is wrong
/// - `TruncatedData` if the root object claims more bytes than the file holds
/// - `CorruptData` if any nested value overruns its parent's declared span,
///   uses an unknown type tag, or nests deeper than [`MAX_NESTING_DEPTH`]
pub fn parse_gwy(bytes: Bytes) -> Result<GwyObject, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);

    let magic = cursor.read_bytes(GWY_MAGIC.len())?;
    if magic.as_ref() != GWY_MAGIC {
        return Err(DecodeError::unsupported(format!(
            "not a Gwyddion file: signature {:02X?}, expected \"GWYP\"",
            magic.as_ref()
        )));
    }

    let root = read_object(&mut cursor, 0)?;
    debug!(
        root = %root.name,
        components = root.len(),
        trailing = cursor.remaining(),
        "parsed Gwyddion object tree"
    );
    Ok(root)
}

// =============================================================================
// Grammar
// =============================================================================

/// Read one object from `cursor`.
///
/// Truncation errors raised while reading the header propagate unchanged, so
/// at the top level a short file reports `TruncatedData`. Inside a parent the
/// caller turns them into `CorruptData`.
fn read_object(cursor: &mut ByteCursor, depth: usize) -> Result<GwyObject, DecodeError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(DecodeError::corrupt(format!(
            "object nesting exceeds {MAX_NESTING_DEPTH} levels at offset {}",
            cursor.absolute_position()
        )));
    }

    let name = cursor.read_cstring(MAX_NAME_LEN)?;
    let size = cursor.read_u32(LE)? as usize;
    let mut body = cursor.sub_cursor(size)?;
    trace!(object = %name, size, depth, "object");

    let mut object = GwyObject::new(name);
    while !body.is_exhausted() {
        let (component, value) =
            read_component(&mut body, depth).map_err(|e| e.into_overrun(&object.name))?;
        object.push(component, value);
    }

    Ok(object)
}

fn read_component(
    body: &mut ByteCursor,
    depth: usize,
) -> Result<(String, GwyValue), DecodeError> {
    let name = body.read_cstring(MAX_NAME_LEN)?;
    let type_tag = body.read_u8()?;

    let value = match type_tag {
        tag::BOOL => GwyValue::Bool(body.read_bool()?),
        tag::CHAR => GwyValue::Char(body.read_u8()?),
        tag::INT32 => GwyValue::Int32(body.read_i32(LE)?),
        tag::INT64 => GwyValue::Int64(body.read_i64(LE)?),
        tag::DOUBLE => GwyValue::Double(body.read_f64(LE)?),
        tag::STRING => GwyValue::String(body.read_cstring(body.remaining())?),
        tag::OBJECT => GwyValue::Object(read_object(body, depth + 1)?),
        tag::CHAR_ARRAY => {
            let count = read_count(body, 1)?;
            GwyValue::CharArray(body.read_bytes(count)?)
        }
        tag::INT32_ARRAY => {
            let count = read_count(body, 4)?;
            GwyValue::Int32Array(read_n(count, || body.read_i32(LE))?)
        }
        tag::INT64_ARRAY => {
            let count = read_count(body, 8)?;
            GwyValue::Int64Array(read_n(count, || body.read_i64(LE))?)
        }
        tag::DOUBLE_ARRAY => {
            let count = read_count(body, 8)?;
            GwyValue::DoubleArray(read_n(count, || body.read_f64(LE))?)
        }
        tag::STRING_ARRAY => {
            // Every string is at least its terminator
            let count = read_count(body, 1)?;
            let mut strings = Vec::with_capacity(count);
            for _ in 0..count {
                strings.push(body.read_cstring(body.remaining())?);
            }
            GwyValue::StringArray(strings)
        }
        tag::OBJECT_ARRAY => {
            let count = read_count(body, MIN_OBJECT_SIZE)?;
            let mut objects = Vec::with_capacity(count);
            for _ in 0..count {
                objects.push(read_object(body, depth + 1)?);
            }
            GwyValue::ObjectArray(objects)
        }
        other => {
            return Err(DecodeError::corrupt(format!(
                "component '{name}' has unknown type tag 0x{other:02X} at offset {}",
                body.absolute_position() - 1
            )));
        }
    };

    let tag_char = type_tag as char;
    trace!(component = %name, tag = %tag_char, "component");
    Ok((name, value))
}

/// Read an array count and check that the minimum encoded size fits.
fn read_count(body: &mut ByteCursor, min_element_size: usize) -> Result<usize, DecodeError> {
    let count = u64::from(body.read_u32(LE)?);
    body.ensure_elements(count, min_element_size)?;
    Ok(count as usize)
}

fn read_n<T>(
    count: usize,
    mut read: impl FnMut() -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(read()?);
    }
    Ok(values)
}

// =============================================================================
// Tests
// =============================================================================
