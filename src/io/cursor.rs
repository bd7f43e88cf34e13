//! Bounds-checked sequential reader over an in-memory file buffer.
//!
//! Every decoder in this crate reads through [`ByteCursor`]. A read either
//! consumes exactly the bytes it decodes or fails with
//! [`DecodeError::TruncatedData`]; it never returns zero-filled or
//! partially-read values.
//!
//! Cursors can be nested with [`ByteCursor::sub_cursor`], which carves out a
//! child bounded to a declared length. Offsets in errors stay absolute (file
//! offsets) regardless of nesting.

use bytes::Bytes;

use crate::error::DecodeError;

use super::endian::ByteOrder;

// =============================================================================
// TextEncoding
// =============================================================================

/// Text encodings used by instrument strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// 7-bit ASCII; any byte above 0x7F is rejected
    Ascii,
    /// UTF-8, falling back to Latin-1 for invalid sequences (e.g. a bare `µ`)
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
    /// UTF-16 little-endian, two bytes per code unit
    Utf16Le,
}

/// Decode raw bytes with the given encoding.
///
/// NUL characters are dropped, since instrument files pad fixed-width
/// strings with them.
pub fn decode_text(bytes: &[u8], encoding: TextEncoding) -> Result<String, DecodeError> {
    let text = match encoding {
        TextEncoding::Ascii => {
            if !bytes.is_ascii() {
                return Err(DecodeError::corrupt("non-ASCII byte in ASCII string"));
            }
            bytes.iter().map(|&b| b as char).collect::<String>()
        }
        TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        },
        TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        TextEncoding::Utf16Le => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::corrupt(format!(
                    "UTF-16 string has odd byte length {}",
                    bytes.len()
                )));
            }
            let units = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
    };

    Ok(text.chars().filter(|&c| c != '\0').collect())
}

// =============================================================================
// ByteCursor
// =============================================================================

/// Sequential, bounds-checked reader over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    buf: Bytes,
    pos: usize,
    /// Absolute file offset of `buf[0]`
    base: u64,
}

impl ByteCursor {
    /// Create a cursor positioned at the start of `buf`.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self {
            buf: buf.into(),
            pos: 0,
            base: 0,
        }
    }

    /// Total length of the underlying span.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current position relative to the start of this span.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current position as an absolute file offset.
    #[inline]
    pub fn absolute_position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Bytes left between the current position and the end of the span.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once every byte of the span has been consumed.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// The whole underlying span, independent of position.
    pub fn as_bytes(&self) -> &Bytes {
        &self.buf
    }

    fn truncated(&self, needed: usize) -> DecodeError {
        DecodeError::TruncatedData {
            offset: self.absolute_position(),
            needed: needed as u64,
            available: self.remaining() as u64,
        }
    }

    /// Fail unless at least `len` bytes remain.
    #[inline]
    pub fn ensure(&self, len: usize) -> Result<(), DecodeError> {
        if len > self.remaining() {
            Err(self.truncated(len))
        } else {
            Ok(())
        }
    }

    /// Check that `count` elements of `width` bytes fit, returning the byte total.
    ///
    /// Used before allocating storage for a declared array so an adversarial
    /// count cannot trigger a huge allocation or an overflow.
    pub fn ensure_elements(&self, count: u64, width: usize) -> Result<usize, DecodeError> {
        let total = count
            .checked_mul(width as u64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                DecodeError::corrupt(format!(
                    "element count {count} x {width} bytes overflows at offset {}",
                    self.absolute_position()
                ))
            })?;
        self.ensure(total)?;
        Ok(total)
    }

    fn take(&mut self, len: usize) -> Result<&[u8], DecodeError> {
        self.ensure(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..start + len])
    }

    /// Move to an absolute position within this span.
    ///
    /// Seeking to exactly the end is allowed; seeking past it is not.
    pub fn seek(&mut self, offset: usize) -> Result<(), DecodeError> {
        if offset > self.buf.len() {
            return Err(DecodeError::TruncatedData {
                offset: self.base,
                needed: offset as u64,
                available: self.buf.len() as u64,
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Advance past `len` bytes without decoding them.
    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.take(len).map(|_| ())
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf[self.pos])
    }

    /// Consume `len` bytes as a zero-copy slice of the buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        self.ensure(len)?;
        let slice = self.buf.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(slice)
    }

    /// Consume `len` bytes and return a cursor bounded to exactly those bytes.
    pub fn sub_cursor(&mut self, len: usize) -> Result<ByteCursor, DecodeError> {
        let base = self.absolute_position();
        let buf = self.read_bytes(len)?;
        Ok(ByteCursor { buf, pos: 0, base })
    }

    // -------------------------------------------------------------------------
    // Fixed-width reads
    // -------------------------------------------------------------------------

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    /// Read one byte as a boolean (any non-zero value is true).
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self, order: ByteOrder) -> Result<u16, DecodeError> {
        Ok(order.read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self, order: ByteOrder) -> Result<i16, DecodeError> {
        Ok(self.read_u16(order)? as i16)
    }

    pub fn read_u32(&mut self, order: ByteOrder) -> Result<u32, DecodeError> {
        Ok(order.read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self, order: ByteOrder) -> Result<i32, DecodeError> {
        Ok(self.read_u32(order)? as i32)
    }

    pub fn read_u64(&mut self, order: ByteOrder) -> Result<u64, DecodeError> {
        Ok(order.read_u64(self.take(8)?))
    }

    pub fn read_i64(&mut self, order: ByteOrder) -> Result<i64, DecodeError> {
        Ok(self.read_u64(order)? as i64)
    }

    pub fn read_f32(&mut self, order: ByteOrder) -> Result<f32, DecodeError> {
        Ok(order.read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self, order: ByteOrder) -> Result<f64, DecodeError> {
        Ok(order.read_f64(self.take(8)?))
    }

    // -------------------------------------------------------------------------
    // Strings
    // -------------------------------------------------------------------------

    /// Read a string occupying exactly `len` bytes.
    pub fn read_fixed_string(
        &mut self,
        len: usize,
        encoding: TextEncoding,
    ) -> Result<String, DecodeError> {
        let bytes = self.take(len)?;
        decode_text(bytes, encoding)
    }

    /// Read a NUL-terminated string of at most `max_len` bytes (terminator excluded).
    ///
    /// The terminator is consumed. If no terminator appears within the window
    /// the read fails as truncated and the cursor does not move.
    pub fn read_cstring(&mut self, max_len: usize) -> Result<String, DecodeError> {
        let window = self.remaining().min(max_len.saturating_add(1));
        let slice = &self.buf[self.pos..self.pos + window];

        let Some(end) = slice.iter().position(|&b| b == 0) else {
            return Err(self.truncated(window + 1));
        };

        let text = decode_text(&slice[..end], TextEncoding::Utf8)?;
        self.pos += end + 1;
        Ok(text)
    }
}

// =============================================================================
// Tests
// =============================================================================
