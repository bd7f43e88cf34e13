//! Uncompressed strip image assembly.
//!
//! A page's pixels are the concatenation of its strips, each located by the
//! `StripOffsets` and `StripByteCounts` tags. Samples are decoded according
//! to `BitsPerSample`, `SampleFormat`, and the file byte order.

use bytes::Bytes;
use tracing::trace;

use crate::error::DecodeError;
use crate::io::{ByteCursor, ByteOrder};

use super::parser::{TagDirectory, TiffHeader};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

// =============================================================================
// Sample Encoding
// =============================================================================

/// Interpretation of a sample's bits, from the `SampleFormat` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Unsigned,
    Signed,
    Float,
}

impl SampleKind {
    /// Map a `SampleFormat` value. Absent tag means unsigned.
    pub fn from_sample_format(value: u64) -> Result<Self, DecodeError> {
        match value {
            1 => Ok(SampleKind::Unsigned),
            2 => Ok(SampleKind::Signed),
            3 => Ok(SampleKind::Float),
            other => Err(DecodeError::unsupported(format!(
                "sample format {other} is not supported"
            ))),
        }
    }
}

/// How one pixel sample is laid out in a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEncoding {
    pub bits: u16,
    pub kind: SampleKind,
    pub order: ByteOrder,
}

impl SampleEncoding {
    /// Build an encoding, rejecting combinations that have no native type.
    pub fn new(bits: u64, kind: SampleKind, order: ByteOrder) -> Result<Self, DecodeError> {
        let supported = match kind {
            SampleKind::Unsigned | SampleKind::Signed => matches!(bits, 8 | 16 | 32 | 64),
            SampleKind::Float => matches!(bits, 32 | 64),
        };
        if !supported {
            return Err(DecodeError::unsupported(format!(
                "{bits}-bit {kind:?} samples are not supported"
            )));
        }
        Ok(Self {
            bits: bits as u16,
            kind,
            order,
        })
    }

    /// Bytes per sample.
    #[inline]
    pub fn width(&self) -> usize {
        usize::from(self.bits / 8)
    }

    /// Decode one sample from exactly `width()` bytes.
    fn decode_one(&self, b: &[u8]) -> f64 {
        let order = self.order;
        match (self.kind, self.bits) {
            (SampleKind::Unsigned, 8) => f64::from(b[0]),
            (SampleKind::Signed, 8) => f64::from(b[0] as i8),
            (SampleKind::Unsigned, 16) => f64::from(order.read_u16(b)),
            (SampleKind::Signed, 16) => f64::from(order.read_u16(b) as i16),
            (SampleKind::Unsigned, 32) => f64::from(order.read_u32(b)),
            (SampleKind::Signed, 32) => f64::from(order.read_u32(b) as i32),
            (SampleKind::Unsigned, _) => order.read_u64(b) as f64,
            (SampleKind::Signed, _) => order.read_u64(b) as i64 as f64,
            (SampleKind::Float, 32) => f64::from(order.read_f32(b)),
            (SampleKind::Float, _) => order.read_f64(b),
        }
    }

    /// Decode a buffer of packed samples.
    pub fn decode(&self, bytes: &[u8]) -> Vec<f64> {
        bytes
            .chunks_exact(self.width())
            .map(|chunk| self.decode_one(chunk))
            .collect()
    }
}

// =============================================================================
// Strip Image
// =============================================================================

/// Geometry and encoding of one page's raster.
#[derive(Debug, Clone, PartialEq)]
pub struct StripLayout {
    pub width: usize,
    pub height: usize,
    pub encoding: SampleEncoding,
    pub strip_offsets: Vec<u64>,
    pub strip_byte_counts: Vec<u64>,
}

fn required_u64(
    reader: &ValueReader<'_>,
    dir: &TagDirectory,
    tag: TiffTag,
) -> Result<u64, DecodeError> {
    let entry = dir
        .get(tag.as_u16())
        .ok_or_else(|| DecodeError::missing_tag(tag.name()))?;
    reader.read_u64(entry)
}

fn optional_u64(
    reader: &ValueReader<'_>,
    dir: &TagDirectory,
    tag: TiffTag,
    default: u64,
) -> Result<u64, DecodeError> {
    match dir.get(tag.as_u16()) {
        // Multi-sample pages repeat the value per sample; the first one decides
        Some(entry) => reader
            .read_u64_array(entry)?
            .first()
            .copied()
            .ok_or_else(|| DecodeError::corrupt(format!("{} has no values", tag.name()))),
        None => Ok(default),
    }
}

impl StripLayout {
    /// Read and validate the raster tags of one directory.
    pub fn from_directory(
        data: &Bytes,
        header: &TiffHeader,
        dir: &TagDirectory,
    ) -> Result<Self, DecodeError> {
        let reader = ValueReader::new(data, header);

        let width = required_u64(&reader, dir, TiffTag::ImageWidth)?;
        let height = required_u64(&reader, dir, TiffTag::ImageLength)?;

        let compression = optional_u64(&reader, dir, TiffTag::Compression, 1)?;
        let supported = u16::try_from(compression)
            .ok()
            .and_then(Compression::from_u16)
            .map(Compression::is_supported)
            .unwrap_or(false);
        if !supported {
            return Err(DecodeError::unsupported(format!(
                "compression scheme {compression} is not supported"
            )));
        }

        let samples = optional_u64(&reader, dir, TiffTag::SamplesPerPixel, 1)?;
        if samples != 1 {
            return Err(DecodeError::unsupported(format!(
                "{samples} samples per pixel; only single-sample pages are supported"
            )));
        }

        let bits = optional_u64(&reader, dir, TiffTag::BitsPerSample, 1)?;
        let kind =
            SampleKind::from_sample_format(optional_u64(&reader, dir, TiffTag::SampleFormat, 1)?)?;
        let encoding = SampleEncoding::new(bits, kind, header.byte_order)?;

        let offsets_entry = dir
            .get(TiffTag::StripOffsets.as_u16())
            .ok_or_else(|| DecodeError::missing_tag(TiffTag::StripOffsets.name()))?;
        let counts_entry = dir
            .get(TiffTag::StripByteCounts.as_u16())
            .ok_or_else(|| DecodeError::missing_tag(TiffTag::StripByteCounts.name()))?;
        let strip_offsets = reader.read_u64_array(offsets_entry)?;
        let strip_byte_counts = reader.read_u64_array(counts_entry)?;

        if strip_offsets.len() != strip_byte_counts.len() {
            return Err(DecodeError::corrupt(format!(
                "{} strip offsets but {} strip byte counts",
                strip_offsets.len(),
                strip_byte_counts.len()
            )));
        }

        let to_usize = |v: u64, what: &str| {
            usize::try_from(v)
                .map_err(|_| DecodeError::corrupt(format!("{what} {v} does not fit in memory")))
        };

        Ok(Self {
            width: to_usize(width, "image width")?,
            height: to_usize(height, "image height")?,
            encoding,
            strip_offsets,
            strip_byte_counts,
        })
    }

    /// Total bytes the raster occupies.
    pub fn raster_bytes(&self) -> Result<usize, DecodeError> {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.encoding.width()))
            .ok_or_else(|| {
                DecodeError::corrupt(format!(
                    "image {}x{} overflows addressable size",
                    self.width, self.height
                ))
            })
    }

    /// Concatenate strips and decode them into row-major samples.
    ///
    /// Strip bytes beyond the raster size are ignored. Strips that do not add
    /// up to the raster are corrupt; strips that point past the end of the
    /// buffer are truncated.
    pub fn read_samples(&self, data: &Bytes) -> Result<Vec<f64>, DecodeError> {
        let needed = self.raster_bytes()?;
        let declared: u64 = self
            .strip_byte_counts
            .iter()
            .try_fold(0u64, |acc, &n| acc.checked_add(n))
            .ok_or_else(|| DecodeError::corrupt("strip byte counts overflow"))?;
        if declared < needed as u64 {
            return Err(DecodeError::corrupt(format!(
                "strips hold {declared} bytes but a {}x{} raster needs {needed}",
                self.height, self.width
            )));
        }

        let mut raster = Vec::with_capacity(needed);
        let mut cursor = ByteCursor::new(data.clone());
        for (&offset, &count) in self.strip_offsets.iter().zip(&self.strip_byte_counts) {
            if raster.len() >= needed {
                break;
            }
            let take = count.min((needed - raster.len()) as u64);
            let start = usize::try_from(offset).map_err(|_| DecodeError::TruncatedData {
                offset,
                needed: take,
                available: 0,
            })?;
            cursor.seek(start)?;
            let len = cursor.ensure_elements(take, 1)?;
            raster.extend_from_slice(&cursor.read_bytes(len)?);
        }

        trace!(
            strips = self.strip_offsets.len(),
            bytes = raster.len(),
            "Assembled strip raster"
        );

        Ok(self.encoding.decode(&raster))
    }
}

// =============================================================================
// Tests
// =============================================================================
