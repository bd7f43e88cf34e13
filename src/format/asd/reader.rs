use std::path::Path;

use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{debug, info, trace};

use crate::decoded::{Decoded, Metadata};
use crate::error::DecodeError;
use crate::format::calibration::{Calibration, LengthUnit};
use crate::image::{Frame, Image};
use crate::io::{read_file, ByteCursor, ByteOrder};

use super::converter::LevelConverter;
use super::header::{AsdHeader, FrameHeader};

/// One frame record: its header and converted image.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub header: FrameHeader,
    pub frame: Frame,
}

/// A validated movie, ready to produce frames of one channel.
///
/// Construction checks that every declared record is present, so iteration
/// never stops early on a short buffer.
#[derive(Debug, Clone)]
pub struct AsdReader {
    data: Bytes,
    header: AsdHeader,
    channel: String,
    converter: LevelConverter,
    calibration: Calibration,
    /// Offset of the requested channel's first record
    block_start: usize,
    record_size: usize,
}

impl AsdReader {
    /// Read a file and prepare to decode `channel`.
    pub fn open(path: impl AsRef<Path>, channel: &str) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        info!(path = %path.display(), channel, "loading ASD file");
        Self::from_bytes(read_file(path)?, channel)
    }

    /// Parse the header of an in-memory movie and prepare to decode `channel`.
    pub fn from_bytes(data: Bytes, channel: &str) -> Result<Self, DecodeError> {
        let mut cursor = ByteCursor::new(data.clone());
        let header = AsdHeader::parse(&mut cursor)?;
        let records_start = cursor.position();

        let channels = header.channels();
        let Some(channel_index) = channels.iter().position(|c| c == channel) else {
            return Err(DecodeError::ChannelNotFound {
                requested: channel.to_string(),
                available: channels,
            });
        };

        let converter = LevelConverter::for_channel(channel, &header)?;

        let sample_bytes = header
            .frame_samples()
            .checked_mul(2)
            .ok_or_else(|| DecodeError::corrupt("frame size overflows"))?;
        let record_size = sample_bytes
            .checked_add(header.frame_header_length as usize)
            .ok_or_else(|| DecodeError::corrupt("frame record size overflows"))?;
        let block_size = record_size
            .checked_mul(header.num_frames as usize)
            .ok_or_else(|| DecodeError::corrupt("frame block size overflows"))?;

        // Every declared channel block must be present, not only the requested one
        let total = block_size
            .checked_mul(channels.len())
            .ok_or_else(|| DecodeError::corrupt("frame data size overflows"))?;
        cursor.ensure(total)?;

        let calibration = Calibration::square(
            f64::from(header.x_nm),
            header.x_pixels as u64,
            f64::from(header.y_nm),
            header.y_pixels as u64,
            LengthUnit::Nanometre,
        )?;

        debug!(
            channel,
            record_size,
            frames = header.num_frames,
            "Validated ASD frame layout"
        );

        Ok(Self {
            data,
            block_start: records_start + block_size * channel_index,
            record_size,
            channel: channel.to_string(),
            header,
            converter,
            calibration,
        })
    }

    pub fn header(&self) -> &AsdHeader {
        &self.header
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn converter(&self) -> &LevelConverter {
        &self.converter
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn frame_count(&self) -> usize {
        self.header.num_frames as usize
    }

    /// `(rows, cols)` of every frame.
    pub fn frame_shape(&self) -> (usize, usize) {
        (self.header.y_pixels as usize, self.header.x_pixels as usize)
    }

    /// Header fields plus the conversion settings for this channel.
    pub fn metadata(&self) -> Result<Metadata, DecodeError> {
        let mut metadata = match serde_json::to_value(&self.header) {
            Ok(Value::Object(fields)) => fields.into_iter().collect::<Metadata>(),
            Ok(_) => Metadata::new(),
            Err(e) => return Err(DecodeError::corrupt(format!("header metadata: {e}"))),
        };
        metadata.insert("channel".into(), json!(self.channel));
        metadata.insert(
            "converter".into(),
            serde_json::to_value(self.converter)
                .map_err(|e| DecodeError::corrupt(format!("converter metadata: {e}")))?,
        );
        Ok(metadata)
    }

    /// Lazily yield frame records in acquisition order.
    pub fn records(&self) -> Records<'_> {
        let mut cursor = ByteCursor::new(self.data.clone());
        // Offsets were checked in `from_bytes`; a failed seek surfaces on first use
        let pending = cursor.seek(self.block_start).err();
        Records {
            reader: self,
            cursor,
            next_index: 0,
            pending,
        }
    }

    /// Lazily yield frames in acquisition order.
    ///
    /// Dropping the iterator early stops decoding; no further bytes are read.
    pub fn frames(&self) -> impl Iterator<Item = Result<Frame, DecodeError>> + '_ {
        self.records().map(|r| r.map(|record| record.frame))
    }

    /// Decode every frame of the channel.
    pub fn decode(&self) -> Result<Vec<Frame>, DecodeError> {
        self.frames().collect()
    }

    /// Decode every frame and wrap the movie with calibration and metadata.
    pub fn into_decoded(self) -> Result<Decoded, DecodeError> {
        let frames = self.decode()?;
        let metadata = self.metadata()?;
        info!(
            channel = %self.channel,
            frames = frames.len(),
            nm_per_pixel = self.calibration.nm_per_pixel(),
            "Decoded ASD movie"
        );
        Ok(Decoded::movie(frames, self.calibration, metadata))
    }

    fn read_record(&self, cursor: &mut ByteCursor, index: usize) -> Result<FrameRecord, DecodeError> {
        let mut record = cursor.sub_cursor(self.record_size)?;
        let mut header_span = record.sub_cursor(self.header.frame_header_length as usize)?;
        let header = FrameHeader::parse(&mut header_span)
            .map_err(|e| e.into_overrun("frame header"))?;

        let (rows, cols) = self.frame_shape();
        let samples = (0..rows * cols)
            .map(|_| {
                record
                    .read_i16(ByteOrder::LittleEndian)
                    .map(|level| self.converter.convert(level))
            })
            .collect::<Result<Vec<f64>, DecodeError>>()
            .map_err(|e| e.into_overrun("frame samples"))?;

        trace!(index, number = header.number, "Read ASD frame");
        Ok(FrameRecord {
            header,
            frame: Frame {
                index,
                image: Image::from_vec(rows, cols, samples)?,
            },
        })
    }
}

/// Iterator over the frame records of one channel.
pub struct Records<'a> {
    reader: &'a AsdReader,
    cursor: ByteCursor,
    next_index: usize,
    pending: Option<DecodeError>,
}

impl Iterator for Records<'_> {
    type Item = Result<FrameRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = self.reader.frame_count();
        if self.next_index >= count {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.next_index = count;
            return Some(Err(err));
        }

        let index = self.next_index;
        match self.reader.read_record(&mut self.cursor, index) {
            Ok(record) => {
                self.next_index += 1;
                Some(Ok(record))
            }
            Err(err) => {
                // Fuse after an error
                self.next_index = count;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.reader.frame_count().saturating_sub(self.next_index);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Records<'_> {}
