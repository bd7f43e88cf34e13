//! The uniform output of every decoder.

use std::collections::BTreeMap;

use crate::format::calibration::Calibration;
use crate::image::{Frame, Image};

/// Free-form acquisition metadata, passed through uninterpreted.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Decoded pixel data: one image, or an ordered movie.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    Single(Image),
    /// Frames in acquisition order; all share dimensions
    Movie(Vec<Frame>),
}

impl ImageData {
    /// Number of images carried (1 for a single image).
    pub fn frame_count(&self) -> usize {
        match self {
            ImageData::Single(_) => 1,
            ImageData::Movie(frames) => frames.len(),
        }
    }

    /// `(rows, cols)` of the image(s), `None` for an empty movie.
    pub fn shape(&self) -> Option<(usize, usize)> {
        match self {
            ImageData::Single(image) => Some(image.shape()),
            ImageData::Movie(frames) => frames.first().map(|f| f.image.shape()),
        }
    }

    /// Iterate over every image in order.
    pub fn images(&self) -> Box<dyn Iterator<Item = &Image> + '_> {
        match self {
            ImageData::Single(image) => Box::new(std::iter::once(image)),
            ImageData::Movie(frames) => Box::new(frames.iter().map(|f| &f.image)),
        }
    }

    pub fn as_single(&self) -> Option<&Image> {
        match self {
            ImageData::Single(image) => Some(image),
            ImageData::Movie(_) => None,
        }
    }

    pub fn as_movie(&self) -> Option<&[Frame]> {
        match self {
            ImageData::Single(_) => None,
            ImageData::Movie(frames) => Some(frames),
        }
    }
}

/// Result of one decode call: pixels, calibration, and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub data: ImageData,
    pub calibration: Calibration,
    pub metadata: Metadata,
}

impl Decoded {
    pub fn single(image: Image, calibration: Calibration, metadata: Metadata) -> Self {
        Self {
            data: ImageData::Single(image),
            calibration,
            metadata,
        }
    }

    pub fn movie(frames: Vec<Frame>, calibration: Calibration, metadata: Metadata) -> Self {
        Self {
            data: ImageData::Movie(frames),
            calibration,
            metadata,
        }
    }
}
