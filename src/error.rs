use thiserror::Error;

/// I/O errors that can occur when reading an input file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Input file does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// File exists but could not be read
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
}

/// Errors in the external tag-id mapping document
#[derive(Debug, Clone, Error)]
pub enum TagMapError {
    /// Document is not a valid JSON key -> id object
    #[error("Tag mapping document could not be parsed: {0}")]
    Parse(String),

    /// A key the decoder needs is not present in the document
    #[error("Tag mapping is missing required key '{0}'")]
    MissingKey(&'static str),

    /// Key is present but its id cannot address a tag
    #[error("Tag mapping key '{key}' has invalid id {value}")]
    InvalidId { key: &'static str, value: u64 },
}

/// Errors that can occur while decoding an instrument file
///
/// Every variant is a distinct outcome; no decoder returns a partial image
/// alongside one of these.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Signature or version does not identify a supported format
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Internal size or consistency violation
    #[error("Corrupt data: {reason}")]
    CorruptData { reason: String },

    /// Buffer is shorter than a declared structure requires
    #[error("Truncated data: need {needed} bytes at offset {offset}, only {available} available")]
    TruncatedData {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// Valid file, but the requested channel is not in it
    #[error("Channel '{requested}' not found, available channels: {available:?}")]
    ChannelNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// External tag-id mapping is unusable
    #[error("Configuration error: {0}")]
    Configuration(#[from] TagMapError),

    /// Directory or object lacks an expected field
    #[error("Missing required tag: {tag}")]
    MissingTag { tag: String },
}

impl DecodeError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        DecodeError::CorruptData {
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        DecodeError::UnsupportedFormat {
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_tag(tag: impl Into<String>) -> Self {
        DecodeError::MissingTag { tag: tag.into() }
    }

    /// Reinterpret a truncation inside an already length-checked span.
    ///
    /// Once a container's declared size has been verified against the buffer,
    /// running off the end of that span means the container lied about its
    /// contents, not that the file was cut short.
    pub(crate) fn into_overrun(self, context: &str) -> Self {
        match self {
            DecodeError::TruncatedData {
                offset,
                needed,
                available,
            } => DecodeError::CorruptData {
                reason: format!(
                    "{context}: field of {needed} bytes at offset {offset} overruns declared size ({available} bytes left)"
                ),
            },
            other => other,
        }
    }
}
