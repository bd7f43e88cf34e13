//! Format dispatch.
//!
//! [`load`] picks a decoder for a path and returns the uniform [`Decoded`]
//! value. Decoders live in a [`DecoderRegistry`]; the native formats are
//! registered by [`DecoderRegistry::with_builtin`], and decoders for other
//! formats can be added behind the same [`FormatDecoder`] trait.
//!
//! Resolution order:
//!
//! 1. The file extension, matched case-insensitively. Later registrations
//!    take precedence, so a registered decoder can override a native one.
//! 2. The leading bytes, offered to each decoder's [`FormatDecoder::sniff`]
//!    in registration order.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::decoded::Decoded;
use crate::error::DecodeError;
use crate::format::detect::{detect_from_magic, extension_of, FileFormat};
use crate::format::jpk::{JpkOptions, TagIdMap};
use crate::format::{asd, gwy, jpk};
use crate::io::read_file;

// =============================================================================
// LoadOptions
// =============================================================================

/// Per-call options shared by every decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Tag mapping and flip setting for tag-container files
    pub jpk: JpkOptions,
}

impl LoadOptions {
    pub fn new(jpk: JpkOptions) -> Self {
        Self { jpk }
    }

    /// Options with the bundled tag mapping and default flipping.
    pub fn builtin() -> Result<Self, DecodeError> {
        Ok(Self::new(JpkOptions::builtin()?))
    }

    /// Replace the tag mapping with one read from a JSON document.
    pub fn with_tag_map_path(mut self, path: &Path) -> Result<Self, DecodeError> {
        self.jpk.tag_map = TagIdMap::from_path(path)?;
        Ok(self)
    }

    pub fn with_flip(mut self, flip_vertical: bool) -> Self {
        self.jpk = self.jpk.with_flip(flip_vertical);
        self
    }
}

// =============================================================================
// FormatDecoder
// =============================================================================

/// A decoder for one file format.
///
/// Implementations must honour the same contract as the native decoders:
/// calibrated output, `ChannelNotFound` listing the available channels, and
/// no partial result on error.
pub trait FormatDecoder: Send + Sync {
    /// Human-readable format name.
    fn name(&self) -> &str;

    /// Lowercase extensions, without the dot.
    fn extensions(&self) -> &[&str];

    /// Whether the leading bytes look like this format.
    fn sniff(&self, _leading: &[u8]) -> bool {
        false
    }

    /// Decode one channel from a whole-file buffer.
    fn decode(
        &self,
        data: Bytes,
        channel: &str,
        options: &LoadOptions,
    ) -> Result<Decoded, DecodeError>;

    /// Channels available in a whole-file buffer.
    fn list_channels(&self, data: Bytes, options: &LoadOptions)
        -> Result<Vec<String>, DecodeError>;
}

/// One of the formats decoded by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDecoder(pub FileFormat);

impl FormatDecoder for NativeDecoder {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn extensions(&self) -> &[&str] {
        self.0.extensions()
    }

    fn sniff(&self, leading: &[u8]) -> bool {
        detect_from_magic(leading) == Some(self.0)
    }

    fn decode(
        &self,
        data: Bytes,
        channel: &str,
        options: &LoadOptions,
    ) -> Result<Decoded, DecodeError> {
        match self.0 {
            FileFormat::Gwyddion => gwy::decode_gwy_bytes(data, channel),
            FileFormat::Jpk => jpk::decode_jpk_bytes(data, channel, &options.jpk),
            FileFormat::Asd => asd::decode_asd_bytes(data, channel),
        }
    }

    fn list_channels(
        &self,
        data: Bytes,
        options: &LoadOptions,
    ) -> Result<Vec<String>, DecodeError> {
        match self.0 {
            FileFormat::Gwyddion => gwy::list_channels(data),
            FileFormat::Jpk => jpk::list_channels(data, &options.jpk.tag_map),
            FileFormat::Asd => asd::list_channels(data),
        }
    }
}

// =============================================================================
// DecoderRegistry
// =============================================================================

/// Ordered collection of decoders.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn FormatDecoder>>,
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decoders.iter().map(|d| d.name()))
            .finish()
    }
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the native decoders.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for format in [FileFormat::Gwyddion, FileFormat::Jpk, FileFormat::Asd] {
            registry.register(NativeDecoder(format));
        }
        registry
    }

    /// Add a decoder. It takes precedence over earlier ones for shared
    /// extensions.
    pub fn register(&mut self, decoder: impl FormatDecoder + 'static) {
        debug!(
            name = decoder.name(),
            extensions = ?decoder.extensions(),
            "registered decoder"
        );
        self.decoders.push(Box::new(decoder));
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decoder claiming an extension (case-insensitive).
    pub fn for_extension(&self, extension: &str) -> Option<&dyn FormatDecoder> {
        let extension = extension.to_ascii_lowercase();
        self.decoders
            .iter()
            .rev()
            .find(|d| d.extensions().contains(&extension.as_str()))
            .map(|d| d.as_ref())
    }

    /// First decoder recognising the leading bytes.
    pub fn for_magic(&self, leading: &[u8]) -> Option<&dyn FormatDecoder> {
        self.decoders
            .iter()
            .find(|d| d.sniff(leading))
            .map(|d| d.as_ref())
    }

    /// Pick a decoder by extension, then by magic bytes.
    pub fn resolve(&self, path: &Path, leading: &[u8]) -> Result<&dyn FormatDecoder, DecodeError> {
        let by_extension = extension_of(path)
            .as_deref()
            .and_then(|ext| self.for_extension(ext));

        by_extension
            .or_else(|| self.for_magic(leading))
            .ok_or_else(|| {
                DecodeError::unsupported(format!(
                    "no decoder recognises {}",
                    path.display()
                ))
            })
    }

    /// Decode one channel of the file at `path`.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        channel: &str,
        options: &LoadOptions,
    ) -> Result<Decoded, DecodeError> {
        let path = path.as_ref();
        let data = read_file(path)?;
        let decoder = self.resolve(path, &data)?;
        info!(
            path = %path.display(),
            format = decoder.name(),
            channel,
            "loading file"
        );
        decoder.decode(data, channel, options)
    }

    /// List the channels of the file at `path`.
    pub fn list_channels(
        &self,
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<Vec<String>, DecodeError> {
        let path = path.as_ref();
        let data = read_file(path)?;
        let decoder = self.resolve(path, &data)?;
        debug!(path = %path.display(), format = decoder.name(), "listing channels");
        decoder.list_channels(data, options)
    }
}

// =============================================================================
// Convenience entry points
// =============================================================================

/// Decode one channel of a file with the native decoders.
pub fn load(
    path: impl AsRef<Path>,
    channel: &str,
    options: &LoadOptions,
) -> Result<Decoded, DecodeError> {
    DecoderRegistry::with_builtin().load(path, channel, options)
}

/// List the channels of a file with the native decoders.
pub fn list_channels(
    path: impl AsRef<Path>,
    options: &LoadOptions,
) -> Result<Vec<String>, DecodeError> {
    DecoderRegistry::with_builtin().list_channels(path, options)
}
