//! # probescan
//!
//! Decoders for scanning-probe microscope files.
//!
//! Every decoder turns one channel of an instrument file into a [`Decoded`]
//! value: a single [`Image`] or an ordered movie of [`Frame`]s, a
//! [`Calibration`] in nanometres per pixel, and free-form [`Metadata`].
//!
//! ## Formats
//!
//! - **Gwyddion** (`.gwy`): self-describing object trees
//! - **JPK Instruments** (`.jpk`, `.jpk-qi-image`): TIFF containers whose
//!   vendor tag ids come from a replaceable mapping document
//! - **ASD** (`.asd`): high-speed AFM movies, decodable frame by frame
//!
//! ## Architecture
//!
//! - [`io`] - bounds-checked [`ByteCursor`] and file input
//! - [`mod@format`] - per-format decoders, TIFF container parsing, calibration
//! - [`loader`] - extension and magic-byte dispatch through a [`DecoderRegistry`]
//! - [`config`] - CLI configuration for the `probescan` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use probescan::{load, LoadOptions};
//!
//! let options = LoadOptions::builtin()?;
//! let decoded = probescan::load("scan.gwy", "Height", &options)?;
//! println!(
//!     "{:?} at {} nm/pixel",
//!     decoded.data.shape(),
//!     decoded.calibration.nm_per_pixel()
//! );
//! # Ok::<(), probescan::DecodeError>(())
//! ```

pub mod config;
pub mod decoded;
pub mod error;
pub mod format;
pub mod image;
pub mod io;
pub mod loader;

// Re-export commonly used types
pub use config::{ChannelsConfig, Cli, Command, DecodeArgs, InspectConfig, OutputFormat};
pub use decoded::{Decoded, ImageData, Metadata};
pub use error::{DecodeError, IoError, TagMapError};
pub use format::asd::{decode_asd, AsdReader};
pub use format::gwy::decode_gwy;
pub use format::jpk::{decode_jpk, JpkOptions, TagIdMap};
pub use format::{detect_format, Calibration, FileFormat, LengthUnit};
pub use image::{Frame, Image};
pub use io::{ByteCursor, ByteOrder};
pub use loader::{load, list_channels, DecoderRegistry, FormatDecoder, LoadOptions};
