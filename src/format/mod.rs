//! Decoders for scanning-probe instrument files.
//!
//! Each submodule turns one family of files into a [`Decoded`](crate::Decoded)
//! value:
//!
//! - [`gwy`]: Gwyddion object trees
//! - [`jpk`]: JPK Instruments TIFF containers, built on [`tiff`]
//! - [`asd`]: high-speed AFM movies
//!
//! # Format Detection
//!
//! Use [`detect::detect_format`] to identify a file from its extension, with a
//! fallback to magic bytes when the extension is unknown.

pub mod asd;
pub mod calibration;
pub mod detect;
pub mod gwy;
pub mod jpk;
pub mod tiff;

pub use calibration::{Calibration, LengthUnit};
pub use detect::{detect_format, detect_from_magic, is_tiff_header, FileFormat};
