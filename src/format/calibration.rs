//! Pixel-to-distance calibration.
//!
//! Pixels are assumed square: one scalar factor describes both axes. Stored
//! extents are normalized to nanometres before dividing by the pixel count.

use serde::Serialize;
use tracing::warn;

use crate::error::DecodeError;

/// Relative tolerance when comparing the x and y pixel sizes.
const SQUARE_PIXEL_TOLERANCE: f64 = 1e-9;

// =============================================================================
// LengthUnit
// =============================================================================

/// Physical length units found in instrument files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Metre,
    Millimetre,
    Micrometre,
    Nanometre,
    Picometre,
    Angstrom,
}

impl LengthUnit {
    /// Parse a unit symbol as written by instrument software.
    ///
    /// Returns `None` for anything that is not a length (e.g. `V`, `deg`).
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "m" => Some(LengthUnit::Metre),
            "mm" => Some(LengthUnit::Millimetre),
            "um" | "\u{b5}m" | "\u{3bc}m" => Some(LengthUnit::Micrometre),
            "nm" => Some(LengthUnit::Nanometre),
            "pm" => Some(LengthUnit::Picometre),
            "A" | "\u{c5}" | "\u{212b}" => Some(LengthUnit::Angstrom),
            _ => None,
        }
    }

    /// Number of nanometres in one of this unit.
    pub const fn nanometres(self) -> f64 {
        match self {
            LengthUnit::Metre => 1e9,
            LengthUnit::Millimetre => 1e6,
            LengthUnit::Micrometre => 1e3,
            LengthUnit::Nanometre => 1.0,
            LengthUnit::Picometre => 1e-3,
            LengthUnit::Angstrom => 0.1,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Metre => "m",
            LengthUnit::Millimetre => "mm",
            LengthUnit::Micrometre => "um",
            LengthUnit::Nanometre => "nm",
            LengthUnit::Picometre => "pm",
            LengthUnit::Angstrom => "A",
        }
    }

    /// Convert `value` in this unit to nanometres.
    #[inline]
    pub fn to_nanometres(self, value: f64) -> f64 {
        value * self.nanometres()
    }
}

// =============================================================================
// Calibration
// =============================================================================

/// Physical distance covered by one pixel, in nanometres.
///
/// Always strictly positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Calibration(f64);

impl Calibration {
    /// Wrap a nanometres-per-pixel value.
    ///
    /// # Errors
    /// `CorruptData` if the value is zero, negative, NaN or infinite.
    pub fn new(nm_per_pixel: f64) -> Result<Self, DecodeError> {
        if nm_per_pixel.is_finite() && nm_per_pixel > 0.0 {
            Ok(Self(nm_per_pixel))
        } else {
            Err(DecodeError::corrupt(format!(
                "calibration must be positive and finite, got {nm_per_pixel}"
            )))
        }
    }

    /// Derive a calibration from a physical extent spanning `pixels` pixels.
    pub fn from_extent(extent: f64, unit: LengthUnit, pixels: u64) -> Result<Self, DecodeError> {
        if pixels == 0 {
            return Err(DecodeError::corrupt("cannot calibrate an axis with 0 pixels"));
        }
        Self::new(unit.to_nanometres(extent) / pixels as f64)
    }

    /// Derive one calibration for a square-pixel grid from both axes.
    ///
    /// The x axis wins; a mismatch with the y axis is logged, not rejected.
    pub fn square(
        x_extent: f64,
        x_pixels: u64,
        y_extent: f64,
        y_pixels: u64,
        unit: LengthUnit,
    ) -> Result<Self, DecodeError> {
        let x = Self::from_extent(x_extent, unit, x_pixels)?;
        if let Ok(y) = Self::from_extent(y_extent, unit, y_pixels) {
            let diff = (x.0 - y.0).abs();
            if diff > SQUARE_PIXEL_TOLERANCE * x.0.max(y.0) {
                warn!(
                    x_nm_per_pixel = x.0,
                    y_nm_per_pixel = y.0,
                    "pixels are not square; using x axis calibration"
                );
            }
        }
        Ok(x)
    }

    #[inline]
    pub fn nm_per_pixel(self) -> f64 {
        self.0
    }
}
