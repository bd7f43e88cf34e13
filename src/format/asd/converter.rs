//! Conversion of raw A/D levels to physical values.

use serde::Serialize;
use tracing::debug;

use crate::error::DecodeError;

use super::header::AsdHeader;

/// Levels of the A/D converter. The header's bit depth is informational;
/// instruments record at 12 bits and conversion always uses 4096 levels.
pub const ADC_RESOLUTION: f64 = 4096.0;

/// Voltage range of the A/D converter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "polarity", content = "volts", rename_all = "lowercase")]
pub enum AdRange {
    /// 0 to +V
    Unipolar(f64),
    /// -V to +V
    Bipolar(f64),
}

impl AdRange {
    /// Map the header's range code.
    pub fn from_code(code: u32) -> Result<Self, DecodeError> {
        match code {
            0x0000_0001 => Ok(AdRange::Unipolar(1.0)),
            0x0000_0002 => Ok(AdRange::Unipolar(2.5)),
            0x0000_0003 => Ok(AdRange::Unipolar(9.99)),
            0x0000_0004 => Ok(AdRange::Unipolar(5.0)),
            0x0001_0000 => Ok(AdRange::Bipolar(1.0)),
            0x0002_0000 => Ok(AdRange::Bipolar(2.5)),
            0x0004_0000 => Ok(AdRange::Bipolar(5.0)),
            other => Err(DecodeError::corrupt(format!(
                "unknown analogue/digital range code 0x{other:08X}"
            ))),
        }
    }
}

/// Channel-dependent multiplier from sensor settings.
///
/// `TP` (topography) uses the z piezo gain times extension, `ER` (error) the
/// negated scanner sensitivity, `PH` (phase) the negated phase sensitivity.
pub fn scaling_factor(channel: &str, header: &AsdHeader) -> Result<f64, DecodeError> {
    let factor = match channel {
        "TP" => f64::from(header.z_piezo_gain) * f64::from(header.z_piezo_extension),
        "ER" => -f64::from(header.scanner_sensitivity),
        "PH" => -f64::from(header.phase_sensitivity),
        other => {
            return Err(DecodeError::unsupported(format!(
                "no conversion known for channel code '{other}'"
            )))
        }
    };
    debug!(channel, factor, "Computed channel scaling factor");
    Ok(factor)
}

/// Converts raw levels of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelConverter {
    pub range: AdRange,
    pub scaling_factor: f64,
    pub resolution: f64,
}

impl LevelConverter {
    pub fn new(range: AdRange, scaling_factor: f64, resolution: f64) -> Self {
        Self {
            range,
            scaling_factor,
            resolution,
        }
    }

    /// Build the converter for `channel` from header settings.
    pub fn for_channel(channel: &str, header: &AsdHeader) -> Result<Self, DecodeError> {
        Ok(Self::new(
            AdRange::from_code(header.analogue_digital_range)?,
            scaling_factor(channel, header)?,
            ADC_RESOLUTION,
        ))
    }

    #[inline]
    pub fn convert(&self, level: i16) -> f64 {
        let level = f64::from(level);
        match self.range {
            AdRange::Unipolar(range) => level * (-range / self.resolution * self.scaling_factor),
            AdRange::Bipolar(range) => {
                (range - 2.0 * level * range / self.resolution) * self.scaling_factor
            }
        }
    }
}
