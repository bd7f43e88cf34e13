//! Projection of a parsed object tree onto one image channel.
//!
//! A Gwyddion container stores each channel as a group of top-level
//! components sharing an `/<N>/data` prefix:
//!
//! ```text
//! /0/data         GwyDataField { xres, yres, xreal, yreal, si_unit_xy, si_unit_z, data }
//! /0/data/title   "Height"
//! /0/meta         GwyContainer { free-form strings }
//! ```

use serde_json::Value;
use tracing::debug;

use crate::decoded::{Decoded, Metadata};
use crate::error::DecodeError;
use crate::format::calibration::{Calibration, LengthUnit};
use crate::image::Image;

use super::value::{GwyObject, GwyValue};

const TITLE_SUFFIX: &str = "/data/title";

// =============================================================================
// Channel Index
// =============================================================================

/// A channel found in the root container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GwyChannel {
    /// Channel title as shown in Gwyddion (e.g. "Height")
    pub title: String,
    /// Numeric channel id from the key (`0` in `/0/data/title`)
    pub id: u32,
    /// Key prefix as stored, with or without the leading slash (`/0`)
    prefix: String,
}

impl GwyChannel {
    fn data_key(&self) -> String {
        format!("{}/data", self.prefix)
    }

    fn meta_key(&self) -> String {
        format!("{}/meta", self.prefix)
    }
}

/// Parse a `/<N>/data/title` key into its prefix and numeric id.
fn parse_title_key(key: &str) -> Option<(&str, u32)> {
    let prefix = key.strip_suffix(TITLE_SUFFIX)?;
    let digits = prefix.strip_prefix('/').unwrap_or(prefix);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((prefix, digits.parse().ok()?))
}

/// List the channels stored in a root container, in file order.
///
/// # Errors
/// `CorruptData` if two channels share a title.
pub fn find_channels(root: &GwyObject) -> Result<Vec<GwyChannel>, DecodeError> {
    let mut channels: Vec<GwyChannel> = Vec::new();

    for (key, value) in root.components() {
        let Some((prefix, id)) = parse_title_key(key) else {
            continue;
        };
        let Some(title) = value.as_str() else {
            continue;
        };

        if channels.iter().any(|c| c.title == title) {
            return Err(DecodeError::corrupt(format!(
                "channel title '{title}' appears more than once"
            )));
        }

        channels.push(GwyChannel {
            title: title.to_string(),
            id,
            prefix: prefix.to_string(),
        });
    }

    Ok(channels)
}

// =============================================================================
// Projection
// =============================================================================

fn required_i64(field: &GwyObject, name: &str) -> Result<i64, DecodeError> {
    field
        .get(name)
        .and_then(GwyValue::as_i64)
        .ok_or_else(|| DecodeError::missing_tag(name))
}

fn required_f64(field: &GwyObject, name: &str) -> Result<f64, DecodeError> {
    field
        .get(name)
        .and_then(GwyValue::as_f64)
        .ok_or_else(|| DecodeError::missing_tag(name))
}

fn positive_dimension(field: &GwyObject, name: &str) -> Result<usize, DecodeError> {
    let value = required_i64(field, name)?;
    if value <= 0 {
        return Err(DecodeError::corrupt(format!("{name} must be positive, got {value}")));
    }
    usize::try_from(value).map_err(|_| DecodeError::corrupt(format!("{name} too large: {value}")))
}

fn unit_string<'a>(field: &'a GwyObject, name: &str) -> Option<&'a str> {
    field.get_object(name).and_then(|unit| unit.get_str("unitstr"))
}

/// Extract the named channel as a calibrated image.
///
/// Lateral extents are normalized to nanometres through `si_unit_xy`
/// (metres when absent, as Gwyddion does). Samples are normalized the same
/// way when their unit (`si_unit_z`, else `si_unit_xy`) is a length; other
/// units (volts, degrees) pass through unchanged.
pub fn project_channel(root: &GwyObject, channel: &str) -> Result<Decoded, DecodeError> {
    let channels = find_channels(root)?;
    let Some(found) = channels.iter().find(|c| c.title == channel) else {
        return Err(DecodeError::ChannelNotFound {
            requested: channel.to_string(),
            available: channels.into_iter().map(|c| c.title).collect(),
        });
    };

    let data_key = found.data_key();
    let field = root
        .get_object(&data_key)
        .ok_or_else(|| DecodeError::missing_tag(data_key.clone()))?;

    let xres = positive_dimension(field, "xres")?;
    let yres = positive_dimension(field, "yres")?;
    let xreal = required_f64(field, "xreal")?;
    let yreal = field.get("yreal").and_then(GwyValue::as_f64).unwrap_or(xreal);

    let xy_symbol = unit_string(field, "si_unit_xy").unwrap_or("m");
    let xy_unit = LengthUnit::parse(xy_symbol).ok_or_else(|| {
        DecodeError::unsupported(format!(
            "lateral unit '{xy_symbol}' of channel '{channel}' is not a length"
        ))
    })?;
    let z_symbol = unit_string(field, "si_unit_z").unwrap_or(xy_symbol);

    let samples = match field.get("data") {
        Some(GwyValue::DoubleArray(values)) => values.clone(),
        Some(other) => {
            return Err(DecodeError::corrupt(format!(
                "data of channel '{channel}' has type '{}', expected 'D'",
                other.type_tag() as char
            )));
        }
        None => return Err(DecodeError::missing_tag("data")),
    };

    let mut image = Image::from_vec(yres, xres, samples)?;
    if let Some(z_unit) = LengthUnit::parse(z_symbol) {
        image.map_in_place(|v| z_unit.to_nanometres(v));
    }

    let calibration = Calibration::square(xreal, xres as u64, yreal, yres as u64, xy_unit)?;
    debug!(
        channel,
        id = found.id,
        rows = yres,
        cols = xres,
        nm_per_pixel = calibration.nm_per_pixel(),
        "projected Gwyddion channel"
    );

    let mut metadata = Metadata::new();
    metadata.insert("channel".into(), Value::from(channel));
    metadata.insert("channel_id".into(), Value::from(found.id));
    metadata.insert("xres".into(), Value::from(xres));
    metadata.insert("yres".into(), Value::from(yres));
    metadata.insert("xreal".into(), Value::from(xreal));
    metadata.insert("yreal".into(), Value::from(yreal));
    metadata.insert("si_unit_xy".into(), Value::from(xy_symbol));
    metadata.insert("si_unit_z".into(), Value::from(z_symbol));

    if let Some(meta) = root.get_object(&found.meta_key()) {
        let entries: serde_json::Map<String, Value> = meta
            .components()
            .filter_map(|(name, value)| value.to_json().map(|v| (name.to_string(), v)))
            .collect();
        metadata.insert("meta".into(), Value::Object(entries));
    }

    Ok(Decoded::single(image, calibration, metadata))
}
