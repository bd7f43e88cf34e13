//! Calibration slot resolution.
//!
//! Each channel page stores `n_slots` calibration slots of `slot_size`
//! consecutive tag ids. The slot named by the page's `default_slot` tag
//! decides how raw samples map to physical values.

use tracing::debug;

use crate::error::DecodeError;
use crate::format::tiff::{TagDirectory, TagEntry, ValueReader};

use super::mapping::TagIdMap;

/// How a slot converts raw samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    /// `value * scale + offset`
    Linear { scale: f64, offset: f64 },
    /// Raw samples are already physical values
    Null,
}

impl Scaling {
    pub fn scale(&self) -> f64 {
        match self {
            Scaling::Linear { scale, .. } => *scale,
            Scaling::Null => 1.0,
        }
    }

    pub fn offset(&self) -> f64 {
        match self {
            Scaling::Linear { offset, .. } => *offset,
            Scaling::Null => 0.0,
        }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale() + self.offset()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scaling::Linear { .. } => "LinearScaling",
            Scaling::Null => "NullScaling",
        }
    }
}

/// The slot selected for a channel page.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultSlot {
    pub index: u64,
    pub name: String,
    pub scaling: Scaling,
}

/// Look up a tag that the mapping says must be present.
pub(crate) fn mapped_entry<'d>(
    dir: &'d TagDirectory,
    id: u16,
    key: &str,
) -> Result<&'d TagEntry, DecodeError> {
    dir.get(id)
        .ok_or_else(|| DecodeError::missing_tag(format!("{key} ({id})")))
}

fn slot_id(map: &TagIdMap, base: u16, slot: u64, key: &str) -> Result<u16, DecodeError> {
    map.slot_tag(base, slot).ok_or_else(|| {
        DecodeError::corrupt(format!(
            "{key} for slot {slot} lies outside the 16-bit tag range"
        ))
    })
}

/// Find the default slot of a channel page and read its scaling.
///
/// A page whose slots never name the default yields `ChannelNotFound`
/// carrying the slot names that are present.
pub fn resolve_default_slot(
    reader: &ValueReader<'_>,
    page: &TagDirectory,
    map: &TagIdMap,
    channel: &str,
) -> Result<DefaultSlot, DecodeError> {
    let n_slots = reader.read_u64(mapped_entry(page, map.n_slots, "n_slots")?)?;
    let default_name =
        reader.read_string(mapped_entry(page, map.default_slot, "default_slot")?)?;

    let mut names = Vec::new();
    let mut selected = None;
    for slot in 0..n_slots {
        let id = slot_id(map, map.first_slot_tag, slot, "first_slot_tag")?;
        // Slots without a name tag are unused
        let Some(entry) = page.get(id) else {
            continue;
        };
        let name = reader.read_string(entry)?;
        if selected.is_none() && name == default_name {
            selected = Some(slot);
        }
        names.push(name);
    }

    let Some(index) = selected else {
        return Err(DecodeError::ChannelNotFound {
            requested: format!("{channel} (default slot '{default_name}')"),
            available: names,
        });
    };

    let type_id = slot_id(map, map.first_scaling_type, index, "first_scaling_type")?;
    let scaling_type = reader.read_string(mapped_entry(page, type_id, "first_scaling_type")?)?;

    let scaling = match scaling_type.as_str() {
        "LinearScaling" => {
            let scale_id = slot_id(map, map.first_scaling_name, index, "first_scaling_name")?;
            let offset_id = slot_id(map, map.first_offset_name, index, "first_offset_name")?;
            Scaling::Linear {
                scale: reader.read_f64(mapped_entry(page, scale_id, "first_scaling_name")?)?,
                offset: reader.read_f64(mapped_entry(page, offset_id, "first_offset_name")?)?,
            }
        }
        "NullScaling" => Scaling::Null,
        other => {
            return Err(DecodeError::corrupt(format!(
                "slot '{default_name}' has unknown scaling type '{other}'"
            )))
        }
    };

    debug!(
        slot = index,
        name = %default_name,
        scaling = scaling.kind(),
        "Resolved default slot"
    );

    Ok(DefaultSlot {
        index,
        name: default_name,
        scaling,
    })
}
