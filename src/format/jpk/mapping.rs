//! Tag-id mapping for JPK vendor tags.
//!
//! JPK files keep acquisition parameters in private TIFF tags whose ids
//! depend on the instrument software version. The ids are therefore not
//! compiled in but read from a small JSON document mapping key names to
//! numeric ids. A default document ships inside the crate.
//!
//! The keys may sit at the top level or under a `jpk` section, the layout
//! of instrument configuration files that group settings per vendor. YAML
//! configuration files must be converted to JSON first.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{DecodeError, TagMapError};
use crate::io::read_file;

/// Mapping document bundled with the crate.
pub const DEFAULT_TAG_MAP: &str = include_str!("default_tags.json");

/// Section holding the ids in a grouped configuration document.
const SECTION: &str = "jpk";

/// Raw document shape: key name to integer id. Unknown keys are ignored.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RawTagMap(BTreeMap<String, u64>);

/// Resolved tag ids for one decode call.
///
/// Slot tags are addressed as `first_* + k * slot_size` for slot `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagIdMap {
    pub channel_name: u16,
    pub trace_retrace: u16,
    pub grid_ulength: u16,
    pub grid_vlength: u16,
    pub grid_ilength: u16,
    pub grid_jlength: u16,
    pub n_slots: u16,
    pub default_slot: u16,
    pub first_slot_tag: u16,
    pub first_scaling_type: u16,
    pub first_scaling_name: u16,
    pub first_offset_name: u16,
    pub slot_size: u16,
}

impl TagIdMap {
    /// Load the mapping bundled with the crate.
    pub fn builtin() -> Result<Self, TagMapError> {
        DEFAULT_TAG_MAP.parse()
    }

    /// Load an alternate mapping document from disk.
    pub fn from_path(path: &Path) -> Result<Self, DecodeError> {
        let bytes = read_file(path)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| TagMapError::Parse(format!("{}: {e}", path.display())))?;
        let map = text.parse::<TagIdMap>()?;
        debug!(path = %path.display(), "Loaded tag mapping");
        Ok(map)
    }

    /// Id of the tag `base + slot * slot_size`, if it is addressable.
    pub fn slot_tag(&self, base: u16, slot: u64) -> Option<u16> {
        slot.checked_mul(u64::from(self.slot_size))
            .and_then(|delta| delta.checked_add(u64::from(base)))
            .and_then(|id| u16::try_from(id).ok())
    }
}

impl FromStr for TagIdMap {
    type Err = TagMapError;

    fn from_str(document: &str) -> Result<Self, Self::Err> {
        let mut value: Value =
            serde_json::from_str(document).map_err(|e| TagMapError::Parse(e.to_string()))?;
        if let Some(section) = value.get_mut(SECTION) {
            value = section.take();
        }
        let RawTagMap(raw) =
            serde_json::from_value(value).map_err(|e| TagMapError::Parse(e.to_string()))?;

        let id = |key: &'static str| -> Result<u16, TagMapError> {
            let value = *raw.get(key).ok_or(TagMapError::MissingKey(key))?;
            u16::try_from(value).map_err(|_| TagMapError::InvalidId { key, value })
        };

        let map = TagIdMap {
            channel_name: id("channel_name")?,
            trace_retrace: id("trace_retrace")?,
            grid_ulength: id("grid_ulength")?,
            grid_vlength: id("grid_vlength")?,
            grid_ilength: id("grid_ilength")?,
            grid_jlength: id("grid_jlength")?,
            n_slots: id("n_slots")?,
            default_slot: id("default_slot")?,
            first_slot_tag: id("first_slot_tag")?,
            first_scaling_type: id("first_scaling_type")?,
            first_scaling_name: id("first_scaling_name")?,
            first_offset_name: id("first_offset_name")?,
            slot_size: id("slot_size")?,
        };

        if map.slot_size == 0 {
            return Err(TagMapError::InvalidId {
                key: "slot_size",
                value: 0,
            });
        }

        Ok(map)
    }
}
