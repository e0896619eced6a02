//! Channel configuration: user table loading and conversion-factor resolution
//!
//! gxsm records every input channel as a voltage scaled by `dz`. Only the
//! topography channel ends up in physical units that way; every other
//! channel needs a volt-to-unit factor, taken either from a user supplied
//! table or from the instrument gains gxsm embeds in the file.

use crate::dataset::{AttrValue, Dataset};
use crate::errors::{GxsmError, Result};
use crate::preprocess::DATA_DIFFERENTIAL;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Units reported when physical units are not requested
pub const RAW_UNITS: &str = "raw";

/// Attribute gxsm uses for per-variable units
pub const GXSM_UNIT_ATTR: &str = "var_unit";

const TOPOGRAPHY_CHANNEL: &str = "topo";
const TOPOGRAPHY_DEFAULT_UNITS: &str = "Å";

/// Instrument gain variables gxsm writes, keyed by the quantity they convert to.
/// (channel keyword, metadata variable, units)
const METADATA_CONVERSIONS: [(&str, &str, &str); 4] = [
    ("current", "sranger_mk2_hwi_XSM_Inst_nAmpere2V", "nA"),
    ("force", "sranger_mk2_hwi_XSM_Inst_nNewton2V", "nN"),
    ("frequency", "sranger_mk2_hwi_XSM_Inst_dHertz2V", "Hz"),
    ("energy", "sranger_mk2_hwi_XSM_Inst_eVolt2V", "eV"),
];

/// One row of the user channel table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelEntry {
    /// Name to give the converted variable
    #[serde(default)]
    pub name: Option<String>,
    /// Volt-to-unit factor applied on top of `dz`
    #[serde(default)]
    pub conversion_factor: Option<f64>,
    /// Unit string of the converted variable
    #[serde(default)]
    pub units: Option<String>,
}

/// User channel table, keyed by gxsm channel identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelConfigTable {
    channels: BTreeMap<String, ChannelEntry>,
}

impl ChannelConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from a JSON object
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a table from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&text)?;
        debug!(
            "Loaded {} channel entries from {}",
            table.channels.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn insert(&mut self, channel: &str, entry: ChannelEntry) -> Option<ChannelEntry> {
        self.channels.insert(channel.to_string(), entry)
    }

    pub fn get(&self, channel: &str) -> Option<&ChannelEntry> {
        self.channels.get(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Where a resolved conversion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionSource {
    /// Physical units not requested
    Raw,
    /// User channel table
    Table,
    /// `dz` is already physical (topography)
    Inherent,
    /// Instrument gain stored in the file
    Metadata,
}

impl ConversionSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Table => "channel table",
            Self::Inherent => "inherent",
            Self::Metadata => "file metadata",
        }
    }
}

/// Options steering conversion resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub use_physical_units: bool,
    pub allow_convert_from_metadata: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            use_physical_units: true,
            allow_convert_from_metadata: true,
        }
    }
}

/// Resolved conversion for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub name: String,
    pub conversion_factor: f64,
    pub units: String,
    pub source: ConversionSource,
}

impl ChannelConfig {
    /// Resolve name, factor and units for `channel`.
    ///
    /// Lookup order for physical units: complete table entry, topography,
    /// instrument gain in the file (when allowed).
    pub fn resolve(
        channel: &str,
        table: Option<&ChannelConfigTable>,
        ds: &Dataset,
        options: ResolveOptions,
    ) -> Result<Self> {
        let entry = table.and_then(|t| t.get(channel));
        let name = entry
            .and_then(|e| e.name.clone())
            .unwrap_or_else(|| channel.to_string());

        if !options.use_physical_units {
            return Ok(Self {
                name,
                conversion_factor: 1.0,
                units: RAW_UNITS.to_string(),
                source: ConversionSource::Raw,
            });
        }

        if let Some((factor, units)) =
            entry.and_then(|e| Some((e.conversion_factor?, e.units.clone()?)))
        {
            return Ok(Self {
                name,
                conversion_factor: factor,
                units,
                source: ConversionSource::Table,
            });
        }

        if channel.eq_ignore_ascii_case(TOPOGRAPHY_CHANNEL) {
            let units = ds
                .variable(DATA_DIFFERENTIAL)
                .and_then(|dz| dz.attrs.get(GXSM_UNIT_ATTR))
                .and_then(AttrValue::as_str)
                .unwrap_or(TOPOGRAPHY_DEFAULT_UNITS)
                .to_string();
            return Ok(Self {
                name,
                conversion_factor: 1.0,
                units,
                source: ConversionSource::Inherent,
            });
        }

        if options.allow_convert_from_metadata {
            if let Some((factor, units)) = conversion_from_metadata(channel, ds)? {
                return Ok(Self {
                    name,
                    conversion_factor: factor,
                    units,
                    source: ConversionSource::Metadata,
                });
            }
        }

        let message = match entry {
            Some(_) => "channel table entry lacks conversion_factor or units",
            None if options.allow_convert_from_metadata => {
                "no channel table entry and no instrument gain in the file"
            }
            None => "no channel table entry (metadata conversion disabled)",
        };
        Err(GxsmError::ChannelConfig {
            channel: channel.to_string(),
            message: message.to_string(),
        })
    }
}

/// Look up the instrument gain for `channel` among the file's variables
fn conversion_from_metadata(channel: &str, ds: &Dataset) -> Result<Option<(f64, String)>> {
    let lower = channel.to_lowercase();
    let Some((_, var_name, units)) = METADATA_CONVERSIONS
        .iter()
        .find(|(keyword, _, _)| lower.contains(keyword))
    else {
        return Ok(None);
    };

    let Some(var) = ds.variable(var_name) else {
        debug!("Metadata variable '{}' absent for channel '{}'", var_name, channel);
        return Ok(None);
    };

    let data = var.as_numeric().ok_or_else(|| GxsmError::InvalidData {
        var: var_name.to_string(),
        message: "expected a numeric gain".to_string(),
    })?;
    if data.len() != 1 {
        return Err(GxsmError::InvalidData {
            var: var_name.to_string(),
            message: format!("expected a single value, found {}", data.len()),
        });
    }
    let factor = data.iter().copied().next().unwrap_or(f64::NAN);
    if !factor.is_finite() {
        return Err(GxsmError::InvalidData {
            var: var_name.to_string(),
            message: format!("gain must be finite, got {}", factor),
        });
    }
    Ok(Some((factor, units.to_string())))
}
