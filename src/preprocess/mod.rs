//! gxsm preprocessing pipeline
//!
//! Turns a freshly loaded gxsm dataset into physical-unit data:
//! validate → resolve channel configuration → convert `FloatField` →
//! (optionally) demote metadata variables to attributes.
//!
//! # Organization
//!
//! - [`validate`]: format check on the `Creator` attribute
//! - [`convert`]: `FloatField * dz * factor` conversion
//! - [`demote`]: metadata variables and dimensions to attributes

pub mod convert;
pub mod demote;
pub mod validate;

pub use convert::convert_floatfield;
pub use demote::clean_up_metadata;
pub use validate::{is_gxsm_file, validate_gxsm_file};

use crate::channel_config::{ChannelConfig, ChannelConfigTable, ResolveOptions};
use crate::dataset::Dataset;
use crate::errors::{GxsmError, Result};
use log::info;
use std::path::Path;

/// Raw DAC counter data written by gxsm
pub const GXSM_DATA_VAR: &str = "FloatField";

/// Differential converting one DAC count to gxsm's (pseudo-)unit
pub const DATA_DIFFERENTIAL: &str = "dz";

/// Dimensions that describe the scan itself and are never demoted
pub const GXSM_KEPT_DIMS: [&str; 2] = ["dimx", "dimy"];

/// Variables that are data, not metadata
pub const GXSM_KEPT_DATA_VARS: [&str; 2] = [GXSM_DATA_VAR, DATA_DIFFERENTIAL];

/// Global attribute and value identifying a gxsm file
pub const GXSM_FORMAT_CHECK: (&str, &str) = ("Creator", "gxsm");

/// Options for [`preprocess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Record the data in physical units instead of `raw`
    pub use_physical_units: bool,
    /// Fall back to instrument gains stored in the file
    pub allow_convert_from_metadata: bool,
    /// Move metadata variables and dimensions into attributes
    pub demote_metadata: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            use_physical_units: true,
            allow_convert_from_metadata: true,
            demote_metadata: true,
        }
    }
}

impl PreprocessOptions {
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            use_physical_units: self.use_physical_units,
            allow_convert_from_metadata: self.allow_convert_from_metadata,
        }
    }
}

/// Run the full preprocessing pipeline on a gxsm dataset.
///
/// `channel` identifies the recorded channel; when `None` it is taken from
/// the dataset's source file name (see [`channel_from_source`]).
///
/// # Errors
///
/// Returns an error if the dataset is not a gxsm file, the channel cannot be
/// determined or configured, or the data variables are missing or malformed.
pub fn preprocess(
    mut ds: Dataset,
    channel: Option<&str>,
    table: Option<&ChannelConfigTable>,
    options: PreprocessOptions,
) -> Result<Dataset> {
    validate_gxsm_file(&ds)?;

    let channel = match channel {
        Some(c) => c.to_string(),
        None => ds
            .source()
            .and_then(channel_from_source)
            .ok_or_else(|| {
                GxsmError::Generic(
                    "Channel not given and not derivable from the source file name".to_string(),
                )
            })?,
    };

    let config = ChannelConfig::resolve(&channel, table, &ds, options.resolve_options())?;
    info!(
        "Channel '{}' -> '{}' [{}] x {} ({})",
        channel,
        config.name,
        config.units,
        config.conversion_factor,
        config.source.as_str()
    );

    convert_floatfield(&mut ds, &config)?;
    if options.demote_metadata {
        clean_up_metadata(&mut ds, &[config.name.as_str()])?;
    }
    Ok(ds)
}

/// Channel part of a gxsm file name: everything after the scan-direction
/// token (`Xp`, `Xm`, optionally preceded by `M`).
///
/// `sample001-Xp-Topo.nc` → `Topo`, `sample001-M-Xm-ADC2-Current.nc` →
/// `ADC2-Current`. Without a direction token the last `-` part is used.
pub fn channel_from_source(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let tokens: Vec<&str> = stem.split('-').collect();
    if tokens.len() < 2 {
        return None;
    }

    let channel = match tokens.iter().position(|t| is_scan_direction(t)) {
        Some(idx) => tokens[idx + 1..].join("-"),
        None => tokens[tokens.len() - 1].to_string(),
    };
    if channel.is_empty() {
        return None;
    }
    Some(channel)
}

fn is_scan_direction(token: &str) -> bool {
    matches!(token, "Xp" | "Xm" | "Yp" | "Ym")
}
