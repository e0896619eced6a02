//! Format check for gxsm datasets

use super::GXSM_FORMAT_CHECK;
use crate::dataset::{AttrValue, Dataset};
use crate::errors::{GxsmError, Result};

/// Check if the dataset was written by gxsm.
///
/// The `Creator` attribute must be a string containing `gxsm`, compared
/// case-insensitively. A missing or non-string attribute is not an error.
pub fn is_gxsm_file(ds: &Dataset) -> bool {
    let (key, expected) = GXSM_FORMAT_CHECK;
    ds.attr(key)
        .and_then(AttrValue::as_str)
        .map(|creator| creator.to_lowercase().contains(expected))
        .unwrap_or(false)
}

/// Like [`is_gxsm_file`], but reports the observed creator on failure
pub fn validate_gxsm_file(ds: &Dataset) -> Result<()> {
    if is_gxsm_file(ds) {
        return Ok(());
    }
    let creator = ds.attr(GXSM_FORMAT_CHECK.0).map(|v| match v {
        AttrValue::Str(s) => s.clone(),
        other => other.to_string(),
    });
    Err(GxsmError::NotGxsmFile { creator })
}
