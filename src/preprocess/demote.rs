//! Metadata variables to attributes
//!
//! gxsm stores well over a hundred metadata values as variables so that
//! each can carry a description and a unit. That mixes metadata with the
//! measured data, so this pass moves everything that is not scan data into
//! dataset attributes. Units and descriptions of the moved values are lost.

use super::{GXSM_KEPT_DATA_VARS, GXSM_KEPT_DIMS};
use crate::dataset::{AttrValue, Dataset};
use crate::errors::Result;
use log::{debug, info};
use std::collections::BTreeSet;

/// Move metadata dimensions and variables into dataset attributes.
///
/// Kept in place: `dimx`, `dimy` and their coordinates, `FloatField`, `dz`,
/// and every variable named in `saved_vars`. A dimension that a kept
/// variable is defined over also stays.
pub fn clean_up_metadata(ds: &mut Dataset, saved_vars: &[&str]) -> Result<()> {
    let kept_vars: BTreeSet<&str> = GXSM_KEPT_DATA_VARS
        .iter()
        .chain(saved_vars.iter())
        .copied()
        .collect();

    let dims_in_use: BTreeSet<String> = ds
        .variables()
        .filter(|(name, _)| kept_vars.contains(name.as_str()))
        .flat_map(|(_, var)| var.dims.iter().cloned())
        .collect();

    let metadata_dims: Vec<(String, usize)> = ds
        .dimensions()
        .iter()
        .filter(|(name, _)| !GXSM_KEPT_DIMS.contains(&name.as_str()))
        .filter(|(name, _)| {
            let in_use = dims_in_use.contains(*name);
            if in_use {
                debug!("Keeping dimension '{}': used by a data variable", name);
            }
            !in_use
        })
        .map(|(name, &len)| (name.clone(), len))
        .collect();

    // Dimensions first: their coordinate values, or the bare index
    for (dim, len) in &metadata_dims {
        let value = match ds.variable(dim) {
            Some(coord) if ds.is_coordinate(dim) => coord.to_attr_value(),
            _ => AttrValue::Doubles((0..*len).map(|i| i as f64).collect()),
        };
        ds.set_attr(dim, value);
        if ds.is_coordinate(dim) {
            ds.remove_variable(dim);
        }
    }

    // Coordinates of every dimension that survives stay with it
    let metadata_vars: Vec<String> = ds
        .variable_names()
        .into_iter()
        .filter(|name| !kept_vars.contains(name.as_str()) && !ds.is_coordinate(name))
        .collect();

    for name in &metadata_vars {
        if let Some(var) = ds.remove_variable(name) {
            ds.set_attr(name, var.to_attr_value());
        }
    }

    for (dim, _) in &metadata_dims {
        ds.remove_dimension(dim)?;
    }

    info!(
        "Moved {} dimensions and {} variables to attributes",
        metadata_dims.len(),
        metadata_vars.len()
    );
    Ok(())
}
