//! `FloatField` to physical-unit conversion
//!
//! gxsm stores its recorded data as raw DAC counts in `FloatField`. The
//! physical value of each pixel is
//!
//! ```text
//! value = FloatField * dz * conversion_factor
//! ```
//!
//! where `dz` maps a count to gxsm's own (pseudo-)unit and the conversion
//! factor maps that pseudo-unit to the channel's real unit. For raw output
//! the factor is 1.

use super::{DATA_DIFFERENTIAL, GXSM_DATA_VAR, GXSM_KEPT_DIMS};
use crate::channel_config::ChannelConfig;
use crate::dataset::{Dataset, Variable, UNITS_ATTR};
use crate::errors::{GxsmError, Result};
use log::{debug, warn};
use ndarray::{ArrayD, Axis, Zip};

/// Replace `FloatField` and `dz` with the converted channel variable.
///
/// `dz` may be a scalar or any shape broadcastable to `FloatField`.
/// Length-1 dimensions other than `dimx`/`dimy` are dropped from the result.
///
/// # Errors
///
/// Returns an error if either variable is missing or not numeric, or if
/// `dz` cannot be broadcast to the field's shape.
pub fn convert_floatfield(ds: &mut Dataset, config: &ChannelConfig) -> Result<()> {
    let field_var = ds.require_variable(GXSM_DATA_VAR)?;
    let dz_var = ds.require_variable(DATA_DIFFERENTIAL)?;

    let field = numeric(field_var, GXSM_DATA_VAR)?;
    let dz = numeric(dz_var, DATA_DIFFERENTIAL)?;

    let dz_view = dz
        .broadcast(field.raw_dim())
        .ok_or_else(|| GxsmError::ShapeMismatch {
            message: format!(
                "'{}' with shape {:?} cannot be broadcast to '{}' with shape {:?}",
                DATA_DIFFERENTIAL,
                dz.shape(),
                GXSM_DATA_VAR,
                field.shape()
            ),
        })?;

    debug!(
        "Converting {} elements across {} threads",
        field.len(),
        rayon::current_num_threads()
    );

    let factor = config.conversion_factor;
    let mut converted = ArrayD::<f64>::zeros(field.raw_dim());
    Zip::from(&mut converted)
        .and(field)
        .and(&dz_view)
        .par_for_each(|out, &count, &diff| *out = count * diff * factor);

    let (dims, converted) = squeeze_metadata_dims(field_var.dims.clone(), converted);

    ds.remove_variable(GXSM_DATA_VAR);
    ds.remove_variable(DATA_DIFFERENTIAL);

    let var = Variable::numeric(dims, converted).with_attr(UNITS_ATTR, config.units.as_str());
    if ds.insert_variable(&config.name, var)?.is_some() {
        warn!("Replaced existing variable '{}' with converted data", config.name);
    }
    Ok(())
}

fn numeric<'a>(var: &'a Variable, name: &str) -> Result<&'a ArrayD<f64>> {
    var.as_numeric().ok_or_else(|| GxsmError::InvalidData {
        var: name.to_string(),
        message: "expected numeric data, found text".to_string(),
    })
}

/// Drop length-1 axes that are not scan dimensions
fn squeeze_metadata_dims(
    mut dims: Vec<String>,
    mut data: ArrayD<f64>,
) -> (Vec<String>, ArrayD<f64>) {
    for axis in (0..dims.len()).rev() {
        if data.shape()[axis] == 1 && !GXSM_KEPT_DIMS.contains(&dims[axis].as_str()) {
            data = data.index_axis_move(Axis(axis), 0);
            dims.remove(axis);
        }
    }
    (dims, data)
}
