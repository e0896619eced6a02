//! NetCDF I/O for in-memory datasets
//!
//! This module loads a whole NetCDF file into a [`Dataset`] and writes a
//! converted dataset back out, recording the conversion in the global
//! `history` attribute.

use crate::dataset::{AttrValue, Dataset, Variable, VariableData};
use crate::errors::{GxsmError, Result};
use chrono::Utc;
use log::{debug, warn};
use ndarray::ArrayD;
use netcdf::{create, AttributeValue};
use std::collections::BTreeSet;
use std::{fs, path::Path};

const HISTORY_ATTR: &str = "history";

/// Read an entire NetCDF file into memory.
///
/// Numeric variables of any primitive type are widened to `f64`; `char`
/// arrays and NetCDF strings become text. Variables of other types are
/// skipped with a warning.
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = netcdf::open(path)?;
    let mut ds = Dataset::new();
    ds.set_source(path);

    for attr in file.attributes() {
        match convert_attribute(attr.value()?) {
            Some(value) => {
                ds.set_attr(attr.name(), value);
            }
            None => warn!("Skipped unsupported global attribute type for '{}'", attr.name()),
        }
    }

    for dim in file.dimensions() {
        ds.add_dimension(&dim.name(), dim.len())?;
    }

    let mut char_dims: BTreeSet<String> = BTreeSet::new();

    for var in file.variables() {
        let name = var.name().to_string();
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let data_type = format!("{:?}", var.vartype()).to_lowercase();

        let mut variable = if data_type.contains("string") {
            if !dims.is_empty() {
                warn!("Skipped non-scalar string variable '{}'", name);
                continue;
            }
            Variable::text(var.get_string(..)?)
        } else if data_type.contains("char") {
            let multi_line = dims.len() > 1;
            char_dims.extend(dims);
            if multi_line {
                warn!("Skipped multi-dimensional char variable '{}'", name);
                continue;
            }
            let bytes: Vec<u8> = var.get_raw_values(..)?;
            Variable::text(decode_chars(&bytes))
        } else {
            let Some(values) = read_numeric(&var, &data_type)? else {
                warn!("Skipped variable '{}' of unsupported type {}", name, data_type);
                continue;
            };
            Variable::numeric(dims, ArrayD::from_shape_vec(shape, values)?)
        };

        for attr in var.attributes() {
            match convert_attribute(attr.value()?) {
                Some(value) => {
                    variable.attrs.insert(attr.name().to_string(), value);
                }
                None => warn!(
                    "Skipped unsupported attribute type for '{}:{}'",
                    name,
                    attr.name()
                ),
            }
        }

        ds.insert_variable(&name, variable)?;
    }

    // String-length dimensions mean nothing once the text is decoded
    for dim in &char_dims {
        let in_use = ds.variables().any(|(_, v)| v.dims.contains(dim));
        if !in_use {
            ds.remove_dimension(dim)?;
        }
    }

    debug!(
        "Read {} dimensions, {} variables and {} attributes from {}",
        ds.dimensions().len(),
        ds.variable_names().len(),
        ds.attrs.len(),
        path.display()
    );
    Ok(ds)
}

/// Read a primitive numeric variable, widening to `f64`.
///
/// The type is matched on its width token (`f32`, `i16`, ...).
fn read_numeric(var: &netcdf::Variable, data_type: &str) -> Result<Option<Vec<f64>>> {
    let values = if data_type.contains("f64") {
        var.get_values::<f64, _>(..)?
    } else if data_type.contains("f32") {
        widen(var.get_values::<f32, _>(..)?)
    } else if data_type.contains("i64") {
        var.get_values::<i64, _>(..)?
            .into_iter()
            .map(|v| v as f64)
            .collect()
    } else if data_type.contains("u64") {
        var.get_values::<u64, _>(..)?
            .into_iter()
            .map(|v| v as f64)
            .collect()
    } else if data_type.contains("i32") {
        widen(var.get_values::<i32, _>(..)?)
    } else if data_type.contains("u32") {
        widen(var.get_values::<u32, _>(..)?)
    } else if data_type.contains("i16") {
        widen(var.get_values::<i16, _>(..)?)
    } else if data_type.contains("u16") {
        widen(var.get_values::<u16, _>(..)?)
    } else if data_type.contains("i8") {
        widen(var.get_values::<i8, _>(..)?)
    } else if data_type.contains("u8") {
        widen(var.get_values::<u8, _>(..)?)
    } else {
        return Ok(None);
    };
    Ok(Some(values))
}

fn widen<T: Into<f64>>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(Into::into).collect()
}

/// gxsm pads fixed-length char arrays with NULs; the text ends at the first one
fn decode_chars(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

fn convert_attribute(value: AttributeValue) -> Option<AttrValue> {
    let converted = match value {
        AttributeValue::Str(s) => AttrValue::Str(s),
        AttributeValue::Strs(ss) => AttrValue::Strs(ss),
        AttributeValue::Double(v) => AttrValue::Double(v),
        AttributeValue::Doubles(vs) => AttrValue::Doubles(vs),
        AttributeValue::Float(v) => AttrValue::Double(v.into()),
        AttributeValue::Floats(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Int(v) => AttrValue::Double(v.into()),
        AttributeValue::Ints(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Uint(v) => AttrValue::Double(v.into()),
        AttributeValue::Uints(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Short(v) => AttrValue::Double(v.into()),
        AttributeValue::Shorts(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Ushort(v) => AttrValue::Double(v.into()),
        AttributeValue::Ushorts(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Schar(v) => AttrValue::Double(v.into()),
        AttributeValue::Schars(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Uchar(v) => AttrValue::Double(v.into()),
        AttributeValue::Uchars(vs) => AttrValue::Doubles(widen(vs)),
        AttributeValue::Longlong(v) => AttrValue::Double(v as f64),
        AttributeValue::Longlongs(vs) => AttrValue::Doubles(vs.into_iter().map(|v| v as f64).collect()),
        AttributeValue::Ulonglong(v) => AttrValue::Double(v as f64),
        AttributeValue::Ulonglongs(vs) => AttrValue::Doubles(vs.into_iter().map(|v| v as f64).collect()),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(converted)
}

/// NetCDF writer for converted datasets
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write the dataset, replacing any existing file at the output path
    pub fn write_dataset(&self, ds: &Dataset) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;

        for (dim_name, &dim_len) in ds.dimensions() {
            file.add_dimension(dim_name, dim_len)?;
        }

        for (name, var) in ds.variables() {
            let mut nc_var = match &var.data {
                VariableData::Numeric(data) => {
                    let dim_refs: Vec<&str> = var.dims.iter().map(|s| s.as_str()).collect();
                    let mut nc_var = file.add_variable::<f64>(name, &dim_refs)?;
                    nc_var.put(data.view(), ..)?;
                    nc_var
                }
                VariableData::Text(text) => {
                    let mut nc_var = file.add_string_variable(name, &[])?;
                    nc_var.put_string(text, ..)?;
                    nc_var
                }
            };

            for (attr_name, value) in &var.attrs {
                put_variable_attribute(&mut nc_var, attr_name, value)?;
            }
        }

        for (attr_name, value) in &ds.attrs {
            if attr_name == HISTORY_ATTR {
                continue;
            }
            match value.clone() {
                AttrValue::Str(s) => file.add_attribute(attr_name, s)?,
                AttrValue::Strs(ss) => file.add_attribute(attr_name, ss)?,
                AttrValue::Double(v) => file.add_attribute(attr_name, v)?,
                AttrValue::Doubles(vs) => file.add_attribute(attr_name, vs)?,
            };
        }

        file.add_attribute(HISTORY_ATTR, history_entry(ds.attr(HISTORY_ATTR)))?;

        debug!("Wrote dataset to {}", self.output_path.display());
        Ok(())
    }
}

fn put_variable_attribute(
    var: &mut netcdf::VariableMut<'_>,
    name: &str,
    value: &AttrValue,
) -> Result<()> {
    match value.clone() {
        AttrValue::Str(s) => var.put_attribute(name, s)?,
        AttrValue::Strs(ss) => var.put_attribute(name, ss)?,
        AttrValue::Double(v) => var.put_attribute(name, v)?,
        AttrValue::Doubles(vs) => var.put_attribute(name, vs)?,
    };
    Ok(())
}

/// Append this conversion to an existing history, if any
fn history_entry(previous: Option<&AttrValue>) -> String {
    let line = format!("Converted by gxsmread on {}", Utc::now().to_rfc3339());
    match previous.and_then(AttrValue::as_str) {
        Some(prev) if !prev.is_empty() => format!("{}\n{}", prev, line),
        _ => line,
    }
}

/// Convenience wrapper around [`NetCDFWriter::write_dataset`]
pub fn write_dataset(ds: &Dataset, output_path: &Path) -> Result<()> {
    NetCDFWriter::new(output_path).write_dataset(ds)
}

/// Reject output paths that would overwrite the input file.
///
/// Paths are compared after resolving `.`/`..` and symlinks.
pub fn check_output_path(input: &Path, output: &Path) -> Result<()> {
    let resolve = |p: &Path| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    if resolve(input) == resolve(output) {
        return Err(GxsmError::Generic(format!(
            "Output path {} is the same as the input file",
            output.display()
        )));
    }
    Ok(())
}
