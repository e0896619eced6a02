//! Dataset inspection and variable description functionality
//!
//! This module provides functions for examining the structure of a loaded
//! dataset, listing variables and dimensions, and describing variable
//! properties.

use crate::dataset::{AttrValue, Dataset, VariableData};
use crate::errors::Result;

/// Prints global attributes and variables of a dataset.
pub fn print_metadata(ds: &Dataset) -> Result<()> {
    println!("\n===== Global Attributes =====");
    for (name, value) in &ds.attrs {
        println!("- {}: {}", name, short_value(value));
    }

    println!("\n===== Variables =====");
    for (name, var) in ds.variables() {
        let dims: Vec<String> = var
            .dims
            .iter()
            .zip(var.shape())
            .map(|(d, len)| format!("{}[{}]", d, len))
            .collect();
        println!("- {} ({})", name, dims.join(", "));
    }

    Ok(())
}

/// Lists all variables and dimensions in a clean, organized format.
pub fn list_variables_and_dimensions(ds: &Dataset) -> Result<()> {
    println!("\n Dimensions");
    println!("==============");

    if ds.dimensions().is_empty() {
        println!("   (No dimensions found)");
    } else {
        for (name, len) in ds.dimensions() {
            println!("    {} = {}", name, len);
        }
    }

    println!("\n Variables");
    println!("=============");

    if ds.variable_names().is_empty() {
        println!("   (No variables found)");
    } else {
        for (name, var) in ds.variables() {
            let data_type = data_type_name(&var.data);
            if var.dims.is_empty() {
                println!("    {} ({}): scalar", name, data_type);
            } else {
                let shape: Vec<String> = var.shape().iter().map(|s| s.to_string()).collect();
                println!(
                    "    {} ({}): [{}] = ({})",
                    name,
                    data_type,
                    var.dims.join(", "),
                    shape.join(" × ")
                );
            }

            // Show key attributes if they exist
            let key_attrs: Vec<String> = ["units", "var_unit", "long_name"]
                .iter()
                .filter_map(|key| var.attrs.get(*key).map(|v| format!("{}: {}", key, v)))
                .collect();

            if !key_attrs.is_empty() {
                println!("      └─ {}", key_attrs.join(", "));
            }
        }
    }

    println!("\n💡 Tip: Use --describe <variable> to see all attributes of a variable");

    Ok(())
}

/// Describes a specific variable showing its data type, shape, and all attributes.
pub fn describe_variable(ds: &Dataset, var_name: &str) -> Result<()> {
    let var = ds.require_variable(var_name)?;

    println!("\n Variable Description: {}", var_name);
    println!("={}", "=".repeat(var_name.len() + 25));

    println!(" Data type: {}", data_type_name(&var.data));

    let shape = var.shape();
    if var.dims.is_empty() {
        println!(" Dimensions: (scalar)");
        println!(" Shape: ()");
    } else {
        println!(" Dimensions: [{}]", var.dims.join(", "));
        println!(
            " Shape: ({})",
            shape
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" × ")
        );
    }

    if var.attrs.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for (name, value) in &var.attrs {
            println!("   • {}: {}", name, value);
        }
    }

    match &var.data {
        VariableData::Text(text) => println!("\n Value: \"{}\"", text),
        VariableData::Numeric(data) if data.len() == 1 => {
            println!("\n Value: {}", data.iter().next().copied().unwrap_or(f64::NAN));
        }
        VariableData::Numeric(data) => {
            let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
            if finite.is_empty() {
                println!("\n⚠ No valid (finite) data found");
            } else {
                let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
                let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                println!("\n Statistics:");
                println!("    Min: {:.4}", min);
                println!("    Max: {:.4}", max);
                println!("    Mean: {:.4}", mean);
                println!("    Valid elements: {} / {}", finite.len(), data.len());
            }
        }
    }

    Ok(())
}

fn data_type_name(data: &VariableData) -> &'static str {
    match data {
        VariableData::Numeric(_) => "double",
        VariableData::Text(_) => "string",
    }
}

/// Long arrays are summarised by length
fn short_value(value: &AttrValue) -> String {
    match value {
        AttrValue::Doubles(vs) if vs.len() > 8 => format!("[{} values]", vs.len()),
        AttrValue::Strs(ss) if ss.len() > 8 => format!("[{} strings]", ss.len()),
        other => other.to_string(),
    }
}
