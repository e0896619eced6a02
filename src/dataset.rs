//! In-memory labeled dataset
//!
//! A [`Dataset`] holds named dimensions, variables defined over those
//! dimensions, and global attributes, mirroring the structure of a NetCDF
//! file once it has been loaded into memory.

use crate::errors::{GxsmError, Result};
use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Attribute name holding a variable's physical unit
pub const UNITS_ATTR: &str = "units";

/// Attribute value attached to a dataset or a variable
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Strs(Vec<String>),
    Double(f64),
    Doubles(Vec<f64>),
}

impl AttrValue {
    /// String content, if this is a single string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "\"{}\"", s),
            AttrValue::Strs(ss) => write!(f, "{:?}", ss),
            AttrValue::Double(v) => write!(f, "{}", v),
            AttrValue::Doubles(vs) => write!(f, "{:?}", vs),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Double(value)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(value: Vec<f64>) -> Self {
        AttrValue::Doubles(value)
    }
}

/// Values stored in a variable
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Numeric(ArrayD<f64>),
    Text(String),
}

/// A named array with dimension labels and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: VariableData,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Variable {
    /// Create a numeric variable over the given dimensions
    pub fn numeric<S: Into<String>>(dims: Vec<S>, data: ArrayD<f64>) -> Self {
        Self {
            dims: dims.into_iter().map(Into::into).collect(),
            data: VariableData::Numeric(data),
            attrs: BTreeMap::new(),
        }
    }

    /// Create a scalar numeric variable
    pub fn scalar(value: f64) -> Self {
        Self::numeric(Vec::<String>::new(), ArrayD::from_elem(Vec::<usize>::new(), value))
    }

    /// Create a scalar text variable
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self {
            dims: Vec::new(),
            data: VariableData::Text(value.into()),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr<V: Into<AttrValue>>(mut self, name: &str, value: V) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn as_numeric(&self) -> Option<&ArrayD<f64>> {
        match &self.data {
            VariableData::Numeric(a) => Some(a),
            VariableData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            VariableData::Text(s) => Some(s),
            VariableData::Numeric(_) => None,
        }
    }

    /// Shape of the data; text variables are scalar
    pub fn shape(&self) -> Vec<usize> {
        match &self.data {
            VariableData::Numeric(a) => a.shape().to_vec(),
            VariableData::Text(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `units` attribute, if set
    pub fn units(&self) -> Option<&str> {
        self.attrs.get(UNITS_ATTR).and_then(AttrValue::as_str)
    }

    /// Flatten the variable's values into an attribute value.
    ///
    /// Single-element arrays collapse to a scalar, larger arrays are
    /// flattened in row-major order. The variable's own attributes are not
    /// carried over.
    pub fn to_attr_value(&self) -> AttrValue {
        match &self.data {
            VariableData::Text(s) => AttrValue::Str(s.clone()),
            VariableData::Numeric(a) if a.len() == 1 => {
                AttrValue::Double(a.iter().next().copied().unwrap_or(f64::NAN))
            }
            VariableData::Numeric(a) => AttrValue::Doubles(a.iter().copied().collect()),
        }
    }
}

/// In-memory multi-dimensional labeled dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub attrs: BTreeMap<String, AttrValue>,
    dims: BTreeMap<String, usize>,
    variables: BTreeMap<String, Variable>,
    source: Option<PathBuf>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// File the dataset was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn set_source<P: Into<PathBuf>>(&mut self, path: P) {
        self.source = Some(path.into());
    }

    /// Add a dimension; re-adding with the same length is a no-op
    pub fn add_dimension(&mut self, name: &str, len: usize) -> Result<()> {
        match self.dims.get(name) {
            Some(&existing) if existing != len => Err(GxsmError::ShapeMismatch {
                message: format!(
                    "dimension '{}' already has length {}, cannot redefine as {}",
                    name, existing, len
                ),
            }),
            _ => {
                self.dims.insert(name.to_string(), len);
                Ok(())
            }
        }
    }

    /// Remove a dimension. Fails if any variable is still defined over it.
    pub fn remove_dimension(&mut self, name: &str) -> Result<usize> {
        if let Some((var, _)) = self
            .variables
            .iter()
            .find(|(_, v)| v.dims.iter().any(|d| d == name))
        {
            return Err(GxsmError::Generic(format!(
                "cannot remove dimension '{}': still used by variable '{}'",
                name, var
            )));
        }
        self.dims
            .remove(name)
            .ok_or_else(|| GxsmError::Generic(format!("dimension '{}' not found", name)))
    }

    pub fn dimensions(&self) -> &BTreeMap<String, usize> {
        &self.dims
    }

    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dims.get(name).copied()
    }

    /// Insert a variable, replacing any variable of the same name.
    ///
    /// Every dimension the variable names must exist, and numeric data must
    /// have the shape those dimensions describe.
    pub fn insert_variable(&mut self, name: &str, var: Variable) -> Result<Option<Variable>> {
        match &var.data {
            VariableData::Text(_) if !var.dims.is_empty() => {
                return Err(GxsmError::InvalidData {
                    var: name.to_string(),
                    message: "text variables must be scalar".to_string(),
                });
            }
            VariableData::Text(_) => {}
            VariableData::Numeric(data) => {
                if data.ndim() != var.dims.len() {
                    return Err(GxsmError::ShapeMismatch {
                        message: format!(
                            "variable '{}' has {} dimension names but {}-dimensional data",
                            name,
                            var.dims.len(),
                            data.ndim()
                        ),
                    });
                }
                for (dim, &len) in var.dims.iter().zip(data.shape()) {
                    let expected =
                        self.dims
                            .get(dim)
                            .ok_or_else(|| GxsmError::DimensionNotFound {
                                var: name.to_string(),
                                dim: dim.clone(),
                            })?;
                    if *expected != len {
                        return Err(GxsmError::ShapeMismatch {
                            message: format!(
                                "variable '{}' has length {} along '{}' but the dimension has length {}",
                                name, len, dim, expected
                            ),
                        });
                    }
                }
            }
        }
        Ok(self.variables.insert(name.to_string(), var))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Look up a variable, failing with `VariableNotFound`
    pub fn require_variable(&self, name: &str) -> Result<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| GxsmError::VariableNotFound {
                var: name.to_string(),
            })
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Variable> {
        self.variables.remove(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// A coordinate is a variable named after a dimension and defined on it alone
    pub fn is_coordinate(&self, name: &str) -> bool {
        self.variables
            .get(name)
            .map(|v| v.dims.len() == 1 && v.dims[0] == name)
            .unwrap_or(false)
    }

    /// Names of all variables that are not coordinates
    pub fn data_var_names(&self) -> Vec<String> {
        self.variables
            .keys()
            .filter(|name| !self.is_coordinate(name))
            .cloned()
            .collect()
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr<V: Into<AttrValue>>(&mut self, name: &str, value: V) -> Option<AttrValue> {
        self.attrs.insert(name.to_string(), value.into())
    }
}
