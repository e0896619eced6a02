//! Centralized error handling for gxsmread
//!
//! Every fallible operation in the crate returns [`Result`], carrying a
//! [`GxsmError`] that says which stage of the conversion failed.

use std::fmt;

/// Main error type for gxsmread operations
#[derive(Debug)]
pub enum GxsmError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// The dataset was not written by gxsm
    NotGxsmFile { creator: Option<String> },

    /// Variable not found in the dataset
    VariableNotFound { var: String },

    /// Dimension not found for a variable
    DimensionNotFound { var: String, dim: String },

    /// Variable exists but holds data of the wrong kind
    InvalidData { var: String, message: String },

    /// Shapes cannot be combined
    ShapeMismatch { message: String },

    /// No conversion factor or unit could be found for a channel
    ChannelConfig { channel: String, message: String },

    /// Channel configuration table could not be parsed
    ConfigParse(serde_json::Error),

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Generic error
    Generic(String),
}

impl fmt::Display for GxsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GxsmError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            GxsmError::IoError(e) => write!(f, "I/O error: {}", e),
            GxsmError::NotGxsmFile { creator } => match creator {
                Some(c) => write!(f, "Dataset does not appear to be a gxsm file (Creator: '{}')", c),
                None => write!(f, "Dataset does not appear to be a gxsm file (no Creator attribute)"),
            },
            GxsmError::VariableNotFound { var } => write!(f, "Variable '{}' not found in dataset", var),
            GxsmError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found for variable '{}'", dim, var)
            }
            GxsmError::InvalidData { var, message } => {
                write!(f, "Invalid data in variable '{}': {}", var, message)
            }
            GxsmError::ShapeMismatch { message } => write!(f, "Shape mismatch: {}", message),
            GxsmError::ChannelConfig { channel, message } => {
                write!(f, "Cannot configure channel '{}': {}", channel, message)
            }
            GxsmError::ConfigParse(e) => write!(f, "Channel configuration error: {}", e),
            GxsmError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            GxsmError::ArrayError(e) => write!(f, "Array error: {}", e),
            GxsmError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GxsmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GxsmError::NetCDFError(e) => Some(e),
            GxsmError::IoError(e) => Some(e),
            GxsmError::ConfigParse(e) => Some(e),
            GxsmError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for GxsmError {
    fn from(error: netcdf::Error) -> Self {
        GxsmError::NetCDFError(error)
    }
}

impl From<std::io::Error> for GxsmError {
    fn from(error: std::io::Error) -> Self {
        GxsmError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for GxsmError {
    fn from(error: ndarray::ShapeError) -> Self {
        GxsmError::ArrayError(error)
    }
}

impl From<serde_json::Error> for GxsmError {
    fn from(error: serde_json::Error) -> Self {
        GxsmError::ConfigParse(error)
    }
}

impl From<String> for GxsmError {
    fn from(error: String) -> Self {
        GxsmError::Generic(error)
    }
}

impl From<&str> for GxsmError {
    fn from(error: &str) -> Self {
        GxsmError::Generic(error.to_string())
    }
}

/// Result type alias for gxsmread operations
pub type Result<T> = std::result::Result<T, GxsmError>;
