//! gxsmread: gxsm NetCDF preprocessing
//!
//! gxsm, the acquisition software of many scanning tunneling and atomic
//! force microscopes, stores each recorded channel as raw DAC counts
//! (`FloatField`) together with a differential (`dz`) and more than a
//! hundred metadata variables. This crate converts such files into
//! physically meaningful data.
//!
//! ## Pipeline
//!
//! 1. **Validate** that the dataset was written by gxsm (`Creator` attribute)
//! 2. **Resolve** the channel's conversion factor and unit from a user table,
//!    falling back to instrument gains stored in the file
//! 3. **Convert** `FloatField * dz * factor` into a named variable with units
//! 4. **Demote** (optionally) all metadata variables and dimensions to
//!    dataset attributes
//!
//! ## Module Organization
//!
//! - [`dataset`]: In-memory labeled dataset
//! - [`netcdf_io`]: NetCDF loading and writing
//! - [`channel_config`]: Channel table and conversion resolution
//! - [`preprocess`]: Validation, conversion and metadata demotion
//! - [`metadata`]: Dataset inspection
//! - [`parallel`]: Parallel processing configuration
//! - [`errors`]: Centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gxsmread::prelude::*;
//! use std::path::Path;
//!
//! let ds = read_dataset(Path::new("sample001-Xp-Topo.nc")).unwrap();
//! let converted = preprocess(ds, None, None, PreprocessOptions::default()).unwrap();
//! write_dataset(&converted, Path::new("sample001-Topo-converted.nc")).unwrap();
//! ```

// Core modules
pub mod channel_config;
pub mod dataset;
pub mod errors;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod preprocess;

// Direct re-exports for the public API
pub use channel_config::*;
pub use dataset::*;
pub use errors::*;
pub use netcdf_io::*;
pub use preprocess::*;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::channel_config::{ChannelConfig, ChannelConfigTable, ChannelEntry, ResolveOptions};
    pub use crate::dataset::{AttrValue, Dataset, Variable, VariableData};
    pub use crate::errors::{GxsmError, Result};
    pub use crate::netcdf_io::{read_dataset, write_dataset, NetCDFWriter};
    pub use crate::parallel::ParallelConfig;
    pub use crate::preprocess::{preprocess, PreprocessOptions};
}
