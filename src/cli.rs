//! Defines command-line interface options using `clap` for the gxsmread application.

use clap::Parser;
use std::path::PathBuf;

/// Convert gxsm NetCDF scans to physical units
#[derive(Parser, Debug)]
#[command(
    version,
    name = "gxsmread",
    about = "Convert gxsm scanning microscope NetCDF files to physical units"
)]
pub struct Args {
    /// Path to the gxsm NetCDF file
    #[arg(short, long)]
    pub file: PathBuf,

    /// JSON channel table: {"<channel>": {"name", "conversion_factor", "units"}}
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Channel identifier. Defaults to the last '-'-separated token of the file name
    #[arg(long)]
    pub channel: Option<String>,

    /// Keep raw units (dz only, no conversion factor)
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Do not fall back to instrument gains stored in the file
    #[arg(long, default_value_t = false)]
    pub no_metadata_conversion: bool,

    /// Keep metadata as variables instead of moving it to attributes
    #[arg(long, default_value_t = false)]
    pub keep_metadata_vars: bool,

    /// Path to save the converted dataset as NetCDF. If not set, prints its metadata.
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// List all variables and dimensions of the input file and exit
    #[arg(long)]
    pub list_vars: bool,

    /// Describe a variable of the input file (data type, shape, attributes) and exit
    #[arg(long)]
    pub describe: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}
