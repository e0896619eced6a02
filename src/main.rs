//! Entry point for the gxsmread application.
//! Handles CLI parsing, file loading, and dispatches inspection or conversion.

use clap::Parser;
use gxsmread::prelude::*;
use gxsmread::{metadata, netcdf_io, parallel::get_parallel_info};
mod cli;

use cli::Args;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    ParallelConfig::new(args.threads).setup_global_pool()?;
    if args.verbose {
        get_parallel_info().log_info();
    }

    let ds = read_dataset(&args.file)?;
    println!("Successfully opened NetCDF file: {}", args.file.display());

    if args.list_vars {
        return metadata::list_variables_and_dimensions(&ds);
    }
    if let Some(var) = &args.describe {
        return metadata::describe_variable(&ds, var);
    }

    let table = match &args.config {
        Some(path) => Some(ChannelConfigTable::from_json_file(path)?),
        None => None,
    };

    let options = PreprocessOptions {
        use_physical_units: !args.raw,
        allow_convert_from_metadata: !args.no_metadata_conversion,
        demote_metadata: !args.keep_metadata_vars,
    };

    let converted = preprocess(ds, args.channel.as_deref(), table.as_ref(), options)?;

    if let Some(output_path) = &args.output_netcdf {
        netcdf_io::check_output_path(&args.file, output_path)?;
        NetCDFWriter::new(output_path).write_dataset(&converted)?;
        println!("✅ Saved result to {}", output_path.display());
    } else {
        metadata::print_metadata(&converted)?;
    }

    Ok(())
}
