//! Thread pool sizing
//!
//! The element-wise field conversion runs on Rayon's global thread pool;
//! `--threads` sizes that pool before any data is touched.

use crate::errors::{GxsmError, Result};
use log::info;
use rayon::ThreadPoolBuilder;

/// Requested size of the global conversion pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    /// `None` keeps Rayon's default (one thread per core)
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Build the global Rayon pool. Can succeed only once per process.
    pub fn setup_global_pool(&self) -> Result<()> {
        let Some(num_threads) = self.num_threads else {
            return Ok(());
        };
        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                GxsmError::ThreadPoolError(format!(
                    "Failed to initialize thread pool with {} threads: {}",
                    num_threads, e
                ))
            })?;
        info!("Conversion pool sized to {} threads", num_threads);
        Ok(())
    }
}

/// Pool size in effect versus cores on the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

impl ParallelInfo {
    pub fn log_info(&self) {
        info!(
            "Converting on {} threads ({} CPU cores)",
            self.current_threads, self.available_cores
        );
    }
}

pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}
