//! Worker pool configuration
//!
//! Reductions and in-place unit conversions run on Rayon's global thread pool.
//! This module sizes that pool once, before any plan is evaluated.

use crate::errors::{Result, ReLensError};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Size of the worker pool used for evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerPool {
    pub num_threads: Option<usize>,
}

impl WorkerPool {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Set up the global Rayon thread pool with the specified configuration.
    ///
    /// The global pool can only be built once per process; a second call fails.
    pub fn setup_global_pool(&self) -> Result<()> {
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("relens-worker-{i}"))
                .build_global()
                .map_err(|e| {
                    ReLensError::ThreadPool(format!(
                        "Failed to initialize thread pool with {num_threads} threads: {e}"
                    ))
                })?;
            info!(threads = num_threads, "configured worker pool");
        } else {
            info!(threads = rayon::current_num_threads(), "using default worker pool");
        }

        Ok(())
    }

    /// Get the current number of threads being used
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }

    /// Use every available CPU core
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct PoolInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

/// Get information about the current pool
pub fn pool_info() -> PoolInfo {
    PoolInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}

impl std::fmt::Display for PoolInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} worker threads ({} CPU cores available)",
            self.current_threads, self.available_cores
        )
    }
}
