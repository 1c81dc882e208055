//! Application configuration from CLI flags, environment and config file.

use std::path::PathBuf;

use clap::Parser;
use pooltree_memory::{read_config, PoolConfig};

use crate::errors::AppError;
use crate::workload::WorkloadKind;

/// Exercise hierarchical memory pools and check they leak nothing.
#[derive(Parser, Debug)]
#[command(name = "pooltree", version, about)]
pub struct AppConfig {
    /// Workload to run: churn, nested, mixed, or all.
    #[arg(short, long, value_enum, default_value = "all")]
    pub workload: WorkloadKind,

    /// Iterations for the churn and mixed workloads.
    #[arg(short = 'n', long, default_value = "10000", env = "POOLTREE_ITERATIONS")]
    pub iterations: u64,

    /// Chunk size in bytes; overrides the config file.
    #[arg(long, env = "POOLTREE_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Requests above this many bytes get a dedicated chunk; overrides the
    /// config file.
    #[arg(long)]
    pub large_threshold: Option<usize>,

    /// JSON file with pool settings.
    #[arg(short, long, env = "POOLTREE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Quiet mode (only print failures).
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose output, including debug logs.
    #[arg(short, long)]
    pub verbose: bool,

    /// Generate shell completion.
    #[arg(long, value_enum)]
    pub completion: Option<clap_complete::Shell>,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Pool sizing: config file first, then flags, then normalized. A
    /// threshold set nowhere is derived from the final chunk size.
    pub fn pool_config(&self) -> Result<PoolConfig, AppError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => PoolConfig::default(),
        };
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(threshold) = self.large_threshold {
            config.large_alloc_threshold = threshold;
        }
        Ok(config.normalize())
    }
}
