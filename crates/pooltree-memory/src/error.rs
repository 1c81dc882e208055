//! Error types.
//!
//! Allocation itself never fails recoverably: exhaustion aborts through the
//! global allocator. `PoolError` describes misuse of handles and is what the
//! checked accessors return; the unchecked API panics with the same text.

use std::path::PathBuf;

use crate::handle::{Block, PoolId, ResourceId};

/// Misuse of a pool, block, or resource handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool was deleted (directly or through an ancestor).
    #[error("{0} has been deleted")]
    StalePool(PoolId),

    /// A block was handed to a pool that did not allocate it.
    #[error("{block} does not belong to {pool}")]
    ForeignBlock {
        /// The block passed in.
        block: Block,
        /// The pool it was passed to.
        pool: PoolId,
    },

    /// A block handle points outside its pool's chunks.
    #[error("{0} lies outside its pool's chunks")]
    BlockOutOfRange(Block),

    /// A resource handle does not name a live value of the requested type.
    #[error("{0} does not name a registered value of the requested type")]
    UnknownResource(ResourceId),
}

/// Failure to load a [`PoolConfig`](crate::config::PoolConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read pool config {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for a pool config.
    #[error("invalid pool config {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}
