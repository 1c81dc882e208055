//! # pooltree-memory
//!
//! Hierarchical memory pools for the `pooltree` workspace.
//!
//! A [`PoolTree`] holds a forest of pools. Each pool is an arena: blocks are
//! bump-allocated from chunks and never freed one by one. Deleting a pool
//! deletes its subpools first, runs its registered cleanups (callbacks, owned
//! values, file descriptors) last-registered-first, and returns its chunks.
//!
//! ```
//! use pooltree_memory::PoolTree;
//!
//! let mut tree = PoolTree::new();
//! let pool = tree.new_pool();
//! let sub = tree.new_subpool(pool);
//!
//! let block = tree.pmalloc(sub, 16);
//! tree.bytes_mut(block).copy_from_slice(b"sixteen bytes!!!");
//! let block = tree.prealloc(sub, Some(block), 200);
//! assert_eq!(&tree.bytes(block)[..16], b"sixteen bytes!!!");
//!
//! tree.delete_pool(pool);
//! assert!(!tree.is_live(sub));
//! ```
#![warn(missing_docs)]

mod chunk;
pub mod cleanup;
pub mod config;
pub mod constants;
pub mod default_pool;
pub mod error;
pub mod handle;
pub mod stats;
pub mod tree;

pub use cleanup::PoolMemory;
pub use config::{load_config, read_config, PoolConfig};
pub use default_pool::{teardown_default_pool, with_default_pool};
pub use error::{ConfigError, PoolError};
pub use handle::{Block, PoolId, ResourceId};
pub use stats::{PoolStats, TreeStats};
pub use tree::PoolTree;
