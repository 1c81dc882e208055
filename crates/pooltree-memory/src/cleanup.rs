//! Deferred actions run when a pool is torn down.

use std::any::Any;
use std::fmt;
#[cfg(unix)]
use std::os::fd::{AsRawFd, OwnedFd};

use crate::chunk::Chunk;
use crate::handle::{Block, PoolId};

/// Callback registered with `register_cleanup_fn`.
pub type CleanupFn = Box<dyn FnOnce(&PoolMemory<'_>)>;

/// One deferred action.
pub(crate) enum Cleanup {
    /// User callback; captured state plays the role of the opaque argument.
    Callback(CleanupFn),
    /// Value allocated outside the pool's chunks, dropped at teardown.
    Owned(Box<dyn Any>),
    /// Descriptor closed at teardown.
    #[cfg(unix)]
    Fd(OwnedFd),
}

impl Cleanup {
    /// Perform the action. Consumes the entry, so it runs at most once.
    pub(crate) fn run(self, memory: &PoolMemory<'_>) {
        match self {
            Self::Callback(f) => f(memory),
            Self::Owned(value) => drop(value),
            #[cfg(unix)]
            Self::Fd(fd) => {
                tracing::trace!(
                    pool = %memory.pool(),
                    fd = fd.as_raw_fd(),
                    "Closing registered descriptor"
                );
                drop(fd);
            }
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Callback(_) => "callback",
            Self::Owned(_) => "owned",
            #[cfg(unix)]
            Self::Fd(_) => "fd",
        }
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Read-only view of a pool's own memory, lent to cleanup callbacks.
///
/// Children of the pool have already been torn down when callbacks run, so
/// only blocks allocated directly from this pool resolve.
pub struct PoolMemory<'a> {
    pool: PoolId,
    chunks: &'a [Chunk],
}

impl<'a> PoolMemory<'a> {
    pub(crate) fn new(pool: PoolId, chunks: &'a [Chunk]) -> Self {
        Self { pool, chunks }
    }

    /// The pool being torn down.
    #[must_use]
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Contents of `block`, if it was allocated from this pool.
    #[must_use]
    pub fn bytes(&self, block: Block) -> Option<&'a [u8]> {
        if block.pool != self.pool {
            return None;
        }
        self.chunks
            .get(block.chunk as usize)?
            .slice(block.start(), block.end())
    }
}
