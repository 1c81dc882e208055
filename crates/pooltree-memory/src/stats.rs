//! Allocation and teardown statistics.

use serde::Serialize;

/// Tree-wide counters, cumulative since the tree was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// Pools created (roots and subpools).
    pub pools_created: u64,
    /// Pools torn down.
    pub pools_deleted: u64,
    /// Most pools alive at once.
    pub peak_live_pools: u64,
    /// Chunks obtained from the system allocator.
    pub chunks_allocated: u64,
    /// Chunks returned to the system allocator.
    pub chunks_released: u64,
    /// Bytes of chunk capacity obtained.
    pub bytes_reserved: u64,
    /// Bytes of chunk capacity returned.
    pub bytes_released: u64,
    /// Blocks handed out by `pmalloc`/`pcalloc` (including `prealloc` copies).
    pub allocations: u64,
    /// `prealloc` calls satisfied by moving the cursor.
    pub in_place_resizes: u64,
    /// `prealloc` calls that allocated a fresh block and copied.
    pub copying_resizes: u64,
    /// Cleanup entries executed.
    pub cleanups_run: u64,
}

impl TreeStats {
    /// Pools currently alive.
    #[must_use]
    pub fn live_pools(&self) -> u64 {
        self.pools_created - self.pools_deleted
    }

    /// Bytes of chunk capacity currently held.
    #[must_use]
    pub fn bytes_held(&self) -> u64 {
        self.bytes_reserved - self.bytes_released
    }

    pub(crate) fn record_pool_created(&mut self) {
        self.pools_created += 1;
        self.peak_live_pools = self.peak_live_pools.max(self.live_pools());
    }

    pub(crate) fn record_pool_deleted(&mut self) {
        self.pools_deleted += 1;
    }

    pub(crate) fn record_chunk(&mut self, capacity: usize) {
        self.chunks_allocated += 1;
        self.bytes_reserved += capacity as u64;
    }

    pub(crate) fn record_chunk_release(&mut self, capacity: usize) {
        self.chunks_released += 1;
        self.bytes_released += capacity as u64;
    }

    pub(crate) fn record_allocation(&mut self) {
        self.allocations += 1;
    }

    pub(crate) fn record_resize(&mut self, in_place: bool) {
        if in_place {
            self.in_place_resizes += 1;
        } else {
            self.copying_resizes += 1;
        }
    }

    pub(crate) fn record_cleanup(&mut self) {
        self.cleanups_run += 1;
    }
}

/// Snapshot of one live pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Chunks owned by the pool.
    pub chunks: usize,
    /// Total chunk capacity in bytes.
    pub capacity: usize,
    /// Bytes behind the cursors of all chunks (including slack).
    pub used: usize,
    /// Blocks allocated from this pool.
    pub allocations: u64,
    /// Cleanup entries waiting for teardown.
    pub pending_cleanups: usize,
    /// Direct children.
    pub children: usize,
}
