//! The pool tree: creation, bump allocation, resizing and cascading teardown.
//!
//! Every pool lives in a slot of a [`PoolTree`]. A parent lists its children
//! by id and owns them: tearing down the parent tears them down first. A child
//! only remembers its parent's id so it can detach itself when deleted on its
//! own.

use std::any::Any;
#[cfg(unix)]
use std::os::fd::OwnedFd;

use tracing::{debug, trace};

use crate::chunk::{copy_region, Chunk};
use crate::cleanup::{Cleanup, PoolMemory};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::handle::{reservation, Block, PoolId, ResourceId};
use crate::stats::{PoolStats, TreeStats};

/// One arena.
#[derive(Debug)]
struct PoolNode {
    parent: Option<PoolId>,
    children: Vec<PoolId>,
    chunks: Vec<Chunk>,
    /// Chunk that receives small requests.
    current: Option<usize>,
    allocations: u64,
    cleanups: Vec<Cleanup>,
}

impl PoolNode {
    fn new(parent: Option<PoolId>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            chunks: Vec::new(),
            current: None,
            allocations: 0,
            cleanups: Vec::new(),
        }
    }

    /// Carve `len` bytes. Returns the block and, if a chunk had to be
    /// obtained, its capacity.
    fn carve(&mut self, id: PoolId, config: &PoolConfig, len: usize) -> (Block, Option<usize>) {
        let reserve = reservation(len);
        self.allocations += 1;

        if !config.wants_dedicated_chunk(reserve) {
            if let Some(current) = self.current {
                if let Some(offset) = self.chunks[current].bump(reserve) {
                    return (block_at(id, current, offset, len), None);
                }
            }
        }

        let capacity = if config.wants_dedicated_chunk(reserve) {
            reserve
        } else {
            config.chunk_size.max(reserve)
        };
        let mut chunk = Chunk::with_capacity(capacity);
        let offset = chunk.bump(reserve).unwrap_or_default();
        self.chunks.push(chunk);
        let index = self.chunks.len() - 1;
        if !config.wants_dedicated_chunk(reserve) {
            self.current = Some(index);
        }
        (block_at(id, index, offset, len), Some(capacity))
    }

    /// Resize the newest block of the current chunk by moving the cursor.
    fn resize_in_place(&mut self, block: Block, new_len: usize) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        if block.chunk as usize != current {
            return false;
        }
        let chunk = &mut self.chunks[current];
        chunk.is_tail(block.start(), block.reserved())
            && chunk.resize_tail(block.start(), reservation(new_len))
    }

    fn check(&self, block: Block) -> Result<&Chunk, PoolError> {
        self.chunks
            .get(block.chunk as usize)
            .filter(|chunk| block.end() <= chunk.capacity())
            .ok_or(PoolError::BlockOutOfRange(block))
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            chunks: self.chunks.len(),
            capacity: self.chunks.iter().map(Chunk::capacity).sum(),
            used: self.chunks.iter().map(Chunk::used).sum(),
            allocations: self.allocations,
            pending_cleanups: self.cleanups.len(),
            children: self.children.len(),
        }
    }
}

fn block_at(pool: PoolId, chunk: usize, offset: usize, len: usize) -> Block {
    Block {
        pool,
        chunk: u32::try_from(chunk).unwrap_or_else(|_| panic!("{pool} has too many chunks")),
        offset: u32::try_from(offset)
            .unwrap_or_else(|_| panic!("offset {offset} exceeds the chunk size limit")),
        len,
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<PoolNode>,
}

/// A forest of pools sharing one sizing policy.
///
/// Single-owner: the tree is neither `Send` nor `Sync`, because cleanup
/// callbacks and owned values are arbitrary non-thread-safe Rust values.
/// Dropping the tree tears down every remaining root, newest first.
#[derive(Debug)]
pub struct PoolTree {
    config: PoolConfig,
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<PoolId>,
    stats: TreeStats,
}

impl Default for PoolTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolTree {
    /// Create an empty tree with the default sizing policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create an empty tree; `config` is normalized first.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config: config.normalize(),
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            stats: TreeStats::default(),
        }
    }

    /// The normalized sizing policy.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Pool lifecycle
    // ------------------------------------------------------------------

    /// Create a detached root pool with no chunks and no cleanups.
    pub fn new_pool(&mut self) -> PoolId {
        let id = self.insert(PoolNode::new(None));
        self.roots.push(id);
        debug!(pool = %id, "Created root pool");
        id
    }

    /// Create a pool owned by `parent`. Panics if `parent` is not live.
    #[track_caller]
    pub fn new_subpool(&mut self, parent: PoolId) -> PoolId {
        self.live(parent);
        let id = self.insert(PoolNode::new(Some(parent)));
        self.live_mut(parent).children.push(id);
        debug!(pool = %id, parent = %parent, "Created subpool");
        id
    }

    /// Tear down `pool` and all of its descendants, then detach it from its
    /// parent. Every handle into the subtree becomes stale.
    ///
    /// Children go first, newest first, each subtree completely (cleanups
    /// run, chunks freed) before the next one starts; then `pool`'s own
    /// cleanups run in reverse registration order; then its chunks are
    /// freed. Panics if `pool` is not live.
    #[track_caller]
    pub fn delete_pool(&mut self, pool: PoolId) {
        let parent = self.live(pool).parent;
        let torn_down = self.teardown(pool);
        match parent {
            Some(parent) => {
                if let Ok(node) = self.node_mut(parent) {
                    node.children.retain(|&child| child != pool);
                }
            }
            None => self.roots.retain(|&root| root != pool),
        }
        debug!(pool = %pool, pools = torn_down, "Deleted pool");
    }

    /// True if `pool` has not been deleted.
    #[must_use]
    pub fn is_live(&self, pool: PoolId) -> bool {
        self.node(pool).is_ok()
    }

    /// Parent of a live pool (`None` for roots).
    #[track_caller]
    #[must_use]
    pub fn parent(&self, pool: PoolId) -> Option<PoolId> {
        self.live(pool).parent
    }

    /// Children of a live pool, oldest first.
    #[track_caller]
    #[must_use]
    pub fn children(&self, pool: PoolId) -> &[PoolId] {
        &self.live(pool).children
    }

    /// Live root pools, oldest first.
    #[must_use]
    pub fn roots(&self) -> &[PoolId] {
        &self.roots
    }

    /// Number of live pools in the tree.
    #[must_use]
    pub fn live_pools(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate `n` bytes from `pool`.
    ///
    /// Bumps the current chunk when it has room, otherwise obtains a new
    /// chunk of `max(chunk_size, n)` bytes. Requests above the large
    /// allocation threshold get a dedicated chunk. Zero-length requests
    /// still return a distinct block. Contents are unspecified.
    #[track_caller]
    pub fn pmalloc(&mut self, pool: PoolId, n: usize) -> Block {
        let config = self.config;
        let (block, new_chunk) = self.live_mut(pool).carve(pool, &config, n);
        self.stats.record_allocation();
        if let Some(capacity) = new_chunk {
            self.stats.record_chunk(capacity);
            trace!(pool = %pool, capacity, request = n, "Allocated chunk");
        }
        block
    }

    /// Allocate a zero-filled region of `count * size` bytes.
    ///
    /// Panics if the product overflows `usize`.
    #[track_caller]
    pub fn pcalloc(&mut self, pool: PoolId, count: usize, size: usize) -> Block {
        let Some(n) = count.checked_mul(size) else {
            panic!("pcalloc: {count} * {size} overflows usize");
        };
        let block = self.pmalloc(pool, n);
        self.bytes_mut(block).fill(0);
        block
    }

    /// Grow or shrink `block` to `new_size` bytes.
    ///
    /// The newest block of the current chunk is resized in place when the
    /// chunk has room. Any other block is moved: a fresh block is allocated
    /// and `min(old, new)` bytes are copied; the old region stays behind as
    /// slack. `None` behaves like `pmalloc`.
    ///
    /// Panics if `block` was not allocated from `pool` or `pool` is dead.
    #[track_caller]
    pub fn prealloc(&mut self, pool: PoolId, block: Option<Block>, new_size: usize) -> Block {
        let Some(old) = block else {
            return self.pmalloc(pool, new_size);
        };
        if old.pool != pool {
            panic!("{}", PoolError::ForeignBlock { block: old, pool });
        }

        let node = self.live_mut(pool);
        if let Err(err) = node.check(old) {
            panic!("{err}");
        }
        if node.resize_in_place(old, new_size) {
            self.stats.record_resize(true);
            trace!(pool = %pool, from = old.len, to = new_size, "Resized in place");
            return Block {
                len: new_size,
                ..old
            };
        }

        let new = self.pmalloc(pool, new_size);
        let keep = old.len.min(new_size);
        copy_region(
            &mut self.live_mut(pool).chunks,
            (old.chunk as usize, old.start()),
            (new.chunk as usize, new.start()),
            keep,
        );
        self.stats.record_resize(false);
        trace!(pool = %pool, from = old.len, to = new_size, copied = keep, "Resized by copy");
        new
    }

    // ------------------------------------------------------------------
    // Memory access
    // ------------------------------------------------------------------

    /// Contents of `block`, or why the handle is unusable.
    pub fn get(&self, block: Block) -> Result<&[u8], PoolError> {
        let chunk = self.node(block.pool)?.check(block)?;
        chunk
            .slice(block.start(), block.end())
            .ok_or(PoolError::BlockOutOfRange(block))
    }

    /// Mutable contents of `block`, or why the handle is unusable.
    pub fn get_mut(&mut self, block: Block) -> Result<&mut [u8], PoolError> {
        let node = self.node_mut(block.pool)?;
        node.check(block)?;
        node.chunks[block.chunk as usize]
            .slice_mut(block.start(), block.end())
            .ok_or(PoolError::BlockOutOfRange(block))
    }

    /// Contents of `block`. Panics on a stale handle.
    #[track_caller]
    #[must_use]
    pub fn bytes(&self, block: Block) -> &[u8] {
        match self.get(block) {
            Ok(bytes) => bytes,
            Err(err) => panic!("{err}"),
        }
    }

    /// Mutable contents of `block`. Panics on a stale handle.
    #[track_caller]
    pub fn bytes_mut(&mut self, block: Block) -> &mut [u8] {
        match self.get_mut(block) {
            Ok(bytes) => bytes,
            Err(err) => panic!("{err}"),
        }
    }

    // ------------------------------------------------------------------
    // Cleanup registry
    // ------------------------------------------------------------------

    /// Run `f` exactly once when `pool` is torn down, before its chunks are
    /// released. `f` may read the pool's own blocks through [`PoolMemory`].
    #[track_caller]
    pub fn register_cleanup_fn<F>(&mut self, pool: PoolId, f: F)
    where
        F: FnOnce(&PoolMemory<'_>) + 'static,
    {
        self.live_mut(pool).cleanups.push(Cleanup::Callback(Box::new(f)));
    }

    /// Close `fd` exactly once when `pool` is torn down.
    #[cfg(unix)]
    #[track_caller]
    pub fn register_fd(&mut self, pool: PoolId, fd: impl Into<OwnedFd>) {
        self.live_mut(pool).cleanups.push(Cleanup::Fd(fd.into()));
    }

    /// Hand a value allocated outside the pool's chunks to `pool`; it is
    /// dropped when the pool is torn down.
    #[track_caller]
    pub fn register_owned<T: Any>(&mut self, pool: PoolId, value: Box<T>) -> ResourceId {
        let value: Box<dyn Any> = value;
        let node = self.live_mut(pool);
        node.cleanups.push(Cleanup::Owned(value));
        ResourceId {
            pool,
            entry: node.cleanups.len() - 1,
        }
    }

    /// Borrow a value registered with [`register_owned`](Self::register_owned).
    pub fn owned<T: Any>(&self, id: ResourceId) -> Result<&T, PoolError> {
        match self.node(id.pool)?.cleanups.get(id.entry) {
            Some(Cleanup::Owned(value)) => value
                .downcast_ref::<T>()
                .ok_or(PoolError::UnknownResource(id)),
            _ => Err(PoolError::UnknownResource(id)),
        }
    }

    /// Mutably borrow a value registered with [`register_owned`](Self::register_owned).
    pub fn owned_mut<T: Any>(&mut self, id: ResourceId) -> Result<&mut T, PoolError> {
        match self.node_mut(id.pool)?.cleanups.get_mut(id.entry) {
            Some(Cleanup::Owned(value)) => value
                .downcast_mut::<T>()
                .ok_or(PoolError::UnknownResource(id)),
            _ => Err(PoolError::UnknownResource(id)),
        }
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Cumulative counters for the whole tree.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    /// Snapshot of one live pool.
    #[track_caller]
    #[must_use]
    pub fn pool_stats(&self, pool: PoolId) -> PoolStats {
        self.live(pool).stats()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn insert(&mut self, node: PoolNode) -> PoolId {
        self.stats.record_pool_created();
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return PoolId::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len())
            .unwrap_or_else(|_| panic!("pool slot table exhausted"));
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        PoolId::new(index, 0)
    }

    fn node(&self, pool: PoolId) -> Result<&PoolNode, PoolError> {
        self.slots
            .get(pool.slot())
            .filter(|slot| slot.generation == pool.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(PoolError::StalePool(pool))
    }

    fn node_mut(&mut self, pool: PoolId) -> Result<&mut PoolNode, PoolError> {
        self.slots
            .get_mut(pool.slot())
            .filter(|slot| slot.generation == pool.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(PoolError::StalePool(pool))
    }

    #[track_caller]
    fn live(&self, pool: PoolId) -> &PoolNode {
        match self.node(pool) {
            Ok(node) => node,
            Err(err) => panic!("{err}"),
        }
    }

    #[track_caller]
    fn live_mut(&mut self, pool: PoolId) -> &mut PoolNode {
        match self.node_mut(pool) {
            Ok(node) => node,
            Err(err) => panic!("{err}"),
        }
    }

    /// Post-order teardown of the subtree under `root`. Iterative, so deep
    /// chains cannot overflow the stack. Returns the number of pools freed.
    fn teardown(&mut self, root: PoolId) -> usize {
        let mut stack = vec![(root, false)];
        let mut freed = 0;
        while let Some((id, children_done)) = stack.pop() {
            if children_done {
                self.release(id);
                freed += 1;
                continue;
            }
            stack.push((id, true));
            // Pushed oldest first, so the newest child is popped first.
            let children = match self.node_mut(id) {
                Ok(node) => std::mem::take(&mut node.children),
                Err(_) => continue,
            };
            stack.extend(children.into_iter().map(|child| (child, false)));
        }
        freed
    }

    /// Run `id`'s cleanups and free its chunks. Children must already be gone.
    fn release(&mut self, id: PoolId) {
        let Some(slot) = self.slots.get_mut(id.slot()) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        let Some(mut node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);

        let cleanups = std::mem::take(&mut node.cleanups);
        let memory = PoolMemory::new(id, &node.chunks);
        for entry in cleanups.into_iter().rev() {
            trace!(pool = %id, kind = entry.kind(), "Running cleanup");
            entry.run(&memory);
            self.stats.record_cleanup();
        }

        for chunk in &node.chunks {
            self.stats.record_chunk_release(chunk.capacity());
        }
        drop(node);
        self.free.push(id.index);
        self.stats.record_pool_deleted();
    }
}

impl Drop for PoolTree {
    fn drop(&mut self) {
        while let Some(root) = self.roots.pop() {
            self.teardown(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn small_tree() -> PoolTree {
        PoolTree::with_config(PoolConfig {
            chunk_size: 256,
            large_alloc_threshold: 64,
        })
    }

    #[test]
    fn create_delete() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        assert!(tree.is_live(p));
        tree.delete_pool(p);
        assert!(!tree.is_live(p));
        assert_eq!(tree.live_pools(), 0);
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn chunks_are_lazy() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        assert_eq!(tree.pool_stats(p).chunks, 0);
        let _ = tree.pmalloc(p, 1);
        assert_eq!(tree.pool_stats(p).chunks, 1);
    }

    #[test]
    fn bump_allocations_share_a_chunk() {
        let mut tree = small_tree();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 10);
        let b = tree.pmalloc(p, 20);
        assert_eq!(a.chunk, b.chunk);
        assert_eq!(b.start(), a.end());
        assert_eq!(tree.pool_stats(p).used, 30);
    }

    #[test]
    fn full_chunk_gets_replaced() {
        let mut tree = small_tree();
        let p = tree.new_pool();
        for _ in 0..4 {
            let _ = tree.pmalloc(p, 60);
        }
        let spill = tree.pmalloc(p, 60);
        assert_eq!(spill.chunk, 1);
        assert_eq!(spill.start(), 0);
        assert_eq!(tree.pool_stats(p).chunks, 2);
    }

    #[test]
    fn large_request_gets_dedicated_chunk() {
        let mut tree = small_tree();
        let p = tree.new_pool();
        let small = tree.pmalloc(p, 8);
        let big = tree.pmalloc(p, 1000);
        let after = tree.pmalloc(p, 8);
        assert_ne!(big.chunk, small.chunk);
        assert_eq!(tree.pool_stats(p).capacity, 256 + 1000);
        // The shared chunk is still the current one.
        assert_eq!(after.chunk, small.chunk);
        assert_eq!(after.start(), small.end());
    }

    #[test]
    fn zero_length_blocks_are_distinct() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 0);
        let b = tree.pmalloc(p, 0);
        assert_ne!(a, b);
        assert!(tree.bytes(a).is_empty());
    }

    #[test]
    fn pcalloc_is_zeroed_even_after_shrink() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 64);
        tree.bytes_mut(a).fill(0xAA);
        let _ = tree.prealloc(p, Some(a), 0);
        let z = tree.pcalloc(p, 8, 8);
        assert!(tree.bytes(z).iter().all(|&b| b == 0));
        assert_eq!(z.len(), 64);
    }

    #[test]
    #[should_panic(expected = "overflows usize")]
    fn pcalloc_rejects_overflow() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let _ = tree.pcalloc(p, usize::MAX, 2);
    }

    #[test]
    fn prealloc_grows_tail_in_place() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 16);
        tree.bytes_mut(a).copy_from_slice(b"0123456789abcdef");
        let grown = tree.prealloc(p, Some(a), 200);
        assert_eq!(grown.start(), a.start());
        assert_eq!(&tree.bytes(grown)[..16], b"0123456789abcdef");
        assert_eq!(tree.stats().in_place_resizes, 1);
        assert_eq!(tree.stats().copying_resizes, 0);
    }

    #[test]
    fn prealloc_moves_buried_block() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 16);
        tree.bytes_mut(a).copy_from_slice(b"0123456789abcdef");
        let b = tree.pmalloc(p, 4);
        tree.bytes_mut(b).copy_from_slice(b"keep");
        let moved = tree.prealloc(p, Some(a), 200);
        assert_ne!(moved.start(), a.start());
        assert_eq!(&tree.bytes(moved)[..16], b"0123456789abcdef");
        assert_eq!(tree.bytes(b), b"keep");
        assert_eq!(tree.stats().copying_resizes, 1);
    }

    #[test]
    fn prealloc_shrink_keeps_prefix() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 200);
        for (i, byte) in tree.bytes_mut(a).iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let _guard = tree.pmalloc(p, 1);
        let shrunk = tree.prealloc(p, Some(a), 50);
        assert_eq!(shrunk.len(), 50);
        let expected: Vec<u8> = (0..50).map(|i| (i % 251) as u8).collect();
        assert_eq!(tree.bytes(shrunk), expected.as_slice());
    }

    #[test]
    fn prealloc_none_allocates() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let a = tree.prealloc(p, None, 8);
        assert_eq!(a.len(), 8);
        let b = tree.prealloc(p, Some(a), 100);
        let c = tree.prealloc(p, Some(b), 200);
        assert_eq!(c.len(), 200);
        assert_eq!(c.start(), a.start());
    }

    #[test]
    fn prealloc_past_chunk_end_moves() {
        let mut tree = small_tree();
        let p = tree.new_pool();
        let a = tree.pmalloc(p, 60);
        tree.bytes_mut(a)[0] = 7;
        let big = tree.prealloc(p, Some(a), 300);
        assert_ne!(big.chunk, a.chunk);
        assert_eq!(tree.bytes(big)[0], 7);
    }

    #[test]
    #[should_panic(expected = "does not belong to")]
    fn prealloc_rejects_foreign_block() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let q = tree.new_pool();
        let a = tree.pmalloc(p, 8);
        let _ = tree.prealloc(q, Some(a), 16);
    }

    #[test]
    fn cleanups_run_in_reverse() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let order = Rc::new(RefCell::new(Vec::new()));
        for name in ["A", "B", "C"] {
            let order = Rc::clone(&order);
            tree.register_cleanup_fn(p, move |_| order.borrow_mut().push(name));
        }
        tree.delete_pool(p);
        assert_eq!(*order.borrow(), ["C", "B", "A"]);
        assert_eq!(tree.stats().cleanups_run, 3);
    }

    #[test]
    fn cleanup_reads_own_memory() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let block = tree.pmalloc(p, 5);
        tree.bytes_mut(block).copy_from_slice(b"hello");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        tree.register_cleanup_fn(p, move |mem| {
            sink.borrow_mut().extend_from_slice(mem.bytes(block).unwrap_or_default());
        });
        tree.delete_pool(p);
        assert_eq!(seen.borrow().as_slice(), b"hello");
    }

    #[test]
    fn subpool_cleanup_cannot_see_torn_down_child() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let s = tree.new_subpool(p);
        let child_block = tree.pmalloc(s, 4);
        let visible = Rc::new(Cell::new(true));
        let flag = Rc::clone(&visible);
        tree.register_cleanup_fn(p, move |mem| flag.set(mem.bytes(child_block).is_some()));
        tree.delete_pool(p);
        assert!(!visible.get());
    }

    #[test]
    fn deleting_subpool_detaches_it() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let s1 = tree.new_subpool(p);
        let s2 = tree.new_subpool(p);
        assert_eq!(tree.children(p), &[s1, s2]);
        assert_eq!(tree.parent(s1), Some(p));
        tree.delete_pool(s1);
        assert_eq!(tree.children(p), &[s2]);
        assert!(tree.is_live(p));
        tree.delete_pool(p);
        assert!(!tree.is_live(s2));
    }

    #[test]
    fn cascade_counts_every_cleanup() {
        let mut tree = PoolTree::new();
        let calls = Rc::new(Cell::new(0));
        let p = tree.new_pool();
        let sp1 = tree.new_subpool(p);
        let sp2 = tree.new_subpool(p);
        for pool in [p, sp1, sp2] {
            let calls = Rc::clone(&calls);
            tree.register_cleanup_fn(pool, move |_| calls.set(calls.get() + 1));
        }
        tree.delete_pool(sp1);
        assert_eq!(calls.get(), 1);
        tree.delete_pool(p);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn siblings_torn_down_newest_first_and_whole() {
        let mut tree = PoolTree::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let p = tree.new_pool();
        let a = tree.new_subpool(p);
        let a1 = tree.new_subpool(a);
        let b = tree.new_subpool(p);
        for (pool, name) in [(p, "p"), (a, "a"), (a1, "a1"), (b, "b")] {
            let order = Rc::clone(&order);
            tree.register_cleanup_fn(pool, move |_| order.borrow_mut().push(name));
        }
        tree.delete_pool(p);
        assert_eq!(*order.borrow(), ["b", "a1", "a", "p"]);
    }

    #[test]
    fn stale_handle_detected_after_slot_reuse() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let block = tree.pmalloc(p, 4);
        tree.delete_pool(p);
        let q = tree.new_pool();
        assert_eq!(q.index, p.index);
        assert_ne!(q, p);
        assert_eq!(tree.get(block), Err(PoolError::StalePool(p)));
    }

    #[test]
    #[should_panic(expected = "has been deleted")]
    fn double_delete_fails_fast() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        tree.delete_pool(p);
        tree.delete_pool(p);
    }

    #[test]
    #[should_panic(expected = "has been deleted")]
    fn subpool_of_dead_pool_fails_fast() {
        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        tree.delete_pool(p);
        let _ = tree.new_subpool(p);
    }

    #[test]
    fn owned_values_live_until_teardown() {
        struct Buffer(Rc<Cell<bool>>, Vec<u8>);
        impl Drop for Buffer {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let mut tree = PoolTree::new();
        let p = tree.new_pool();
        let dropped = Rc::new(Cell::new(false));
        let id = tree.register_owned(p, Box::new(Buffer(Rc::clone(&dropped), vec![1, 2])));
        tree.owned_mut::<Buffer>(id).unwrap().1.push(3);
        assert_eq!(tree.owned::<Buffer>(id).unwrap().1, [1, 2, 3]);
        assert!(tree.owned::<String>(id).is_err());
        assert!(!dropped.get());
        tree.delete_pool(p);
        assert!(dropped.get());
        assert_eq!(tree.owned::<Buffer>(id).err(), Some(PoolError::StalePool(p)));
    }

    #[test]
    fn dropping_tree_runs_remaining_cleanups() {
        let calls = Rc::new(Cell::new(0));
        {
            let mut tree = PoolTree::new();
            let p = tree.new_pool();
            let s = tree.new_subpool(p);
            let q = tree.new_pool();
            for pool in [p, s, q] {
                let calls = Rc::clone(&calls);
                tree.register_cleanup_fn(pool, move |_| calls.set(calls.get() + 1));
            }
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn stats_balance_after_teardown() {
        let mut tree = small_tree();
        let p = tree.new_pool();
        let s = tree.new_subpool(p);
        for _ in 0..50 {
            let _ = tree.pmalloc(s, 30);
            let _ = tree.pmalloc(p, 500);
        }
        tree.delete_pool(p);
        let stats = tree.stats();
        assert_eq!(stats.live_pools(), 0);
        assert_eq!(stats.chunks_allocated, stats.chunks_released);
        assert_eq!(stats.bytes_held(), 0);
        assert_eq!(stats.allocations, 100);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let mut tree = PoolTree::new();
        let root = tree.new_pool();
        let mut pool = root;
        for _ in 0..100_000 {
            pool = tree.new_subpool(pool);
        }
        tree.delete_pool(root);
        assert_eq!(tree.live_pools(), 0);
    }

    #[test]
    fn peak_counts_pools_deleted_before_any_snapshot() {
        let mut tree = PoolTree::new();
        let root = tree.new_pool();
        let mut previous = None;
        for _ in 0..10 {
            let sub = tree.new_subpool(root);
            if let Some(old) = previous.replace(sub) {
                tree.delete_pool(old);
            }
        }
        // Root, the surviving subpool, and the one created just before it
        // was deleted.
        assert_eq!(tree.stats().peak_live_pools, 3);
        tree.delete_pool(root);
        assert_eq!(tree.stats().peak_live_pools, 3);
    }
}
