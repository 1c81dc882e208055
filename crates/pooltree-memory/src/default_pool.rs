//! The default pool, used by callers that do not pass a pool explicitly.
//!
//! Each thread that touches it gets its own tree and root pool, created
//! lazily on first use. There is no process-wide default: a second thread
//! silently gets a different root, and a [`PoolId`] taken from one thread's
//! default pool means nothing on any other. Only the owning thread can ever
//! reach it, so it is never torn down from another thread. It is torn down by
//! [`teardown_default_pool`], when the thread exits, or not at all if the
//! process exits first.

use std::cell::RefCell;

use tracing::debug;

use crate::handle::PoolId;
use crate::tree::PoolTree;

struct DefaultPool {
    tree: PoolTree,
    root: PoolId,
}

thread_local! {
    static DEFAULT_POOL: RefCell<Option<DefaultPool>> = const { RefCell::new(None) };
}

/// Lend the default tree and its root pool to `f`, creating them on first use.
///
/// Panics if called re-entrantly from inside `f`.
pub fn with_default_pool<R>(f: impl FnOnce(&mut PoolTree, PoolId) -> R) -> R {
    DEFAULT_POOL.with(|cell| {
        let mut slot = cell.borrow_mut();
        let default = slot.get_or_insert_with(|| {
            let mut tree = PoolTree::new();
            let root = tree.new_pool();
            debug!(pool = %root, "Initialized default pool");
            DefaultPool { tree, root }
        });
        f(&mut default.tree, default.root)
    })
}

/// True once the default pool exists on this thread.
#[must_use]
pub fn default_pool_initialized() -> bool {
    DEFAULT_POOL.with(|cell| cell.borrow().is_some())
}

/// Tear down the default pool, running every cleanup registered on it or
/// its subpools. Returns `false` if it was never created.
///
/// Cleanups run after the pool has been unhooked, so they may themselves use
/// [`with_default_pool`]; doing so creates a fresh default pool.
pub fn teardown_default_pool() -> bool {
    let Some(default) = DEFAULT_POOL.with(|cell| cell.borrow_mut().take()) else {
        return false;
    };
    debug!(pool = %default.root, "Tearing down default pool");
    drop(default.tree);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    // Tests may share a thread when run with one test thread; start clean.

    #[test]
    fn lazily_created() {
        teardown_default_pool();
        assert!(!default_pool_initialized());
        let root = with_default_pool(|tree, root| {
            assert!(tree.is_live(root));
            root
        });
        assert!(default_pool_initialized());
        assert_eq!(with_default_pool(|_, again| again), root);
    }

    #[test]
    fn allocations_persist_between_calls() {
        teardown_default_pool();
        let block = with_default_pool(|tree, root| {
            let block = tree.pmalloc(root, 3);
            tree.bytes_mut(block).copy_from_slice(b"abc");
            block
        });
        with_default_pool(|tree, _| assert_eq!(tree.bytes(block), b"abc"));
    }

    #[test]
    fn teardown_runs_cleanups() {
        teardown_default_pool();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        with_default_pool(|tree, root| {
            let sub = tree.new_subpool(root);
            tree.register_cleanup_fn(sub, move |_| counter.set(counter.get() + 1));
        });
        assert!(teardown_default_pool());
        assert_eq!(calls.get(), 1);
        assert!(!default_pool_initialized());
        assert!(!teardown_default_pool());
    }

    #[test]
    fn threads_do_not_share() {
        with_default_pool(|tree, root| {
            let _ = tree.pmalloc(root, 1);
        });
        let other = std::thread::spawn(default_pool_initialized)
            .join()
            .unwrap();
        assert!(!other);
    }

    #[test]
    fn second_thread_gets_its_own_root() {
        teardown_default_pool();
        with_default_pool(|tree, root| {
            let _ = tree.new_subpool(root);
            let _ = tree.new_subpool(root);
        });
        let (created, children) = std::thread::spawn(|| {
            with_default_pool(|tree, root| (tree.stats().pools_created, tree.children(root).len()))
        })
        .join()
        .unwrap();
        assert_eq!((created, children), (1, 0));
        with_default_pool(|tree, root| assert_eq!(tree.children(root).len(), 2));
        teardown_default_pool();
    }
}
