//! Allocator workloads and the leak check that follows each one.
//!
//! Every workload runs in a fresh tree under a single root pool. When it is
//! done the root is deleted, and the tree's counters must show every pool,
//! chunk and cleanup accounted for.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use pooltree_collections::{pjoin, pstrsplit, psprintf, DeepCopy, PoolStr, PoolVec};
use pooltree_memory::{PoolConfig, PoolId, PoolTree, TreeStats};

use crate::errors::AppError;

/// Subpools kept alive at once by the churn workload.
pub const RING_SIZE: usize = 100;
/// Allocations per churn iteration.
pub const ALLOCS_PER_ITERATION: usize = 100;
/// Depth of the nested workload's pool tree.
pub const NESTED_DEPTH: u32 = 8;
/// Level at which the nested workload deletes its subpools.
pub const NESTED_DELETE_LEVEL: u32 = 4;
/// Children per pool in the nested workload.
pub const NESTED_FANOUT: usize = 3;

/// Workload selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WorkloadKind {
    /// A ring of subpools recycled over and over.
    Churn,
    /// A deep fan-out tree deleted from the middle.
    Nested,
    /// Small, large and resized blocks plus pool strings.
    Mixed,
    /// Every workload in turn.
    All,
}

impl WorkloadKind {
    /// The concrete workloads this selection runs.
    #[must_use]
    pub fn workloads(self) -> Vec<Workload> {
        match self {
            Self::Churn => vec![Workload::Churn],
            Self::Nested => vec![Workload::Nested],
            Self::Mixed => vec![Workload::Mixed],
            Self::All => vec![Workload::Churn, Workload::Nested, Workload::Mixed],
        }
    }
}

/// One runnable workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// See [`WorkloadKind::Churn`].
    Churn,
    /// See [`WorkloadKind::Nested`].
    Nested,
    /// See [`WorkloadKind::Mixed`].
    Mixed,
}

impl Workload {
    /// Name used in reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Churn => "churn",
            Self::Nested => "nested",
            Self::Mixed => "mixed",
        }
    }
}

/// Outcome of one workload run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// Workload name.
    pub workload: &'static str,
    /// Iterations actually run (1 for the nested workload).
    pub iterations: u64,
    /// Wall-clock time of the run, teardown included.
    pub elapsed_us: u64,
    /// Most pools alive at once.
    pub peak_pools: u64,
    /// Tree counters after the root was deleted.
    pub stats: TreeStats,
}

/// Counts cleanup registrations so the run can check each one fired.
#[derive(Debug, Default)]
struct Ledger {
    callbacks: u64,
    owned: u64,
    fired: Rc<Cell<u64>>,
}

impl Ledger {
    fn watch(&mut self, tree: &mut PoolTree, pool: PoolId) {
        let fired = Rc::clone(&self.fired);
        tree.register_cleanup_fn(pool, move |_| fired.set(fired.get() + 1));
        self.callbacks += 1;
    }

    fn own(&mut self, tree: &mut PoolTree, pool: PoolId, size: usize) {
        let _ = tree.register_owned(pool, Box::new(vec![0u8; size]));
        self.owned += 1;
    }
}

/// Run `workload` in a fresh tree and check that it leaked nothing.
pub fn run_workload(
    workload: Workload,
    config: PoolConfig,
    iterations: u64,
) -> Result<WorkloadReport, AppError> {
    let name = workload.name();
    debug!(workload = name, iterations, ?config, "Starting workload");
    let started = Instant::now();

    let mut tree = PoolTree::with_config(config);
    let root = tree.new_pool();
    let mut ledger = Ledger::default();
    ledger.watch(&mut tree, root);

    let iterations = match workload {
        Workload::Churn => {
            churn(&mut tree, root, iterations, &mut ledger);
            iterations
        }
        Workload::Nested => {
            nested(&mut tree, root, 0, &mut ledger);
            1
        }
        Workload::Mixed => {
            mixed(&mut tree, root, iterations, &mut ledger)?;
            iterations
        }
    };

    tree.delete_pool(root);
    let elapsed = started.elapsed();
    let stats = tree.stats();
    check_balanced(name, &stats, &ledger)?;
    info!(workload = name, ?elapsed, "Workload finished clean");

    Ok(WorkloadReport {
        workload: name,
        iterations,
        elapsed_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        peak_pools: stats.peak_live_pools,
        stats,
    })
}

fn check_balanced(
    workload: &'static str,
    stats: &TreeStats,
    ledger: &Ledger,
) -> Result<(), AppError> {
    let leak = |detail: String| Err(AppError::Leak { workload, detail });
    if stats.live_pools() != 0 {
        return leak(format!("{} pools still alive", stats.live_pools()));
    }
    if stats.chunks_allocated != stats.chunks_released || stats.bytes_held() != 0 {
        return leak(format!(
            "{} of {} chunks ({} bytes) not released",
            stats.chunks_allocated - stats.chunks_released,
            stats.chunks_allocated,
            stats.bytes_held()
        ));
    }
    if ledger.fired.get() != ledger.callbacks {
        return leak(format!(
            "{} of {} cleanup callbacks never ran",
            ledger.callbacks - ledger.fired.get(),
            ledger.callbacks
        ));
    }
    if stats.cleanups_run != ledger.callbacks + ledger.owned {
        return leak(format!(
            "{} cleanups ran, {} registered",
            stats.cleanups_run,
            ledger.callbacks + ledger.owned
        ));
    }
    Ok(())
}

/// A ring of subpools under `root`, each recycled once per lap. Every
/// subpool gets a burst of allocations that are all grown afterwards.
fn churn(tree: &mut PoolTree, root: PoolId, iterations: u64, ledger: &mut Ledger) {
    let mut ring: Vec<Option<PoolId>> = vec![None; RING_SIZE];
    let iterations = usize::try_from(iterations).unwrap_or(usize::MAX);
    for lap_slot in (0..RING_SIZE).cycle().take(iterations) {
        if let Some(old) = ring[lap_slot].take() {
            tree.delete_pool(old);
        }
        let sub = tree.new_subpool(root);
        ledger.watch(tree, sub);
        for _ in 0..ALLOCS_PER_ITERATION {
            let block = tree.pmalloc(sub, 100);
            let _ = tree.prealloc(sub, Some(block), 200);
        }
        ring[lap_slot] = Some(sub);
    }
}

/// Fan-out tree of depth [`NESTED_DEPTH`]; pools at
/// [`NESTED_DELETE_LEVEL`] are deleted once their subtree is built, the rest
/// go with the root.
fn nested(tree: &mut PoolTree, pool: PoolId, level: u32, ledger: &mut Ledger) {
    if level == 0 {
        let block = tree.pmalloc(pool, 4);
        let _ = tree.prealloc(pool, Some(block), 8);
        let _ = tree.pmalloc(pool, 8);
        let _ = tree.pmalloc(pool, 1);
    }

    for _ in 0..NESTED_FANOUT {
        if level + 1 < NESTED_DEPTH {
            let child = tree.new_subpool(pool);
            ledger.watch(tree, child);

            let block = tree.pmalloc(child, 16);
            let block = tree.prealloc(child, Some(block), 100);
            let _ = tree.prealloc(child, Some(block), 200);
            let _ = tree.pcalloc(child, 4, 4);
            let _ = tree.prealloc(child, None, 8);
            let block = tree.pmalloc(child, 4);
            let _ = tree.prealloc(child, Some(block), 8);
            let _ = tree.pmalloc(pool, 1);
            let block = tree.pmalloc(pool, 8);
            let _ = tree.prealloc(pool, Some(block), 8);
            let block = tree.pmalloc(pool, 8);
            let _ = tree.prealloc(pool, Some(block), 16);

            nested(tree, child, level + 1, ledger);
            if level + 1 == NESTED_DELETE_LEVEL {
                tree.delete_pool(child);
            }
        }
        let _ = tree.pmalloc(pool, 1);
    }
}

/// Per iteration: a scratch subpool gets a mix of tiny, large and resized
/// blocks plus an owned buffer, and splits a line into words. The words are
/// deep-copied into a long-lived pool before the scratch pool is deleted,
/// and every copy is checked at the end.
fn mixed(
    tree: &mut PoolTree,
    root: PoolId,
    iterations: u64,
    ledger: &mut Ledger,
) -> Result<(), AppError> {
    let keep = tree.new_subpool(root);
    ledger.watch(tree, keep);
    let mut kept: Vec<(u64, PoolVec<PoolStr>)> = Vec::new();

    for i in 0..iterations {
        let scratch = tree.new_subpool(root);
        ledger.watch(tree, scratch);
        ledger.own(tree, scratch, 10);

        for (size, grow) in [
            (1, None),
            (1, None),
            (200, Some(300)),
            (1000, None),
            (1000, Some(1001)),
            (900, Some(901)),
            (1, None),
            (4, None),
            (8, None),
            (1, None),
            (400, None),
        ] {
            let block = tree.pmalloc(scratch, size);
            if let Some(grow) = grow {
                let _ = tree.prealloc(scratch, Some(block), grow);
            }
        }

        let line = psprintf(tree, scratch, format_args!("--iteration--{i}--alpha--beta--"));
        let text = line.as_str(tree).to_owned();
        let words = pstrsplit(tree, scratch, &text, "--");
        kept.push((i, words.copy_into(tree, keep)));
        tree.delete_pool(scratch);
    }

    for (i, words) in &kept {
        let joined = pjoin(tree, keep, words, " ");
        let expected = format!("iteration {i} alpha beta");
        if joined.as_str(tree) != expected {
            return Err(AppError::Corruption {
                workload: Workload::Mixed.name(),
                detail: format!("expected {expected:?}, found {:?}", joined.as_str(tree)),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> PoolConfig {
        PoolConfig {
            chunk_size: 1024,
            large_alloc_threshold: 256,
        }
        .normalize()
    }

    #[test]
    fn all_expands_to_every_workload() {
        assert_eq!(WorkloadKind::All.workloads().len(), 3);
        assert_eq!(WorkloadKind::Nested.workloads(), [Workload::Nested]);
    }

    #[test]
    fn churn_is_balanced() {
        let report = run_workload(Workload::Churn, small(), 250).unwrap();
        assert_eq!(report.iterations, 250);
        // Root plus 250 subpools.
        assert_eq!(report.stats.pools_created, 251);
        assert_eq!(report.peak_pools, 1 + RING_SIZE as u64);
        assert_eq!(report.stats.cleanups_run, 251);
    }

    #[test]
    fn nested_builds_full_tree() {
        let report = run_workload(Workload::Nested, PoolConfig::default(), 0).unwrap();
        // 3 + 9 + ... + 3^7 subpools under the root.
        let expected: u64 = 1 + (1..NESTED_DEPTH).map(|level| 3u64.pow(level)).sum::<u64>();
        assert_eq!(report.stats.pools_created, expected);
        assert!(report.peak_pools < expected);
    }

    #[test]
    fn mixed_keeps_copies_intact() {
        let report = run_workload(Workload::Mixed, small(), 50).unwrap();
        // Root, keep, and 50 scratch pools; each scratch also owns a buffer.
        assert_eq!(report.stats.pools_created, 52);
        assert_eq!(report.stats.cleanups_run, 52 + 50);
    }

    #[test]
    fn zero_iterations_is_fine() {
        let report = run_workload(Workload::Churn, PoolConfig::default(), 0).unwrap();
        assert_eq!(report.stats.pools_created, 1);
    }
}
