#![no_main]

use libfuzzer_sys::fuzz_target;

use pooltree_memory::{Block, PoolConfig, PoolId, PoolTree};

// Each input byte pair is one operation. Live blocks are tracked with the
// fill byte written into them, and checked after every step.
fuzz_target!(|data: &[u8]| {
    let mut tree = PoolTree::with_config(PoolConfig {
        chunk_size: 256,
        large_alloc_threshold: 64,
    });
    let root = tree.new_pool();
    let mut pools: Vec<PoolId> = vec![root];
    let mut live: Vec<(Block, u8)> = Vec::new();

    for (step, pair) in data.chunks_exact(2).enumerate() {
        let (op, arg) = (pair[0], pair[1]);
        let fill = step as u8;
        let pool = pools[usize::from(op >> 3) % pools.len()];
        match op & 7 {
            0 | 1 => {
                let block = tree.pmalloc(pool, usize::from(arg) * 3);
                tree.bytes_mut(block).fill(fill);
                live.push((block, fill));
            }
            2 => {
                let block = tree.pcalloc(pool, usize::from(arg & 15), usize::from(arg >> 4));
                assert!(tree.bytes(block).iter().all(|&b| b == 0));
                tree.bytes_mut(block).fill(fill);
                live.push((block, fill));
            }
            3 | 4 if !live.is_empty() => {
                let index = usize::from(arg) % live.len();
                let (old, old_fill) = live[index];
                let new_len = usize::from(arg) * 2;
                let resized = tree.prealloc(old.pool(), Some(old), new_len);
                let keep = old.len().min(new_len);
                assert!(tree.bytes(resized)[..keep].iter().all(|&b| b == old_fill));
                tree.bytes_mut(resized).fill(fill);
                live[index] = (resized, fill);
            }
            5 => pools.push(tree.new_subpool(pool)),
            6 if pool != root => {
                tree.delete_pool(pool);
                pools.retain(|&p| tree.is_live(p));
                live.retain(|(block, _)| tree.is_live(block.pool()));
            }
            _ => {}
        }
        for (block, fill) in &live {
            assert!(tree.bytes(*block).iter().all(|b| b == fill));
        }
    }

    tree.delete_pool(root);
    let stats = tree.stats();
    assert_eq!(stats.live_pools(), 0);
    assert_eq!(stats.chunks_allocated, stats.chunks_released);
});
