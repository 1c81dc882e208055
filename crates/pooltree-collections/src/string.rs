//! Strings allocated in pools, and the helpers that build them.

use std::fmt;

use pooltree_memory::{Block, PoolId, PoolTree};

use crate::element::{DeepCopy, Element};
use crate::vector::PoolVec;

/// A UTF-8 string stored in a pool block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolStr {
    block: Block,
}

impl PoolStr {
    /// The block holding the bytes.
    #[must_use]
    pub fn block(&self) -> Block {
        self.block
    }

    /// Pool holding the bytes.
    #[must_use]
    pub fn pool(&self) -> PoolId {
        self.block.pool()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.block.len()
    }

    /// True for the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    /// Borrow the contents.
    ///
    /// Panics if the pool was deleted, or if the bytes were overwritten
    /// through [`PoolTree::bytes_mut`] with invalid UTF-8.
    #[track_caller]
    #[must_use]
    pub fn as_str<'t>(&self, tree: &'t PoolTree) -> &'t str {
        match std::str::from_utf8(tree.bytes(self.block)) {
            Ok(s) => s,
            Err(err) => panic!("{} holds invalid UTF-8: {err}", self.block),
        }
    }
}

impl Element for PoolStr {
    const SIZE: usize = <Block as Element>::SIZE;

    fn write_le(&self, out: &mut [u8]) {
        self.block.write_le(out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        Self {
            block: Block::read_le(bytes),
        }
    }
}

impl DeepCopy for PoolStr {
    fn copy_into(&self, tree: &mut PoolTree, dest: PoolId) -> Self {
        Self {
            block: self.block.copy_into(tree, dest),
        }
    }
}

/// Copy `data` into a fresh block of `pool`.
pub fn pmemdup(tree: &mut PoolTree, pool: PoolId, data: &[u8]) -> Block {
    let block = tree.pmalloc(pool, data.len());
    tree.bytes_mut(block).copy_from_slice(data);
    block
}

/// Copy `s` into `pool`.
pub fn pstrdup(tree: &mut PoolTree, pool: PoolId, s: &str) -> PoolStr {
    PoolStr {
        block: pmemdup(tree, pool, s.as_bytes()),
    }
}

/// Copy at most `n` bytes of `s` into `pool`, backing off to the previous
/// character boundary so the result stays valid UTF-8.
pub fn pstrndup(tree: &mut PoolTree, pool: PoolId, s: &str, n: usize) -> PoolStr {
    let mut end = n.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    pstrdup(tree, pool, &s[..end])
}

/// `c` repeated `n` times.
pub fn pchrs(tree: &mut PoolTree, pool: PoolId, c: char, n: usize) -> PoolStr {
    pstrdup(tree, pool, &c.to_string().repeat(n))
}

/// `s` repeated `n` times.
pub fn pstrs(tree: &mut PoolTree, pool: PoolId, s: &str, n: usize) -> PoolStr {
    pstrdup(tree, pool, &s.repeat(n))
}

/// Format into a new string in `pool`, e.g.
/// `psprintf(tree, pool, format_args!("{} {}", 4, "four"))`.
pub fn psprintf(tree: &mut PoolTree, pool: PoolId, args: fmt::Arguments<'_>) -> PoolStr {
    pstrdup(tree, pool, &fmt::format(args))
}

/// Join `parts` with `sep` between each pair.
pub fn pjoin(tree: &mut PoolTree, pool: PoolId, parts: &PoolVec<PoolStr>, sep: &str) -> PoolStr {
    let mut joined = String::new();
    for (i, part) in parts.iter(tree).enumerate() {
        if i > 0 {
            joined.push_str(sep);
        }
        joined.push_str(part.as_str(tree));
    }
    pstrdup(tree, pool, &joined)
}

/// Concatenate `parts`.
pub fn pconcat(tree: &mut PoolTree, pool: PoolId, parts: &PoolVec<PoolStr>) -> PoolStr {
    pjoin(tree, pool, parts, "")
}

/// Split `s` on every occurrence of `sep`. Empty components are dropped.
pub fn pstrsplit(tree: &mut PoolTree, pool: PoolId, s: &str, sep: &str) -> PoolVec<PoolStr> {
    collect_parts(tree, pool, s.split(sep))
}

/// Split `s` on every occurrence of the character `sep`. Empty components
/// are dropped.
pub fn pstrcsplit(tree: &mut PoolTree, pool: PoolId, s: &str, sep: char) -> PoolVec<PoolStr> {
    collect_parts(tree, pool, s.split(sep))
}

/// Build a vector of strings from string slices.
pub fn pvector(tree: &mut PoolTree, pool: PoolId, parts: &[&str]) -> PoolVec<PoolStr> {
    let mut vec = PoolVec::with_capacity(tree, pool, parts.len());
    for part in parts {
        let s = pstrdup(tree, pool, part);
        vec.push(tree, &s);
    }
    vec
}

fn collect_parts<'a>(
    tree: &mut PoolTree,
    pool: PoolId,
    parts: impl Iterator<Item = &'a str>,
) -> PoolVec<PoolStr> {
    let mut vec = PoolVec::new(pool);
    for part in parts.filter(|part| !part.is_empty()) {
        let s = pstrdup(tree, pool, part);
        vec.push(tree, &s);
    }
    vec
}
