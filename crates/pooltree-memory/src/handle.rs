//! Copyable handles into a [`PoolTree`](crate::tree::PoolTree).
//!
//! Handles carry the generation of the pool slot they were issued from, so a
//! handle that outlives its pool is recognized even after the slot is reused.

use std::fmt;

/// Names one pool in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl PoolId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}.{}", self.index, self.generation)
    }
}

/// A region returned by `pmalloc`, `pcalloc` or `prealloc`.
///
/// Two live blocks never overlap. The region stays valid until its pool (or
/// an ancestor) is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub(crate) pool: PoolId,
    pub(crate) chunk: u32,
    pub(crate) offset: u32,
    pub(crate) len: usize,
}

impl Block {
    /// Size of [`Block::to_le_bytes`] output.
    pub const ENCODED_LEN: usize = 4 + 4 + 4 + 4 + 8;

    /// Pool that owns this block.
    #[must_use]
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for zero-length blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes this block occupies in its chunk.
    pub(crate) fn reserved(&self) -> usize {
        reservation(self.len)
    }

    pub(crate) fn start(&self) -> usize {
        self.offset as usize
    }

    pub(crate) fn end(&self) -> usize {
        self.start() + self.len
    }

    /// Fixed-width little-endian encoding, so containers can store handles
    /// inside pool memory.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..4].copy_from_slice(&self.pool.index.to_le_bytes());
        out[4..8].copy_from_slice(&self.pool.generation.to_le_bytes());
        out[8..12].copy_from_slice(&self.chunk.to_le_bytes());
        out[12..16].copy_from_slice(&self.offset.to_le_bytes());
        out[16..24].copy_from_slice(&(self.len as u64).to_le_bytes());
        out
    }

    /// Inverse of [`Block::to_le_bytes`]. Returns `None` if the length does
    /// not fit in `usize`.
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Option<Self> {
        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[16..24]);
        Some(Self {
            pool: PoolId::new(word(0), word(4)),
            chunk: word(8),
            offset: word(12),
            len: usize::try_from(u64::from_le_bytes(len)).ok()?,
        })
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block[{} chunk {} @{}+{}]",
            self.pool, self.chunk, self.offset, self.len
        )
    }
}

/// Names a value handed to a pool with `register_owned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub(crate) pool: PoolId,
    pub(crate) entry: usize,
}

impl ResourceId {
    /// Pool that owns the value.
    #[must_use]
    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{} of {}", self.entry, self.pool)
    }
}

/// Bytes a request of `len` occupies in a chunk.
pub(crate) fn reservation(len: usize) -> usize {
    len.max(crate::constants::ZERO_LENGTH_RESERVATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_encoding_roundtrip() {
        let block = Block {
            pool: PoolId::new(7, 3),
            chunk: 2,
            offset: 4096,
            len: 123,
        };
        assert_eq!(Block::from_le_bytes(block.to_le_bytes()), Some(block));
    }

    #[test]
    fn zero_length_still_reserves() {
        let block = Block {
            pool: PoolId::new(0, 0),
            chunk: 0,
            offset: 10,
            len: 0,
        };
        assert!(block.is_empty());
        assert_eq!(block.reserved(), 1);
        assert_eq!(block.end(), 10);
    }

    #[test]
    fn display_names_pool() {
        assert_eq!(PoolId::new(4, 1).to_string(), "pool#4.1");
    }
}
