//! Allocator sizing constants.

/// Default capacity (in bytes) of a shared chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Smallest chunk capacity accepted by [`PoolConfig::normalize`](crate::config::PoolConfig::normalize).
pub const MIN_CHUNK_SIZE: usize = 64;

/// Largest shared chunk; offsets inside a chunk are stored as `u32`.
pub const MAX_CHUNK_SIZE: usize = u32::MAX as usize;

/// An unset large-allocation threshold becomes `chunk_size / LARGE_ALLOC_DIVISOR`.
///
/// A quarter of the chunk keeps a single large request from stranding most
/// of a shared chunk as slack.
pub const LARGE_ALLOC_DIVISOR: usize = 4;

/// Bytes reserved for a zero-length request, so the block stays distinct.
pub const ZERO_LENGTH_RESERVATION: usize = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_fits_in_chunk() {
        assert!(DEFAULT_CHUNK_SIZE / LARGE_ALLOC_DIVISOR < DEFAULT_CHUNK_SIZE);
        assert!(MIN_CHUNK_SIZE <= DEFAULT_CHUNK_SIZE);
    }
}
