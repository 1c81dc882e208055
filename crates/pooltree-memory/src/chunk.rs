//! Raw backing buffers for bump allocation.

/// One contiguous buffer owned by a single pool.
///
/// `used` is the bump cursor: bytes `[0, used)` have been handed out, bytes
/// `[used, capacity)` are free.
pub(crate) struct Chunk {
    buf: Box<[u8]>,
    used: usize,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("capacity", &self.capacity())
            .field("used", &self.used)
            .finish()
    }
}

impl Chunk {
    /// Obtain a zeroed buffer of `capacity` bytes from the global allocator.
    ///
    /// Exhaustion aborts the process (`handle_alloc_error`).
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn remaining(&self) -> usize {
        self.capacity() - self.used
    }

    /// Carve `reserve` bytes off the front of the free space, returning the
    /// offset of the carved region.
    pub(crate) fn bump(&mut self, reserve: usize) -> Option<usize> {
        if reserve > self.remaining() {
            return None;
        }
        let offset = self.used;
        self.used += reserve;
        Some(offset)
    }

    /// True if the region starting at `offset` and occupying `reserved`
    /// bytes is the last one carved.
    pub(crate) fn is_tail(&self, offset: usize, reserved: usize) -> bool {
        offset + reserved == self.used
    }

    /// Move the cursor so the tail region starting at `offset` occupies
    /// `reserve` bytes. Fails if the chunk is too small.
    pub(crate) fn resize_tail(&mut self, offset: usize, reserve: usize) -> bool {
        match offset.checked_add(reserve) {
            Some(end) if end <= self.capacity() => {
                self.used = end;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> Option<&[u8]> {
        self.buf.get(start..end)
    }

    pub(crate) fn slice_mut(&mut self, start: usize, end: usize) -> Option<&mut [u8]> {
        self.buf.get_mut(start..end)
    }

    pub(crate) fn copy_within(&mut self, src: std::ops::Range<usize>, dest: usize) {
        self.buf.copy_within(src, dest);
    }
}

/// Copy `len` bytes between two regions that may live in different chunks.
pub(crate) fn copy_region(
    chunks: &mut [Chunk],
    (src_chunk, src_start): (usize, usize),
    (dst_chunk, dst_start): (usize, usize),
    len: usize,
) {
    if len == 0 {
        return;
    }
    if src_chunk == dst_chunk {
        chunks[src_chunk].copy_within(src_start..src_start + len, dst_start);
        return;
    }
    let (src, dst) = if src_chunk < dst_chunk {
        let (lo, hi) = chunks.split_at_mut(dst_chunk);
        (&lo[src_chunk], &mut hi[0])
    } else {
        let (lo, hi) = chunks.split_at_mut(src_chunk);
        (&hi[0], &mut lo[dst_chunk])
    };
    dst.buf[dst_start..dst_start + len].copy_from_slice(&src.buf[src_start..src_start + len]);
}
