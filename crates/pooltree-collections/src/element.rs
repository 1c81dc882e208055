//! Values that can be stored inside pool memory, and the deep-copy contract.

use pooltree_memory::{Block, PoolId, PoolTree};

/// A value with a fixed-size little-endian encoding.
///
/// Containers store elements as raw bytes in pool blocks, so anything that
/// points at other pool memory is stored as a [`Block`] handle.
pub trait Element: Sized {
    /// Encoded size in bytes. Never zero.
    const SIZE: usize;

    /// Encode into `out`, which is exactly [`Self::SIZE`] bytes long.
    fn write_le(&self, out: &mut [u8]);

    /// Decode from `bytes`, which is exactly [`Self::SIZE`] bytes long.
    fn read_le(bytes: &[u8]) -> Self;
}

/// Copy a value into another pool.
///
/// The copy must not share any pool memory with the original: every block
/// reachable from `self` is re-allocated in `dest`, so deleting the source
/// pool leaves the copy intact.
pub trait DeepCopy: Sized {
    /// Re-create `self` with all of its memory allocated from `dest`.
    #[must_use]
    fn copy_into(&self, tree: &mut PoolTree, dest: PoolId) -> Self;
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

macro_rules! plain_element {
    ($($ty:ty),* $(,)?) => {$(
        impl Element for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn write_le(&self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                <$ty>::from_le_bytes(array(bytes))
            }
        }

        impl DeepCopy for $ty {
            fn copy_into(&self, _tree: &mut PoolTree, _dest: PoolId) -> Self {
                *self
            }
        }
    )*};
}

plain_element!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Element for usize {
    const SIZE: usize = 8;

    fn write_le(&self, out: &mut [u8]) {
        out.copy_from_slice(&(*self as u64).to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let wide = u64::from_le_bytes(array(bytes));
        usize::try_from(wide).unwrap_or_else(|_| panic!("{wide} does not fit in usize"))
    }
}

impl DeepCopy for usize {
    fn copy_into(&self, _tree: &mut PoolTree, _dest: PoolId) -> Self {
        *self
    }
}

impl Element for bool {
    const SIZE: usize = 1;

    fn write_le(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl DeepCopy for bool {
    fn copy_into(&self, _tree: &mut PoolTree, _dest: PoolId) -> Self {
        *self
    }
}

impl Element for Block {
    const SIZE: usize = Block::ENCODED_LEN;

    fn write_le(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        Block::from_le_bytes(array(bytes))
            .unwrap_or_else(|| panic!("stored block handle does not fit this platform"))
    }
}

/// A block's bytes are its whole content, so copying it is a `pmemdup`.
impl DeepCopy for Block {
    fn copy_into(&self, tree: &mut PoolTree, dest: PoolId) -> Self {
        let data = tree.bytes(*self).to_vec();
        crate::string::pmemdup(tree, dest, &data)
    }
}
