//! Growable vectors whose storage lives in a pool.

use std::fmt;
use std::marker::PhantomData;

use pooltree_memory::{Block, PoolId, PoolTree};
use tracing::trace;

use crate::element::{DeepCopy, Element};

/// Smallest capacity a vector grows to on its first push.
const MIN_CAPACITY: usize = 4;

/// A vector of `T` stored in one pool block.
///
/// The descriptor (pool, storage handle, length) lives wherever the caller
/// keeps it; the elements live in the pool. Growth goes through `prealloc`,
/// so extending the most recently allocated vector of a pool is done in
/// place. Deleting the pool invalidates the vector.
pub struct PoolVec<T: Element> {
    pool: PoolId,
    storage: Option<Block>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> fmt::Debug for PoolVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolVec")
            .field("pool", &self.pool)
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T: Element> PoolVec<T> {
    /// An empty vector. Nothing is allocated until the first push.
    #[must_use]
    pub fn new(pool: PoolId) -> Self {
        Self {
            pool,
            storage: None,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// An empty vector with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(tree: &mut PoolTree, pool: PoolId, capacity: usize) -> Self {
        let mut vec = Self::new(pool);
        vec.reserve(tree, capacity);
        vec
    }

    /// Build a vector from a slice of values.
    #[must_use]
    pub fn from_slice(tree: &mut PoolTree, pool: PoolId, values: &[T]) -> Self {
        let mut vec = Self::with_capacity(tree, pool, values.len());
        for value in values {
            vec.push(tree, value);
        }
        vec
    }

    /// Pool holding the elements.
    #[must_use]
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements that fit without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.map_or(0, |block| block.len() / T::SIZE)
    }

    /// Make room for at least `additional` more elements.
    pub fn reserve(&mut self, tree: &mut PoolTree, additional: usize) {
        let Some(needed) = self.len.checked_add(additional) else {
            panic!("PoolVec capacity overflow");
        };
        if needed <= self.capacity() {
            return;
        }
        let capacity = needed.max(self.capacity() * 2).max(MIN_CAPACITY);
        let Some(bytes) = capacity.checked_mul(T::SIZE) else {
            panic!("PoolVec capacity overflow");
        };
        let block = tree.prealloc(self.pool, self.storage, bytes);
        trace!(pool = %self.pool, from = self.capacity(), to = capacity, "Grew vector");
        self.storage = Some(block);
    }

    /// Append `value`.
    pub fn push(&mut self, tree: &mut PoolTree, value: &T) {
        self.reserve(tree, 1);
        let index = self.len;
        self.len += 1;
        self.write(tree, index, value);
    }

    /// Remove and return the last element.
    pub fn pop(&mut self, tree: &PoolTree) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.read(tree, self.len))
    }

    /// Element at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, tree: &PoolTree, index: usize) -> Option<T> {
        (index < self.len).then(|| self.read(tree, index))
    }

    /// Overwrite the element at `index`. Panics if out of bounds.
    #[track_caller]
    pub fn set(&self, tree: &mut PoolTree, index: usize, value: &T) {
        assert!(
            index < self.len,
            "index {index} out of bounds for PoolVec of length {}",
            self.len
        );
        self.write(tree, index, value);
    }

    /// Insert `value` at `index`, shifting later elements up. Panics if
    /// `index > len`.
    #[track_caller]
    pub fn insert(&mut self, tree: &mut PoolTree, index: usize, value: &T) {
        assert!(
            index <= self.len,
            "insertion index {index} out of bounds for PoolVec of length {}",
            self.len
        );
        self.reserve(tree, 1);
        if let Some(block) = self.storage {
            let bytes = tree.bytes_mut(block);
            bytes.copy_within(index * T::SIZE..self.len * T::SIZE, (index + 1) * T::SIZE);
        }
        self.len += 1;
        self.write(tree, index, value);
    }

    /// Remove the element at `index`, shifting later elements down.
    #[track_caller]
    pub fn remove(&mut self, tree: &mut PoolTree, index: usize) -> T {
        assert!(
            index < self.len,
            "removal index {index} out of bounds for PoolVec of length {}",
            self.len
        );
        let value = self.read(tree, index);
        if let Some(block) = self.storage {
            let bytes = tree.bytes_mut(block);
            bytes.copy_within((index + 1) * T::SIZE..self.len * T::SIZE, index * T::SIZE);
        }
        self.len -= 1;
        value
    }

    /// Forget all elements. Capacity is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append every value yielded by `values`.
    pub fn extend<I>(&mut self, tree: &mut PoolTree, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let values = values.into_iter();
        self.reserve(tree, values.size_hint().0);
        for value in values {
            self.push(tree, &value);
        }
    }

    /// Iterate over the elements in order.
    pub fn iter<'t>(&self, tree: &'t PoolTree) -> Iter<'t, T> {
        Iter {
            tree,
            storage: self.storage,
            next: 0,
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Copy the elements out of the pool.
    #[must_use]
    pub fn to_vec(&self, tree: &PoolTree) -> Vec<T> {
        self.iter(tree).collect()
    }

    /// True if both vectors hold equal elements in the same order.
    #[must_use]
    pub fn compare(&self, other: &Self, tree: &PoolTree) -> bool
    where
        T: PartialEq,
    {
        self.len == other.len && self.iter(tree).eq(other.iter(tree))
    }

    /// Sort in place by `compare`.
    pub fn sort_by<F>(&self, tree: &mut PoolTree, compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        let mut values = self.to_vec(tree);
        values.sort_by(compare);
        for (index, value) in values.iter().enumerate() {
            self.write(tree, index, value);
        }
    }

    fn slot(index: usize) -> std::ops::Range<usize> {
        index * T::SIZE..(index + 1) * T::SIZE
    }

    fn read(&self, tree: &PoolTree, index: usize) -> T {
        let block = self.storage.unwrap_or_else(|| unreachable!("non-empty vector has storage"));
        T::read_le(&tree.bytes(block)[Self::slot(index)])
    }

    fn write(&self, tree: &mut PoolTree, index: usize, value: &T) {
        let block = self.storage.unwrap_or_else(|| unreachable!("non-empty vector has storage"));
        value.write_le(&mut tree.bytes_mut(block)[Self::slot(index)]);
    }
}

/// Copies the storage and deep-copies every element into `dest`.
impl<T: Element + DeepCopy> DeepCopy for PoolVec<T> {
    fn copy_into(&self, tree: &mut PoolTree, dest: PoolId) -> Self {
        let mut copy = Self::with_capacity(tree, dest, self.len);
        for index in 0..self.len {
            let value = self.read(tree, index).copy_into(tree, dest);
            copy.push(tree, &value);
        }
        copy
    }
}

/// Iterator returned by [`PoolVec::iter`].
pub struct Iter<'t, T> {
    tree: &'t PoolTree,
    storage: Option<Block>,
    next: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.next >= self.len {
            return None;
        }
        let block = self.storage?;
        let start = self.next * T::SIZE;
        self.next += 1;
        Some(T::read_le(&self.tree.bytes(block)[start..start + T::SIZE]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.next;
        (left, Some(left))
    }
}

impl<T: Element> ExactSizeIterator for Iter<'_, T> {}
