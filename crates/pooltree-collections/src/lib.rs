//! # pooltree-collections
//!
//! Vectors and strings whose contents live in `pooltree-memory` pools.
//!
//! Every container takes the tree and pool explicitly. Anything that lives in
//! a pool can be copied into another pool with [`DeepCopy`], after which the
//! source pool may be deleted without affecting the copy.
//!
//! ```
//! use pooltree_collections::{pjoin, pstrsplit, DeepCopy};
//! use pooltree_memory::PoolTree;
//!
//! let mut tree = PoolTree::new();
//! let scratch = tree.new_pool();
//! let keep = tree.new_pool();
//!
//! let words = pstrsplit(&mut tree, scratch, "--one--two", "--");
//! let words = words.copy_into(&mut tree, keep);
//! tree.delete_pool(scratch);
//!
//! let joined = pjoin(&mut tree, keep, &words, ",");
//! assert_eq!(joined.as_str(&tree), "one,two");
//! ```
#![warn(missing_docs)]

pub mod element;
pub mod string;
pub mod vector;

pub use element::{DeepCopy, Element};
pub use string::{
    pchrs, pconcat, pjoin, pmemdup, psprintf, pstrcsplit, pstrdup, pstrndup, pstrs, pstrsplit,
    pvector, PoolStr,
};
pub use vector::{Iter, PoolVec};
