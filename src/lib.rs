//! This crate provides the persistent vector backing Tide's list values.
//!
//! [`Vector`] is a persistent vector (also known as a "bitmapped vector
//! trie") with a tail buffer: a bit-partitioned tree of `N`-wide nodes plus a
//! small dense buffer holding the newest elements. Operations that "mutate"
//! return a new vector sharing almost all structure with the old one, so the
//! evaluator can hand list values to closures and concurrent readers without
//! any locking, and old versions stay valid and unchanged.
//!
//! [`Slice`] windows a [`Vector`] over a sub-range of indices without copying.
//!
//! The same structure is implemented in [rpds](https://crates.io/crates/rpds),
//! but this implementation fits Tide's use better:
//! - interior nodes are stored inline rather than behind a double pointer
//!   indirection;
//! - the branching factor is a compile-time parameter, so index arithmetic is
//!   all shifts and masks;
//! - iteration keeps a cursor per tree level instead of re-descending from
//!   the root, and can start at an arbitrary index, which is what slicing
//!   needs.

// Not yet implemented (do we need them?)
// - deletion at arbitrary indices
// - mutable indexing

pub mod slice;
pub mod vector;

/// [`Vector`] takes a "branching factor" parameter, which must be a
/// reasonably-sized power of two. We use this trait to enforce that.
pub trait ValidBranchingConstant {}
pub struct Const<const N: usize> {}

impl ValidBranchingConstant for Const<2> {}
impl ValidBranchingConstant for Const<4> {}
impl ValidBranchingConstant for Const<8> {}
impl ValidBranchingConstant for Const<16> {}
impl ValidBranchingConstant for Const<32> {}
impl ValidBranchingConstant for Const<64> {}
impl ValidBranchingConstant for Const<128> {}

pub use slice::Slice;
pub use vector::{IntoIter, Iter, Vector};
