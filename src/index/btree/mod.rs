//! B-tree index implementation.
//!
//! - [`Node`] - One node per block, with its encode/decode codec
//! - [`BTreeIndex`] - Search, insert with split, bulk load
//! - [`Traverse`] - Lazy in-order iterator
//! - [`TreeStats`] - Result of a whole-tree [`BTreeIndex::verify`]

mod iter;
mod node;
mod tree;
mod verify;

pub use iter::Traverse;
pub use node::{Node, NodeKind};
pub use tree::{BTreeIndex, BulkLoadReport};
pub use verify::TreeStats;
