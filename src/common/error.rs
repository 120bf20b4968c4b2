//! Error types for blocktree.

use std::path::PathBuf;

use thiserror::Error;

use crate::common::{BlockId, Key};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors an index operation can surface.
///
/// Corruption and I/O failures abort the current operation and are returned
/// unchanged. [`Error::DuplicateKey`] is an expected outcome the caller handles
/// per call; a search miss is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying file, including short reads.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `create` was called on a path that already exists.
    #[error("index file {} already exists", .0.display())]
    FileExists(PathBuf),

    /// `open` was called on a path that does not exist.
    #[error("index file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The header block is not a valid index header.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A node block violates the node format or tree invariants.
    #[error("corrupt node at {block}: {reason}")]
    CorruptNode { block: BlockId, reason: String },

    /// The key is already present.
    #[error("duplicate key {0}")]
    DuplicateKey(Key),

    /// The value payload does not fit in a value slot.
    #[error("value is {len} bytes, at most {max} allowed")]
    ValueTooLong { len: usize, max: usize },

    /// The requested minimum degree is outside the supported range.
    #[error("invalid order {0}")]
    InvalidOrder(usize),

    /// Write to a block that was never allocated.
    ///
    /// This indicates a bug - every write target comes from `allocate_block`.
    #[error("{0} has not been allocated")]
    UnallocatedBlock(BlockId),
}

impl Error {
    pub(crate) fn corrupt_node(block: BlockId, reason: impl Into<String>) -> Self {
        Error::CorruptNode {
            block,
            reason: reason.into(),
        }
    }
}
