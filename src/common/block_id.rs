//! Block identifier type.

use std::fmt;

/// Identifies a block in the index file.
///
/// Block 0 always holds the index header, so it can never be a node. That
/// makes `BlockId(0)` a safe sentinel for "no block": an empty root, the
/// parent of the root, or an unused child slot.
///
/// # Example
/// ```
/// use blocktree::BlockId;
///
/// let id = BlockId::new(7);
/// assert!(id.is_some());
/// assert!(BlockId::NONE.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Sentinel meaning "no block".
    pub const NONE: BlockId = BlockId(0);

    /// The header block.
    pub const HEADER: BlockId = BlockId(0);

    /// Create a new BlockId.
    #[inline]
    pub fn new(id: u32) -> Self {
        BlockId(id)
    }

    /// True unless this is the sentinel.
    #[inline]
    pub fn is_some(&self) -> bool {
        *self != Self::NONE
    }

    /// True for the sentinel.
    #[inline]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Byte offset of this block within the file.
    #[inline]
    pub fn offset(&self, block_size: usize) -> u64 {
        u64::from(self.0) * block_size as u64
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_new() {
        let id = BlockId::new(42);
        assert_eq!(id.0, 42);
        assert!(id.is_some());
    }

    #[test]
    fn test_block_id_sentinel() {
        assert!(BlockId::NONE.is_none());
        assert_eq!(BlockId::NONE, BlockId::HEADER);
    }

    #[test]
    fn test_block_id_offset() {
        assert_eq!(BlockId::new(0).offset(512), 0);
        assert_eq!(BlockId::new(3).offset(512), 1536);
    }

    #[test]
    fn test_block_id_display() {
        assert_eq!(format!("{}", BlockId::new(42)), "Block(42)");
    }
}
