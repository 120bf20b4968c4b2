//! Configuration constants and open options for blocktree.

/// Size of a block in bytes.
///
/// Every read and write against the index file moves exactly one block.
/// Block `N` lives at byte offset `N × BLOCK_SIZE`.
pub const BLOCK_SIZE: usize = 512;

/// Magic tag at the start of block 0 identifying an index file.
pub const MAGIC: [u8; 8] = *b"BTREEIDX";

/// On-disk format version.
///
/// Version 1 pins `u64` keys and [`VALUE_SIZE`]-byte value slots.
pub const FORMAT_VERSION: u32 = 1;

/// Largest minimum degree whose full node still fits in one block.
pub const MAX_ORDER: usize = 8;

/// Key slots reserved in every node block (`2 × MAX_ORDER`).
pub const MAX_KEYS: usize = 2 * MAX_ORDER;

/// Child slots reserved in every node block.
pub const MAX_CHILDREN: usize = MAX_KEYS + 1;

/// Minimum degree used when none is given.
pub const DEFAULT_ORDER: usize = 4;

/// Width of a value slot: one length byte plus payload.
pub const VALUE_SIZE: usize = 16;

/// Longest value payload that fits in a slot.
pub const MAX_VALUE_LEN: usize = VALUE_SIZE - 1;

/// Options used when creating or opening an index.
///
/// # Example
/// ```
/// use blocktree::IndexOptions;
///
/// let opts = IndexOptions::new().order(2).sync_writes(false);
/// assert_eq!(opts.order, 2);
/// assert!(!opts.sync_writes);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Minimum degree for a newly created tree. Ignored on open: the order
    /// recorded in the file header wins.
    pub order: usize,
    /// Call `fsync` after every block write.
    pub sync_writes: bool,
}

impl IndexOptions {
    /// Default options: order [`DEFAULT_ORDER`], synchronous writes.
    pub fn new() -> Self {
        Self {
            order: DEFAULT_ORDER,
            sync_writes: true,
        }
    }

    /// Set the minimum degree.
    pub fn order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Enable or disable `fsync` after each write.
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_is_power_of_two() {
        assert!(BLOCK_SIZE.is_power_of_two());
        assert_eq!(BLOCK_SIZE, 512);
    }

    #[test]
    fn test_slot_arithmetic() {
        assert_eq!(MAX_KEYS, 16);
        assert_eq!(MAX_CHILDREN, 17);
        assert_eq!(MAX_VALUE_LEN, 15);
    }

    #[test]
    fn test_default_options() {
        let opts = IndexOptions::default();
        assert_eq!(opts.order, DEFAULT_ORDER);
        assert!(opts.sync_writes);
    }
}
