//! Index header stored in block 0.
//!
//! The header records everything needed to interpret the rest of the file:
//! - magic tag and format version
//! - block size and tree order
//! - root block and the next block to allocate
//! - number of entries in the tree

use crate::common::config::{BLOCK_SIZE, FORMAT_VERSION, MAGIC, MAX_ORDER};
use crate::common::{BlockId, Error, Result};

use super::block::Block;

/// Metadata stored in block 0.
///
/// # Layout (little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     magic ("BTREEIDX")
/// 8       4     format_version
/// 12      4     block_size
/// 16      4     order (minimum degree)
/// 20      4     root_block (0 = empty tree)
/// 24      4     next_free_block
/// 28      8     entry_count
/// 36      472   zero
/// 508     4     CRC32
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Minimum degree of the tree.
    pub order: u32,
    /// Current root node, or `BlockId::NONE` for an empty tree.
    pub root_block: BlockId,
    /// Next block number handed out by the allocator.
    pub next_free_block: BlockId,
    /// Number of key-value pairs stored.
    pub entry_count: u64,
}

impl IndexHeader {
    pub const OFFSET_MAGIC: usize = 0;
    pub const OFFSET_VERSION: usize = 8;
    pub const OFFSET_BLOCK_SIZE: usize = 12;
    pub const OFFSET_ORDER: usize = 16;
    pub const OFFSET_ROOT: usize = 20;
    pub const OFFSET_NEXT_FREE: usize = 24;
    pub const OFFSET_ENTRY_COUNT: usize = 28;

    /// Header for a freshly created, empty index.
    pub fn new(order: u32) -> Self {
        Self {
            order,
            root_block: BlockId::NONE,
            next_free_block: BlockId::new(1),
            entry_count: 0,
        }
    }

    /// Encode into a sealed block image.
    pub fn encode(&self) -> Block {
        let mut block = Block::new();
        block.write_bytes(Self::OFFSET_MAGIC, &MAGIC);
        block.write_u32(Self::OFFSET_VERSION, FORMAT_VERSION);
        block.write_u32(Self::OFFSET_BLOCK_SIZE, BLOCK_SIZE as u32);
        block.write_u32(Self::OFFSET_ORDER, self.order);
        block.write_u32(Self::OFFSET_ROOT, self.root_block.0);
        block.write_u32(Self::OFFSET_NEXT_FREE, self.next_free_block.0);
        block.write_u64(Self::OFFSET_ENTRY_COUNT, self.entry_count);
        block.seal();
        block
    }

    /// Decode and validate a header block.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` if the magic, version, block size,
    /// checksum, order or block counters are invalid.
    pub fn decode(block: &Block) -> Result<Self> {
        if block.read_bytes(Self::OFFSET_MAGIC, MAGIC.len()) != MAGIC {
            return Err(Error::CorruptIndex("not an index file (bad magic)".into()));
        }
        if !block.verify_checksum() {
            return Err(Error::CorruptIndex("header checksum mismatch".into()));
        }

        let version = block.read_u32(Self::OFFSET_VERSION);
        if version != FORMAT_VERSION {
            return Err(Error::CorruptIndex(format!(
                "unsupported format version {version}"
            )));
        }

        let block_size = block.read_u32(Self::OFFSET_BLOCK_SIZE);
        if block_size as usize != BLOCK_SIZE {
            return Err(Error::CorruptIndex(format!(
                "block size {block_size}, expected {BLOCK_SIZE}"
            )));
        }

        let order = block.read_u32(Self::OFFSET_ORDER);
        if order == 0 || order as usize > MAX_ORDER {
            return Err(Error::CorruptIndex(format!("order {order} out of range")));
        }

        let header = Self {
            order,
            root_block: BlockId::new(block.read_u32(Self::OFFSET_ROOT)),
            next_free_block: BlockId::new(block.read_u32(Self::OFFSET_NEXT_FREE)),
            entry_count: block.read_u64(Self::OFFSET_ENTRY_COUNT),
        };

        if header.next_free_block.0 == 0 {
            return Err(Error::CorruptIndex("next free block is 0".into()));
        }
        if header.root_block >= header.next_free_block {
            return Err(Error::CorruptIndex(format!(
                "root {} is not below next free {}",
                header.root_block, header.next_free_block
            )));
        }
        if header.root_block.is_none() && header.entry_count != 0 {
            return Err(Error::CorruptIndex(format!(
                "empty tree claims {} entries",
                header.entry_count
            )));
        }

        Ok(header)
    }
}

// ============================================================================
// TESTS
// ============================================================================
