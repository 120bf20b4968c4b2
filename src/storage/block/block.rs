//! Block - the fixed 512-byte unit of storage.
//!
//! A [`Block`] is a raw byte array that serves as the unit of I/O between
//! the index file and memory. Headers and nodes are encoded into blocks and
//! decoded out of them; nothing is ever read or written in partial blocks.

use crate::common::config::BLOCK_SIZE;

/// One block of data (512 bytes).
///
/// # Layout
/// The last four bytes of every written block hold a CRC32 over the whole
/// block with those four bytes zeroed:
/// ```text
/// ┌──────────────────────────────────────────────┬──────────┐
/// │ payload (header or node), zero padded        │  CRC32   │
/// │ bytes 0..508                                 │ 508..512 │
/// └──────────────────────────────────────────────┴──────────┘
/// ```
///
/// # Clone Implementation
/// `Block` does NOT implement `Clone` outside tests, so every copy of a
/// block image is explicit.
///
/// # Example
/// ```
/// use blocktree::storage::block::Block;
///
/// let mut block = Block::new();
/// block.as_mut_slice()[0] = 0xFF;
/// block.seal();
/// assert!(block.verify_checksum());
/// ```
#[repr(align(512))]
pub struct Block {
    data: [u8; BLOCK_SIZE],
}

impl Block {
    /// Offset of the CRC32 trailer.
    pub const OFFSET_CHECKSUM: usize = BLOCK_SIZE - 4;

    /// Bytes available to the header or node encoding.
    pub const PAYLOAD_SIZE: usize = Self::OFFSET_CHECKSUM;

    /// Create a new zeroed block.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; BLOCK_SIZE],
        }
    }

    /// Get immutable slice of block data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of block data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_le_bytes(buf)
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Compute the CRC32 of the block with the checksum trailer zeroed.
    pub fn compute_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.finalize()
    }

    /// Checksum currently stored in the trailer.
    pub fn stored_checksum(&self) -> u32 {
        self.read_u32(Self::OFFSET_CHECKSUM)
    }

    /// Compute and store the checksum.
    ///
    /// Call this after all modifications to the block are complete.
    pub fn seal(&mut self) {
        let checksum = self.compute_checksum();
        self.write_u32(Self::OFFSET_CHECKSUM, checksum);
    }

    /// Verify the stored checksum matches the contents.
    pub fn verify_checksum(&self) -> bool {
        self.stored_checksum() == self.compute_checksum()
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Block {
    fn clone(&self) -> Self {
        let mut new_block = Block::new();
        new_block.data.copy_from_slice(&self.data);
        new_block
    }
}

// ============================================================================
// TESTS
// ============================================================================
