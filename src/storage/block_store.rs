//! Block Store - low-level file I/O for index blocks.
//!
//! The [`BlockStore`] handles all direct file operations:
//! - Reading and writing whole blocks
//! - Allocating new blocks at the end of the file
//! - Owning the index file handle

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::BLOCK_SIZE;
use crate::common::{BlockId, Error, Result};
use crate::storage::block::{Block, IndexHeader};

/// Manages block I/O for a single index file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │ Block 2 │  ...    │ Block N │
/// │ header  │ node    │ node    │         │ node    │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      512      1024    ...    N×512
/// ```
///
/// # Thread Safety
/// `BlockStore` is **single-threaded**; every method takes `&mut self`.
///
/// # Durability
/// With `sync_writes` enabled (the default) every write is followed by
/// `fsync()`.
pub struct BlockStore {
    file: File,
    /// Number of whole blocks in the file.
    block_count: u32,
    sync_writes: bool,
}

impl BlockStore {
    /// Create a new, empty index file.
    ///
    /// # Errors
    /// Returns `Error::FileExists` if the path already exists.
    pub fn create<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::FileExists(path.to_path_buf()),
                _ => Error::Io(e),
            })?;

        Ok(Self {
            file,
            block_count: 0,
            sync_writes,
        })
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns `Error::FileNotFound` if the path doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
                _ => Error::Io(e),
            })?;

        // A trailing partial block is ignored.
        let file_size = file.metadata()?.len();
        let block_count = u32::try_from(file_size / BLOCK_SIZE as u64).map_err(|_| {
            Error::CorruptIndex(format!("file of {file_size} bytes is too large"))
        })?;

        Ok(Self {
            file,
            block_count,
            sync_writes,
        })
    }

    /// Read a block from disk.
    ///
    /// # Errors
    /// Returns `Error::Io` with `UnexpectedEof` if the file is too short to
    /// contain the block.
    pub fn read_block(&mut self, block_id: BlockId) -> Result<Block> {
        if block_id.0 >= self.block_count {
            return Err(Error::Io(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!(
                    "{} is past the end of the file ({} blocks)",
                    block_id, self.block_count
                ),
            )));
        }

        self.file.seek(SeekFrom::Start(block_id.offset(BLOCK_SIZE)))?;

        let mut block = Block::new();
        self.file.read_exact(block.as_mut_slice())?;

        Ok(block)
    }

    /// Write a block to disk.
    ///
    /// The block must already exist in the file: either block 0 written by
    /// [`BlockStore::init_header`], or a block returned by
    /// [`BlockStore::allocate_block`].
    ///
    /// # Errors
    /// Returns `Error::UnallocatedBlock` if the block is past the end of file.
    pub fn write_block(&mut self, block_id: BlockId, block: &Block) -> Result<()> {
        if block_id.0 >= self.block_count {
            return Err(Error::UnallocatedBlock(block_id));
        }
        self.write_at(block_id, block)
    }

    /// Write block 0 of a freshly created file.
    pub fn init_header(&mut self, header: &IndexHeader) -> Result<()> {
        self.write_at(BlockId::HEADER, &header.encode())?;
        self.block_count = self.block_count.max(1);
        Ok(())
    }

    /// Write the header into block 0.
    pub fn write_header(&mut self, header: &IndexHeader) -> Result<()> {
        self.write_block(BlockId::HEADER, &header.encode())
    }

    /// Read and validate block 0.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` if the file has no header block or the
    /// header is invalid.
    pub fn read_header(&mut self) -> Result<IndexHeader> {
        if self.block_count == 0 {
            return Err(Error::CorruptIndex("file is shorter than one block".into()));
        }
        let header = IndexHeader::decode(&self.read_block(BlockId::HEADER)?)?;
        if header.next_free_block.0 > self.block_count {
            return Err(Error::CorruptIndex(format!(
                "next free block {} but file holds only {} blocks",
                header.next_free_block.0, self.block_count
            )));
        }
        Ok(header)
    }

    /// Allocate a new block.
    ///
    /// Takes `header.next_free_block`, extends the file with a zeroed block
    /// at that position and advances the counter. The caller persists the
    /// header.
    pub fn allocate_block(&mut self, header: &mut IndexHeader) -> Result<BlockId> {
        let block_id = header.next_free_block;
        let next = block_id
            .0
            .checked_add(1)
            .ok_or_else(|| Error::CorruptIndex("block numbers exhausted".into()))?;

        // Blocks past the counter may exist after an interrupted split;
        // they are unreferenced and get overwritten here.
        self.write_at(block_id, &Block::new())?;
        self.block_count = self.block_count.max(next);
        header.next_free_block = BlockId::new(next);

        tracing::debug!(block = block_id.0, "allocated block");
        Ok(block_id)
    }

    /// Flush OS buffers to the device.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of blocks in the file.
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Get the total size of the index file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        u64::from(self.block_count) * BLOCK_SIZE as u64
    }

    fn write_at(&mut self, block_id: BlockId, block: &Block) -> Result<()> {
        self.file.seek(SeekFrom::Start(block_id.offset(BLOCK_SIZE)))?;
        self.file.write_all(block.as_slice())?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
