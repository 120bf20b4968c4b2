//! blocktree - a persistent B-tree index stored in a single file.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           blocktree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree)                   │   │
//! │  │   BTreeIndex: search · insert/split · traverse · verify  │   │
//! │  │   Node codec: one node ⇄ one block                       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     BlockStore + Block (512B, CRC32) + IndexHeader       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, Key, Value, Error, config)
//! - [`storage`] - Block I/O and the header format
//! - [`index`] - The B-tree engine
//!
//! # Quick Start
//! ```no_run
//! use blocktree::{BTreeIndex, Value};
//!
//! let mut index = BTreeIndex::create("t.idx")?;
//! index.insert(10, Value::try_from("a")?)?;
//! index.insert(5, Value::try_from("c")?)?;
//!
//! for pair in index.traverse() {
//!     let (key, value) = pair?;
//!     println!("{key},{value}");
//! }
//! # Ok::<(), blocktree::Error>(())
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexOptions, BLOCK_SIZE};
pub use common::{BlockId, Error, Key, Result, Value};

pub use index::btree::{BTreeIndex, BulkLoadReport, Traverse, TreeStats};
pub use storage::block::{Block, IndexHeader};
pub use storage::BlockStore;
