//! Storage layer - block I/O and block formats.
//!
//! This module handles persistent storage:
//! - [`BlockStore`] - Low-level file I/O
//! - [`block`] - Block image and header layout

pub mod block;
mod block_store;

pub use block_store::BlockStore;
