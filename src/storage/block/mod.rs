//! Block types and layout.
//!
//! This module contains:
//! - [`Block`] - The raw 512-byte data container
//! - [`IndexHeader`] - Metadata stored in block 0

#[allow(clippy::module_inception)]
mod block;
mod header;

pub use block::Block;
pub use header::IndexHeader;
