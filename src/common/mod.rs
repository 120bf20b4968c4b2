//! Common types and utilities shared across blocktree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`IndexOptions`](config::IndexOptions)
//! - Error types
//! - Identifiers and slot types (BlockId, Key, Value)

mod block_id;
pub mod config;
pub mod error;
mod value;

pub use block_id::BlockId;
pub use error::{Error, Result};
pub use value::Value;

/// Keys are unsigned 64-bit integers, ordered numerically.
pub type Key = u64;
