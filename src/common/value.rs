//! Fixed-width value slot.

use std::fmt;

use crate::common::config::{MAX_VALUE_LEN, VALUE_SIZE};
use crate::common::{Error, Result};

/// A value stored alongside a key.
///
/// Values occupy a fixed [`VALUE_SIZE`]-byte slot on disk: one length byte
/// followed by up to [`MAX_VALUE_LEN`] payload bytes, zero padded.
///
/// # Example
/// ```
/// use blocktree::Value;
///
/// let v = Value::try_from("hello").unwrap();
/// assert_eq!(v.as_bytes(), b"hello");
/// assert!(Value::try_from("a value that is far too long").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Value {
    slot: [u8; VALUE_SIZE],
}

impl Value {
    /// Build a value from raw bytes.
    ///
    /// # Errors
    /// Returns `Error::ValueTooLong` if `bytes` exceeds [`MAX_VALUE_LEN`].
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_VALUE_LEN {
            return Err(Error::ValueTooLong {
                len: bytes.len(),
                max: MAX_VALUE_LEN,
            });
        }
        let mut slot = [0u8; VALUE_SIZE];
        slot[0] = bytes.len() as u8;
        slot[1..=bytes.len()].copy_from_slice(bytes);
        Ok(Self { slot })
    }

    /// Rebuild a value from its on-disk slot.
    ///
    /// Returns `None` if the length byte is out of range or the padding is
    /// not zero.
    pub fn from_slot(slot: &[u8; VALUE_SIZE]) -> Option<Self> {
        let len = slot[0] as usize;
        if len > MAX_VALUE_LEN || slot[1 + len..].iter().any(|&b| b != 0) {
            return None;
        }
        Some(Self { slot: *slot })
    }

    /// The on-disk slot image.
    #[inline]
    pub fn as_slot(&self) -> &[u8; VALUE_SIZE] {
        &self.slot
    }

    /// The payload bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.slot[1..=self.len()]
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.slot[0] as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<&[u8]> for Value {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Value::new(bytes)
    }
}

impl TryFrom<&str> for Value {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Value::new(s.as_bytes())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}
