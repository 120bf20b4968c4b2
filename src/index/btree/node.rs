//! B-tree node and its block codec.

use crate::common::config::{MAX_CHILDREN, MAX_KEYS, VALUE_SIZE};
use crate::common::{BlockId, Error, Key, Result, Value};
use crate::storage::block::Block;

/// Discriminates leaf and internal nodes on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf = 1,
    Internal = 2,
}

impl NodeKind {
    /// Convert from u8, returning `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeKind::Leaf),
            2 => Some(NodeKind::Internal),
            _ => None,
        }
    }
}

/// A B-tree node, decoded from exactly one block.
///
/// Nodes are plain values: the engine decodes a fresh copy on every access,
/// mutates it and writes it back explicitly. While a split is pending a node
/// may briefly hold one key more than the on-disk maximum; it is never
/// encoded in that state.
///
/// # Layout (little-endian)
/// ```text
/// Offset  Size    Field
/// ------  ------  -----
/// 0       1       kind (1 = leaf, 2 = internal)
/// 1       1       reserved
/// 2       2       key_count
/// 4       4       block_number
/// 8       4       parent_block (0 for the root)
/// 12      16×8    keys
/// 140     16×16   values
/// 396     17×4    children
/// 464     44      zero
/// 508     4       CRC32
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub block: BlockId,
    pub parent: BlockId,
    pub kind: NodeKind,
    pub keys: Vec<Key>,
    pub values: Vec<Value>,
    /// Empty for leaves, `keys.len() + 1` entries for internal nodes.
    pub children: Vec<BlockId>,
}

impl Node {
    pub const OFFSET_KIND: usize = 0;
    pub const OFFSET_KEY_COUNT: usize = 2;
    pub const OFFSET_BLOCK: usize = 4;
    pub const OFFSET_PARENT: usize = 8;
    pub const OFFSET_KEYS: usize = 12;
    pub const OFFSET_VALUES: usize = Self::OFFSET_KEYS + MAX_KEYS * 8;
    pub const OFFSET_CHILDREN: usize = Self::OFFSET_VALUES + MAX_KEYS * VALUE_SIZE;
    pub const END: usize = Self::OFFSET_CHILDREN + MAX_CHILDREN * 4;

    /// Create an empty leaf.
    pub fn leaf(block: BlockId, parent: BlockId) -> Self {
        Self {
            block,
            parent,
            kind: NodeKind::Leaf,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an internal node holding a single separator.
    pub fn internal(block: BlockId, key: Key, value: Value, left: BlockId, right: BlockId) -> Self {
        Self {
            block,
            parent: BlockId::NONE,
            kind: NodeKind::Internal,
            keys: vec![key],
            values: vec![value],
            children: vec![left, right],
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Locate `key` within this node.
    ///
    /// `Ok(i)` if `keys[i] == key`, otherwise `Err(i)` where `i` is the number
    /// of keys less than `key` (the insertion point, and the child to
    /// descend into).
    #[inline]
    pub fn find(&self, key: Key) -> std::result::Result<usize, usize> {
        self.keys.binary_search(&key)
    }

    /// Insert a key-value pair at `index` in a leaf.
    pub fn insert_entry(&mut self, index: usize, key: Key, value: Value) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    /// Insert a promoted separator at `index` with its right-hand child.
    pub fn insert_separator(&mut self, index: usize, key: Key, value: Value, right: BlockId) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
        self.children.insert(index + 1, right);
    }

    /// Split an overfull node around `keys[order]`.
    ///
    /// `self` keeps the lower `order` keys (and `order + 1` children); the
    /// upper keys move into a new node at `right_block` with the same parent.
    /// Returns the promoted median and the new right sibling.
    pub fn split(&mut self, order: usize, right_block: BlockId) -> (Key, Value, Node) {
        debug_assert_eq!(self.keys.len(), 2 * order + 1);

        let right_keys = self.keys.split_off(order + 1);
        let right_values = self.values.split_off(order + 1);
        let right_children = if self.is_leaf() {
            Vec::new()
        } else {
            self.children.split_off(order + 1)
        };

        // Remaining tail element is the median.
        let median_key = self.keys.pop().unwrap_or_default();
        let median_value = self.values.pop().unwrap_or_default();

        let right = Node {
            block: right_block,
            parent: self.parent,
            kind: self.kind,
            keys: right_keys,
            values: right_values,
            children: right_children,
        };

        (median_key, median_value, right)
    }

    /// Encode into a sealed block image.
    ///
    /// # Panics
    /// Panics if the node holds more than `MAX_KEYS` keys. The engine splits
    /// overfull nodes before writing them.
    pub fn encode(&self) -> Block {
        assert!(self.keys.len() <= MAX_KEYS, "node overflow at encode");
        debug_assert_eq!(self.keys.len(), self.values.len());

        let mut block = Block::new();
        block.write_u8(Self::OFFSET_KIND, self.kind as u8);
        block.write_u16(Self::OFFSET_KEY_COUNT, self.keys.len() as u16);
        block.write_u32(Self::OFFSET_BLOCK, self.block.0);
        block.write_u32(Self::OFFSET_PARENT, self.parent.0);

        for (i, key) in self.keys.iter().enumerate() {
            block.write_u64(Self::OFFSET_KEYS + i * 8, *key);
        }
        for (i, value) in self.values.iter().enumerate() {
            block.write_bytes(Self::OFFSET_VALUES + i * VALUE_SIZE, value.as_slot());
        }
        for (i, child) in self.children.iter().enumerate() {
            block.write_u32(Self::OFFSET_CHILDREN + i * 4, child.0);
        }

        block.seal();
        block
    }

    /// Decode and validate a node block read from `expected`.
    ///
    /// # Errors
    /// Returns `Error::CorruptNode` if the checksum fails, the kind is
    /// unknown, the self-reported block number differs from `expected`, the
    /// key count exceeds `2 × order`, keys are not strictly ascending, a value
    /// slot is malformed, or child pointers don't match the node kind.
    pub fn decode(block: &Block, expected: BlockId, order: usize) -> Result<Self> {
        let corrupt = |reason: String| Error::corrupt_node(expected, reason);

        if !block.verify_checksum() {
            return Err(corrupt("checksum mismatch".into()));
        }

        let kind_byte = block.read_u8(Self::OFFSET_KIND);
        let kind = NodeKind::from_u8(kind_byte)
            .ok_or_else(|| corrupt(format!("unknown node kind {kind_byte}")))?;

        let self_id = BlockId::new(block.read_u32(Self::OFFSET_BLOCK));
        if self_id != expected {
            return Err(corrupt(format!("block claims to be {self_id}")));
        }

        let key_count = block.read_u16(Self::OFFSET_KEY_COUNT) as usize;
        if key_count > 2 * order {
            return Err(corrupt(format!(
                "key count {key_count} exceeds {}",
                2 * order
            )));
        }

        let keys: Vec<Key> = (0..key_count)
            .map(|i| block.read_u64(Self::OFFSET_KEYS + i * 8))
            .collect();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(corrupt("keys are not strictly ascending".into()));
        }

        let mut values = Vec::with_capacity(key_count);
        for i in 0..key_count {
            let mut slot = [0u8; VALUE_SIZE];
            let offset = Self::OFFSET_VALUES + i * VALUE_SIZE;
            slot.copy_from_slice(block.read_bytes(offset, VALUE_SIZE));
            let value = Value::from_slot(&slot)
                .ok_or_else(|| corrupt(format!("malformed value slot {i}")))?;
            values.push(value);
        }

        let child_count = match kind {
            NodeKind::Leaf => 0,
            NodeKind::Internal if key_count == 0 => {
                return Err(corrupt("internal node without keys".into()));
            }
            NodeKind::Internal => key_count + 1,
        };
        let children: Vec<BlockId> = (0..child_count)
            .map(|i| BlockId::new(block.read_u32(Self::OFFSET_CHILDREN + i * 4)))
            .collect();
        if let Some(bad) = children.iter().find(|c| c.is_none() || **c == expected) {
            return Err(corrupt(format!("invalid child pointer {bad}")));
        }
        let stray = (child_count..MAX_CHILDREN)
            .any(|i| block.read_u32(Self::OFFSET_CHILDREN + i * 4) != 0);
        if stray {
            return Err(corrupt("child pointer beyond key count".into()));
        }

        Ok(Self {
            block: expected,
            parent: BlockId::new(block.read_u32(Self::OFFSET_PARENT)),
            kind,
            keys,
            values,
            children,
        })
    }
}
