//! The B-tree engine.

use std::path::Path;

use crate::common::config::{IndexOptions, MAX_ORDER};
use crate::common::{BlockId, Error, Key, Result, Value};
use crate::index::btree::iter::Traverse;
use crate::index::btree::node::Node;
use crate::storage::block::IndexHeader;
use crate::storage::BlockStore;

/// Outcome of [`BTreeIndex::bulk_load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkLoadReport {
    /// Pairs inserted.
    pub inserted: usize,
    /// Keys skipped because they were already present, in input order.
    pub duplicates: Vec<Key>,
}

/// A persistent B-tree index backed by a single file.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │                       BTreeIndex                          │
/// │  ┌──────────────┐   ┌─────────────────────────────────┐   │
/// │  │ IndexHeader  │   │ BlockStore (owns the File)      │   │
/// │  │ root, next,  │──▶│ read_block / write_block /      │   │
/// │  │ order, count │   │ allocate_block                  │   │
/// │  └──────────────┘   └─────────────────────────────────┘   │
/// └──────────────────────────────────────────────────────────┘
/// ```
///
/// Every operation follows the same cycle: read a block, decode it into a
/// [`Node`], work on the node, encode it and write it back. Only the nodes on
/// the current path are in memory.
///
/// # Usage
/// ```no_run
/// use blocktree::{BTreeIndex, Value};
///
/// let mut index = BTreeIndex::create("t.idx")?;
/// index.insert(10, Value::try_from("a")?)?;
/// assert_eq!(index.search(10)?, Some(Value::try_from("a")?));
/// assert_eq!(index.search(99)?, None);
/// index.close()?;
/// # Ok::<(), blocktree::Error>(())
/// ```
pub struct BTreeIndex {
    store: BlockStore,
    header: IndexHeader,
    order: usize,
}

impl BTreeIndex {
    // ========================================================================
    // Public API: session lifecycle
    // ========================================================================

    /// Create a new index file with default options.
    ///
    /// # Errors
    /// Returns `Error::FileExists` if the path already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with(path, IndexOptions::default())
    }

    /// Create a new index file.
    ///
    /// # Errors
    /// - `Error::InvalidOrder` if `options.order` is not in `1..=MAX_ORDER`
    /// - `Error::FileExists` if the path already exists
    pub fn create_with<P: AsRef<Path>>(path: P, options: IndexOptions) -> Result<Self> {
        if options.order == 0 || options.order > MAX_ORDER {
            return Err(Error::InvalidOrder(options.order));
        }

        let mut store = BlockStore::create(&path, options.sync_writes)?;
        let header = IndexHeader::new(options.order as u32);
        store.init_header(&header)?;

        tracing::info!(
            path = %path.as_ref().display(),
            order = options.order,
            "created index"
        );

        Ok(Self {
            store,
            header,
            order: options.order,
        })
    }

    /// Open an existing index file with default options.
    ///
    /// # Errors
    /// - `Error::FileNotFound` if the path doesn't exist
    /// - `Error::CorruptIndex` if block 0 is not a valid header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, IndexOptions::default())
    }

    /// Open an existing index file.
    ///
    /// The order recorded in the file is used; `options.order` is ignored.
    pub fn open_with<P: AsRef<Path>>(path: P, options: IndexOptions) -> Result<Self> {
        let mut store = BlockStore::open(&path, options.sync_writes)?;
        let header = store.read_header()?;

        tracing::info!(
            path = %path.as_ref().display(),
            order = header.order,
            entries = header.entry_count,
            "opened index"
        );

        Ok(Self {
            store,
            order: header.order as usize,
            header,
        })
    }

    /// Flush and close the index.
    ///
    /// Dropping the index also releases the file; `close` additionally
    /// reports sync failures.
    pub fn close(mut self) -> Result<()> {
        self.store.sync()?;
        tracing::info!(entries = self.header.entry_count, "closed index");
        Ok(())
    }

    // ========================================================================
    // Public API: queries
    // ========================================================================

    /// Look up the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    pub fn search(&mut self, key: Key) -> Result<Option<Value>> {
        let mut current = self.header.root_block;
        let mut depth = 1;
        while current.is_some() {
            let node = self.read_node(current)?;
            match node.find(key) {
                Ok(i) => return Ok(Some(node.values[i])),
                Err(_) if node.is_leaf() => return Ok(None),
                Err(i) => {
                    depth += 1;
                    current = node.children[i];
                    self.check_link(node.block, current, depth)?;
                }
            }
        }
        Ok(None)
    }

    /// True if `key` is present.
    pub fn contains_key(&mut self, key: Key) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }

    /// Lazily walk all pairs in ascending key order.
    ///
    /// The iterator reads one node at a time. Calling `traverse` again starts
    /// a fresh walk from the root.
    pub fn traverse(&mut self) -> Traverse<'_> {
        let root = self.header.root_block;
        Traverse::new(self, root)
    }

    // ========================================================================
    // Public API: mutation
    // ========================================================================

    /// Insert a new key-value pair.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKey` if the key is already present; the file
    /// is left untouched in that case.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        if self.header.root_block.is_none() {
            let root = self.allocate()?;
            let mut leaf = Node::leaf(root, BlockId::NONE);
            leaf.insert_entry(0, key, value);
            self.write_node(&leaf)?;

            self.header.root_block = root;
            self.header.entry_count = 1;
            self.store.write_header(&self.header)?;
            return Ok(());
        }

        // Descend to the leaf, rejecting duplicates on the way down.
        let mut node = self.read_node(self.header.root_block)?;
        let mut depth = 1;
        loop {
            match node.find(key) {
                Ok(_) => return Err(Error::DuplicateKey(key)),
                Err(i) if node.is_leaf() => {
                    node.insert_entry(i, key, value);
                    break;
                }
                Err(i) => {
                    depth += 1;
                    let child = node.children[i];
                    self.check_link(node.block, child, depth)?;
                    node = self.read_node(child)?;
                }
            }
        }

        self.settle(node)?;

        self.header.entry_count += 1;
        self.store.write_header(&self.header)?;
        Ok(())
    }

    /// Insert every pair in input order.
    ///
    /// Keys that are already present (including keys repeated within
    /// `pairs`) are skipped and listed in the report. Any other error aborts
    /// the load; pairs inserted before it remain in the tree.
    pub fn bulk_load<I>(&mut self, pairs: I) -> Result<BulkLoadReport>
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        let mut report = BulkLoadReport::default();
        for (key, value) in pairs {
            match self.insert(key, value) {
                Ok(()) => report.inserted += 1,
                Err(Error::DuplicateKey(dup)) => {
                    tracing::warn!(key = dup, "bulk load skipped duplicate key");
                    report.duplicates.push(dup);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            inserted = report.inserted,
            skipped = report.duplicates.len(),
            "bulk load finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Public API: accessors
    // ========================================================================

    /// Number of key-value pairs stored.
    #[inline]
    pub fn len(&self) -> u64 {
        self.header.entry_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.header.entry_count == 0
    }

    /// Minimum degree of this tree.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Current root block, `BlockId::NONE` when empty.
    #[inline]
    pub fn root_block(&self) -> BlockId {
        self.header.root_block
    }

    /// Number of blocks in the file, including the header.
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.store.block_count()
    }

    /// Size of the index file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.store.file_size()
    }

    /// Cached copy of the header.
    #[inline]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Reject a link that leaves the allocated range, or a walk that has
    /// gone deeper than there are allocated blocks (which only a cycle can
    /// produce).
    pub(crate) fn check_link(&self, from: BlockId, to: BlockId, depth: usize) -> Result<()> {
        let limit = self.header.next_free_block;
        if to.is_none() || to >= limit {
            return Err(Error::corrupt_node(
                from,
                format!("link to {to} is outside the allocated blocks"),
            ));
        }
        if depth >= limit.0 as usize {
            return Err(Error::corrupt_node(
                from,
                format!("path through {to} is deeper than {} blocks", limit.0 - 1),
            ));
        }
        Ok(())
    }

    pub(crate) fn read_node(&mut self, block: BlockId) -> Result<Node> {
        let image = self.store.read_block(block)?;
        Node::decode(&image, block, self.order)
    }

    fn write_node(&mut self, node: &Node) -> Result<()> {
        self.store.write_block(node.block, &node.encode())
    }

    /// Allocate a block and persist the advanced counter before the caller
    /// writes anything that references it.
    fn allocate(&mut self) -> Result<BlockId> {
        let block = self.store.allocate_block(&mut self.header)?;
        self.store.write_header(&self.header)?;
        Ok(block)
    }

    /// Write `node` back, splitting upward while it overflows.
    fn settle(&mut self, mut node: Node) -> Result<()> {
        let max_keys = 2 * self.order;
        // Splitting allocates, so bound the climb by the blocks present
        // before it started.
        let max_levels = self.header.next_free_block.0 as usize;
        let mut level = 1;

        while node.len() > max_keys {
            let right_block = self.allocate()?;
            let new_root = if node.parent.is_none() {
                Some(self.allocate()?)
            } else {
                None
            };

            let (median_key, median_value, mut right) = node.split(self.order, right_block);
            tracing::debug!(
                left = node.block.0,
                right = right_block.0,
                median = median_key,
                "split node"
            );

            if let Some(root) = new_root {
                node.parent = root;
                right.parent = root;
            }

            self.write_node(&right)?;
            for &child in &right.children {
                self.reparent(child, right_block)?;
            }
            self.write_node(&node)?;

            match new_root {
                Some(root) => {
                    let root_node =
                        Node::internal(root, median_key, median_value, node.block, right_block);
                    self.write_node(&root_node)?;
                    self.header.root_block = root;
                    tracing::debug!(root = root.0, "tree grew a level");
                    return Ok(());
                }
                None => {
                    level += 1;
                    if level >= max_levels {
                        return Err(Error::corrupt_node(
                            node.block,
                            "parent chain is longer than the tree can be",
                        ));
                    }
                    self.check_link(node.block, node.parent, level)?;
                    let mut parent = self.read_node(node.parent)?;
                    let slot = match parent.find(median_key) {
                        Err(slot) => slot,
                        Ok(_) => {
                            return Err(Error::corrupt_node(
                                parent.block,
                                format!("separator {median_key} already present"),
                            ))
                        }
                    };
                    if parent.children.get(slot) != Some(&node.block) {
                        return Err(Error::corrupt_node(
                            parent.block,
                            format!("child {} not at expected slot {slot}", node.block),
                        ));
                    }
                    parent.insert_separator(slot, median_key, median_value, right_block);
                    node = parent;
                }
            }
        }

        self.write_node(&node)
    }

    fn reparent(&mut self, child: BlockId, parent: BlockId) -> Result<()> {
        let mut node = self.read_node(child)?;
        node.parent = parent;
        self.write_node(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::BLOCK_SIZE;
    use tempfile::{tempdir, TempDir};

    fn val(s: &str) -> Value {
        Value::try_from(s).unwrap()
    }

    fn new_index(order: usize) -> (BTreeIndex, TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");
        let opts = IndexOptions::new().order(order).sync_writes(false);
        (BTreeIndex::create_with(&path, opts).unwrap(), dir)
    }

    fn keys(index: &mut BTreeIndex) -> Vec<Key> {
        index.traverse().map(|r| r.unwrap().0).collect()
    }

    #[test]
    fn test_create_empty() {
        let (mut index, _dir) = new_index(2);
        assert!(index.is_empty());
        assert!(index.root_block().is_none());
        assert_eq!(index.block_count(), 1);
        assert_eq!(index.file_size(), BLOCK_SIZE as u64);
        assert_eq!(index.search(1).unwrap(), None);
        assert_eq!(index.traverse().count(), 0);
    }

    #[test]
    fn test_invalid_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");

        let err = BTreeIndex::create_with(&path, IndexOptions::new().order(0)).err();
        assert!(matches!(err, Some(Error::InvalidOrder(0))));
        let err = BTreeIndex::create_with(&path, IndexOptions::new().order(MAX_ORDER + 1)).err();
        assert!(matches!(err, Some(Error::InvalidOrder(9))));

        // Nothing was created
        assert!(!path.exists());
    }

    #[test]
    fn test_first_insert_creates_root_leaf() {
        let (mut index, _dir) = new_index(2);
        index.insert(7, val("x")).unwrap();

        assert_eq!(index.root_block(), BlockId::new(1));
        assert_eq!(index.len(), 1);
        let root = index.read_node(BlockId::new(1)).unwrap();
        assert!(root.is_leaf());
        assert!(root.parent.is_none());
    }

    #[test]
    fn test_example_scenario() {
        let (mut index, _dir) = new_index(2);
        for (k, v) in [(10, "a"), (20, "b"), (5, "c"), (15, "d"), (25, "e")] {
            index.insert(k, val(v)).unwrap();
        }

        let pairs: Vec<(Key, Value)> = index.traverse().collect::<Result<_>>().unwrap();
        assert_eq!(
            pairs,
            vec![
                (5, val("c")),
                (10, val("a")),
                (15, val("d")),
                (20, val("b")),
                (25, val("e")),
            ]
        );
        assert_eq!(index.search(15).unwrap(), Some(val("d")));
        assert_eq!(index.search(99).unwrap(), None);
    }

    #[test]
    fn test_root_split_shape() {
        let (mut index, _dir) = new_index(2);
        for k in [10, 20, 30, 40, 50] {
            index.insert(k, val("v")).unwrap();
        }

        let root_id = index.root_block();
        let root = index.read_node(root_id).unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.keys, vec![30]);
        assert_eq!(root.children.len(), 2);
        assert!(root.parent.is_none());

        let expected = [vec![10, 20], vec![40, 50]];
        for (child_id, expect) in root.children.clone().into_iter().zip(expected) {
            let child = index.read_node(child_id).unwrap();
            assert!(child.is_leaf());
            assert_eq!(child.parent, root_id);
            assert_eq!(child.keys, expect);
        }
    }

    #[test]
    fn test_split_reuses_left_block() {
        let (mut index, _dir) = new_index(2);
        for k in 1..=5 {
            index.insert(k, val("v")).unwrap();
        }

        // Block 1 stays the left leaf; the split allocates the right
        // sibling (2) before the new root (3).
        let root = index.read_node(index.root_block()).unwrap();
        assert_eq!(index.root_block(), BlockId::new(3));
        assert_eq!(root.children, vec![BlockId::new(1), BlockId::new(2)]);
        assert_eq!(index.header().next_free_block, BlockId::new(4));
    }

    #[test]
    fn test_duplicate_rejected_and_file_unchanged() {
        let (mut index, dir) = new_index(2);
        for k in [3, 1, 4, 5, 9, 2, 6] {
            index.insert(k, val("v")).unwrap();
        }
        let before = std::fs::read(dir.path().join("t.idx")).unwrap();

        let err = index.insert(4, val("other")).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(4)));
        assert_eq!(index.len(), 7);
        assert_eq!(index.search(4).unwrap(), Some(val("v")));

        let after = std::fs::read(dir.path().join("t.idx")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_internal_split_reparents_children() {
        let (mut index, _dir) = new_index(1);
        // Order 1 splits at three keys, so this grows several levels.
        for k in 1..=20 {
            index.insert(k, val("v")).unwrap();
        }

        let stats = index.verify().unwrap();
        assert!(stats.height >= 3);
        assert_eq!(stats.entries, 20);
        assert_eq!(keys(&mut index), (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_descending_and_interleaved_inserts() {
        let (mut index, _dir) = new_index(3);
        for k in (0..100).rev() {
            index.insert(k * 2, val("even")).unwrap();
        }
        for k in 0..100 {
            index.insert(k * 2 + 1, val("odd")).unwrap();
        }

        assert_eq!(keys(&mut index), (0..200).collect::<Vec<_>>());
        assert_eq!(index.search(77).unwrap(), Some(val("odd")));
        assert_eq!(index.search(200).unwrap(), None);
        index.verify().unwrap();
    }

    #[test]
    fn test_bulk_load_skips_duplicates() {
        let (mut index, _dir) = new_index(2);
        index.insert(5, val("old")).unwrap();

        let pairs = vec![(1, val("a")), (5, val("b")), (3, val("c")), (1, val("d"))];
        let report = index.bulk_load(pairs).unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, vec![5, 1]);
        assert_eq!(index.search(5).unwrap(), Some(val("old")));
        assert_eq!(index.search(1).unwrap(), Some(val("a")));
        assert_eq!(keys(&mut index), vec![1, 3, 5]);
    }

    #[test]
    fn test_traverse_is_restartable() {
        let (mut index, _dir) = new_index(2);
        for k in 0..30 {
            index.insert(k, val("v")).unwrap();
        }

        let partial: Vec<Key> = index.traverse().take(5).map(|r| r.unwrap().0).collect();
        assert_eq!(partial, vec![0, 1, 2, 3, 4]);
        assert_eq!(keys(&mut index), (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_contains_key() {
        let (mut index, _dir) = new_index(2);
        index.insert(42, val("x")).unwrap();
        assert!(index.contains_key(42).unwrap());
        assert!(!index.contains_key(43).unwrap());
    }

    #[test]
    fn test_corrupt_child_surfaces_error() {
        let (mut index, dir) = new_index(2);
        for k in 1..=5 {
            index.insert(k, val("v")).unwrap();
        }
        let path = dir.path().join("t.idx");
        drop(index);

        // Smash the right leaf (block 2)
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[2 * 512 + 20] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let opts = IndexOptions::new().sync_writes(false);
        let mut index = BTreeIndex::open_with(&path, opts).unwrap();
        assert_eq!(index.search(1).unwrap(), Some(val("v")));
        assert!(matches!(index.search(5), Err(Error::CorruptNode { .. })));
        assert!(index.insert(6, val("v")).is_err());
    }

    /// Point the root's first child back at the root, keeping every block
    /// well-formed, and return the index.
    fn cyclic_tree(dir: &TempDir) -> BTreeIndex {
        let path = dir.path().join("t.idx");
        let opts = IndexOptions::new().order(1).sync_writes(false);
        let mut index = BTreeIndex::create_with(&path, opts).unwrap();
        for k in 1..=20 {
            index.insert(k, val("v")).unwrap();
        }

        let root_id = index.root_block();
        let root = index.read_node(root_id).unwrap();
        let mut child = index.read_node(root.children[0]).unwrap();
        assert!(!child.is_leaf());
        child.children[0] = root_id;
        index.write_node(&child).unwrap();
        index
    }

    #[test]
    fn test_cyclic_child_is_corrupt_for_search() {
        let dir = tempdir().unwrap();
        let mut index = cyclic_tree(&dir);
        assert!(matches!(index.search(0), Err(Error::CorruptNode { .. })));
    }

    #[test]
    fn test_cyclic_child_is_corrupt_for_insert() {
        let dir = tempdir().unwrap();
        let mut index = cyclic_tree(&dir);
        let blocks_before = index.block_count();

        assert!(matches!(index.insert(0, val("v")), Err(Error::CorruptNode { .. })));
        assert_eq!(index.block_count(), blocks_before);
        assert_eq!(index.len(), 20);
    }

    #[test]
    fn test_cyclic_child_is_corrupt_for_traverse() {
        let dir = tempdir().unwrap();
        let mut index = cyclic_tree(&dir);
        let mut walk = index.traverse();
        assert!(matches!(walk.next(), Some(Err(Error::CorruptNode { .. }))));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_child_past_allocator_is_corrupt() {
        let (mut index, _dir) = new_index(2);
        for k in 1..=5 {
            index.insert(k, val("v")).unwrap();
        }

        let root_id = index.root_block();
        let mut root = index.read_node(root_id).unwrap();
        root.children[1] = BlockId::new(index.header().next_free_block.0 + 5);
        index.write_node(&root).unwrap();

        assert_eq!(index.search(1).unwrap(), Some(val("v")));
        match index.search(5) {
            Err(Error::CorruptNode { block, .. }) => assert_eq!(block, root_id),
            other => panic!("expected CorruptNode, got {:?}", other),
        }
    }
}
