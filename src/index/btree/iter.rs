//! Lazy in-order traversal.

use crate::common::{BlockId, Key, Result, Value};
use crate::index::btree::node::Node;
use crate::index::btree::tree::BTreeIndex;

/// A node on the traversal stack and the next key to emit from it.
struct Cursor {
    node: Node,
    next: usize,
}

/// Iterator over all pairs of a [`BTreeIndex`] in ascending key order.
///
/// Created by [`BTreeIndex::traverse`]. The walk keeps an explicit stack of
/// the nodes on the current root-to-leaf path, so memory is bounded by tree
/// height. After yielding an error the iterator is exhausted.
pub struct Traverse<'a> {
    index: &'a mut BTreeIndex,
    stack: Vec<Cursor>,
    /// Subtree to descend into before emitting anything else.
    pending: BlockId,
    failed: bool,
}

impl<'a> Traverse<'a> {
    pub(crate) fn new(index: &'a mut BTreeIndex, root: BlockId) -> Self {
        Self {
            index,
            stack: Vec::new(),
            pending: root,
            failed: false,
        }
    }

    /// Push the leftmost path of the subtree rooted at `block`.
    fn descend(&mut self, mut block: BlockId) -> Result<()> {
        while block.is_some() {
            if let Some(parent) = self.stack.last() {
                self.index.check_link(parent.node.block, block, self.stack.len() + 1)?;
            }
            let node = self.index.read_node(block)?;
            block = node.children.first().copied().unwrap_or(BlockId::NONE);
            self.stack.push(Cursor { node, next: 0 });
        }
        Ok(())
    }
}

impl Iterator for Traverse<'_> {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let pending = std::mem::replace(&mut self.pending, BlockId::NONE);
        if let Err(e) = self.descend(pending) {
            self.failed = true;
            self.stack.clear();
            return Some(Err(e));
        }

        loop {
            let cursor = self.stack.last_mut()?;
            if cursor.next < cursor.node.len() {
                let i = cursor.next;
                cursor.next += 1;
                // The right subtree of this key comes before the next key.
                if let Some(&right) = cursor.node.children.get(i + 1) {
                    self.pending = right;
                }
                return Some(Ok((cursor.node.keys[i], cursor.node.values[i])));
            }
            self.stack.pop();
        }
    }
}
