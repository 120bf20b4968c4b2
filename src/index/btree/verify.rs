//! Whole-tree consistency check.

use std::fmt;

use crate::common::{BlockId, Error, Key, Result};
use crate::index::btree::tree::BTreeIndex;

/// Shape of a verified tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from root to leaf; 0 for an empty tree.
    pub height: usize,
    pub nodes: u64,
    pub leaves: u64,
    pub entries: u64,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "height: {}, nodes: {}, leaves: {}, entries: {}",
            self.height, self.nodes, self.leaves, self.entries
        )
    }
}

/// A subtree still to visit, with the bounds its keys must respect.
struct Pending {
    block: BlockId,
    parent: BlockId,
    /// Exclusive bounds.
    low: Option<Key>,
    high: Option<Key>,
    depth: usize,
}

impl BTreeIndex {
    /// Walk the whole tree and check its invariants.
    ///
    /// Checks, for every node: keys fall strictly between the separators
    /// above it, `parent_block` points at the node that references it,
    /// non-root nodes hold at least `order` keys, all leaves sit at the same
    /// depth and no block is below 1 or at/after the allocator counter. The
    /// total entry count must match the header.
    ///
    /// # Errors
    /// `Error::CorruptNode` for a node-level violation, `Error::CorruptIndex`
    /// if the entry count disagrees with the header.
    pub fn verify(&mut self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let root = self.root_block();
        if root.is_none() {
            return Ok(stats);
        }

        let next_free = self.header().next_free_block;
        let order = self.order();
        let mut leaf_depth: Option<usize> = None;
        let mut stack = vec![Pending {
            block: root,
            parent: BlockId::NONE,
            low: None,
            high: None,
            depth: 1,
        }];

        while let Some(item) = stack.pop() {
            if item.block >= next_free {
                return Err(Error::corrupt_node(
                    item.parent,
                    format!("child {} is past the allocator", item.block),
                ));
            }

            let node = self.read_node(item.block)?;
            let corrupt = |reason: String| Error::corrupt_node(item.block, reason);

            if node.parent != item.parent {
                return Err(corrupt(format!(
                    "parent link {} but referenced from {}",
                    node.parent, item.parent
                )));
            }
            if item.parent.is_some() && node.len() < order {
                return Err(corrupt(format!("underfull: {} keys", node.len())));
            }
            if node.is_empty() {
                return Err(corrupt("empty node in a non-empty tree".into()));
            }
            if let Some(low) = item.low {
                if node.keys[0] <= low {
                    return Err(corrupt(format!("key {} not above {low}", node.keys[0])));
                }
            }
            if let Some(high) = item.high {
                let last = node.keys[node.len() - 1];
                if last >= high {
                    return Err(corrupt(format!("key {last} not below {high}")));
                }
            }

            stats.nodes += 1;
            stats.entries += node.len() as u64;
            stats.height = stats.height.max(item.depth);

            if node.is_leaf() {
                stats.leaves += 1;
                match leaf_depth {
                    None => leaf_depth = Some(item.depth),
                    Some(d) if d != item.depth => {
                        return Err(corrupt(format!(
                            "leaf at depth {}, expected {d}",
                            item.depth
                        )));
                    }
                    Some(_) => {}
                }
                continue;
            }

            for (i, &child) in node.children.iter().enumerate() {
                stack.push(Pending {
                    block: child,
                    parent: node.block,
                    low: if i == 0 { item.low } else { Some(node.keys[i - 1]) },
                    high: node.keys.get(i).copied().or(item.high),
                    depth: item.depth + 1,
                });
            }
        }

        if stats.entries != self.len() {
            return Err(Error::CorruptIndex(format!(
                "header records {} entries, tree holds {}",
                self.len(),
                stats.entries
            )));
        }

        Ok(stats)
    }
}
