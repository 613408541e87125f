//! Tree node

use std::collections::HashMap;

use super::NodeId;

/// One segment of the key namespace
///
/// A leaf stands for a stored key and carries the complete key. A node with
/// children stands for a synthetic prefix and carries the accumulated prefix,
/// delimiter included (`"user:1:"`).
#[derive(Debug, Clone)]
pub struct Node {
    /// Segment shown to the user
    pub(super) name: String,

    /// Full key (leaf) or accumulated prefix
    pub(super) key: String,

    /// Insertion ordered
    pub(super) children: Vec<NodeId>,

    /// Child lookup by key, present once fan-out crossed the threshold
    pub(super) index: Option<HashMap<String, NodeId>>,

    /// Insertions that passed through this node
    pub(super) count: usize,

    /// Tombstone: the key was deleted on the server
    pub(super) removed: bool,

    /// None only for the root
    pub(super) parent: Option<NodeId>,
}

impl Node {
    pub(super) fn new(name: String, key: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            key,
            children: Vec::new(),
            index: None,
            count: 1,
            removed: false,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of key insertions sharing this node's prefix
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// True iff the node currently has at least one child
    pub fn has_child(&self) -> bool {
        !self.children.is_empty()
    }

    /// A "directory" in the UI; leaves are keys
    pub fn can_expand(&self) -> bool {
        self.has_child()
    }

    /// Whether child lookups currently go through the hash index
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }
}
