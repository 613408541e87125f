//! KeyTree implementation
//!
//! Arena of nodes with explicit parent handles. Not internally synchronized:
//! one writer per tree.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::{Node, NodeId, DEFAULT_DELIMITER, DEFAULT_INDEX_THRESHOLD};
use crate::error::{KeyscopeError, Result};

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Namespace tree of one logical database
pub struct KeyTree {
    slots: Vec<Slot>,

    /// Vacant slot indices, reused before the arena grows
    free: Vec<u32>,

    root: NodeId,

    delimiter: char,

    index_threshold: usize,

    /// Occupied slots, root included
    live: usize,
}

impl KeyTree {
    /// Create an empty tree whose root shows `root_name`
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::with_options(root_name, DEFAULT_DELIMITER, DEFAULT_INDEX_THRESHOLD)
    }

    /// Create an empty tree with a custom delimiter and index threshold
    pub fn with_options(
        root_name: impl Into<String>,
        delimiter: char,
        index_threshold: usize,
    ) -> Self {
        let mut root = Node::new(root_name.into(), String::new(), None);
        root.count = 0;
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            delimiter,
            index_threshold,
            live: 1,
        }
    }

    // =========================================================================
    // Read Access
    // =========================================================================

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Resolve a handle; None once the node was pruned or cleared
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Children of a node; empty for a stale handle
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    pub fn has_child(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(Node::has_child)
    }

    pub fn can_expand(&self, id: NodeId) -> bool {
        self.has_child(id)
    }

    /// Tombstoned, pruned, or cleared
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.node(id).map_or(true, Node::is_removed)
    }

    /// Live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    /// True when the root has no children
    pub fn is_empty(&self) -> bool {
        !self.has_child(self.root)
    }

    /// Find the node carrying exactly `key`
    ///
    /// Prefix keys (ending in the delimiter) resolve to internal nodes.
    pub fn lookup(&self, key: &str) -> Option<NodeId> {
        if key.is_empty() {
            return Some(self.root);
        }
        let mut parent = self.root;
        for (prefix, _) in self.segments(key, 0) {
            parent = self.find_child(parent, prefix)?;
        }
        if self.node(parent)?.key == key {
            return Some(parent);
        }
        self.find_child(parent, key)
    }

    /// All nodes below `id` in pre-order, `id` excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Insert one key and return its leaf
    ///
    /// Intermediate nodes are matched by full accumulated prefix, so equal
    /// segment names under different branches never collide. Each reused node
    /// on the path counts the insertion; inserting a present key again bumps
    /// its leaf's count instead of adding a sibling.
    pub fn add_key(&mut self, key: &str) -> NodeId {
        self.insert_from(self.root, key)
    }

    /// Insert a key below `start`, leaving the counts of its ancestors alone
    ///
    /// `key` must extend `start`'s prefix.
    pub fn add_key_under(&mut self, start: NodeId, key: &str) -> Result<NodeId> {
        let node = self
            .node(start)
            .ok_or_else(|| KeyscopeError::InvalidArgument("stale node handle".to_string()))?;
        if start != self.root && !node.key.ends_with(self.delimiter) {
            return Err(KeyscopeError::InvalidArgument(format!(
                "{:?} is a key, not a prefix",
                node.key
            )));
        }
        if !key.starts_with(node.key.as_str()) {
            return Err(KeyscopeError::InvalidArgument(format!(
                "key {:?} is not under prefix {:?}",
                key, node.key
            )));
        }
        Ok(self.insert_from(start, key))
    }

    fn insert_from(&mut self, start: NodeId, key: &str) -> NodeId {
        let offset = self.node(start).map_or(0, |n| n.key.len());
        let mut parent = start;
        let mut segment_start = offset;

        let segments: Vec<(usize, usize)> = self
            .segments(key, offset)
            .map(|(prefix, name_start)| (name_start, prefix.len()))
            .collect();
        for (name_start, prefix_end) in segments {
            let prefix = &key[..prefix_end];
            parent = match self.find_child(parent, prefix) {
                Some(existing) => {
                    self.bump(existing);
                    existing
                }
                None => {
                    let name = &key[name_start..prefix_end - self.delimiter.len_utf8()];
                    self.add_child(parent, name, prefix)
                }
            };
            segment_start = prefix_end;
        }

        match self.find_child(parent, key) {
            Some(leaf) => {
                self.bump(leaf);
                leaf
            }
            None => self.add_child(parent, &key[segment_start..], key),
        }
    }

    /// Delimiter-terminated prefixes of `key` past byte `offset`, each paired
    /// with the byte where its last segment starts
    fn segments<'k>(
        &self,
        key: &'k str,
        offset: usize,
    ) -> impl Iterator<Item = (&'k str, usize)> + 'k {
        let width = self.delimiter.len_utf8();
        let mut name_start = offset;
        key[offset..]
            .match_indices(self.delimiter)
            .map(move |(pos, _)| {
                let end = offset + pos + width;
                let item = (&key[..end], name_start);
                name_start = end;
                item
            })
    }

    fn bump(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.count += 1;
        }
    }

    /// Child of `parent` whose key is exactly `key`
    fn find_child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        let node = self.node(parent)?;
        if let Some(index) = &node.index {
            return index.get(key).copied();
        }
        node.children
            .iter()
            .copied()
            .find(|&child| self.node(child).is_some_and(|c| c.key == key))
    }

    fn add_child(&mut self, parent: NodeId, name: &str, key: &str) -> NodeId {
        let id = self.alloc(Node::new(name.to_string(), key.to_string(), Some(parent)));
        let threshold = self.index_threshold;

        let Some(parent_node) = self.node_mut(parent) else {
            return id;
        };
        parent_node.children.push(id);
        if parent_node.children.len() <= threshold {
            return id;
        }
        if let Some(index) = parent_node.index.as_mut() {
            index.insert(key.to_string(), id);
            return id;
        }

        // First crossing: index every current child.
        let children = parent_node.children.clone();
        let index: HashMap<String, NodeId> = children
            .into_iter()
            .filter_map(|child| self.node(child).map(|c| (c.key.clone(), child)))
            .collect();
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.index = Some(index);
        }
        id
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Mark or unmark a node as deleted on the server
    pub fn set_removed(&mut self, id: NodeId, removed: bool) {
        if let Some(node) = self.node_mut(id) {
            node.removed = removed;
        }
    }

    /// Detach a node and prune every ancestor it leaves empty
    ///
    /// Pruning walks upward and stops below the root. Handles to the detached
    /// nodes go stale. Returns false for the root or a stale handle.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }

        let mut current = id;
        while let Some(parent) = self.node(current).and_then(Node::parent) {
            self.detach(parent, current);
            self.free_subtree(current);

            if parent == self.root || self.has_child(parent) {
                break;
            }
            current = parent;
        }
        true
    }

    /// Drop all descendants without marking the node itself removed
    pub fn clear_children(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let children = std::mem::take(&mut node.children);
        node.index = None;
        for child in children {
            self.free_subtree(child);
        }
    }

    /// Replace a node's key in place
    ///
    /// The display name becomes the last segment of `new_key`. The node keeps
    /// its position even when `new_key` implies a different branch. A sibling
    /// already carrying `new_key` is dropped, since the server overwrote it.
    pub fn rename(&mut self, id: NodeId, new_key: &str) -> bool {
        let Some(parent) = self.node(id).map(Node::parent) else {
            return false;
        };
        if let Some(parent) = parent {
            let shadowed: Vec<NodeId> = self
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| c != id && self.node(c).is_some_and(|n| n.key == new_key))
                .collect();
            for sibling in shadowed {
                self.detach(parent, sibling);
                self.free_subtree(sibling);
            }
        }

        let delimiter = self.delimiter;
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        let old_key = std::mem::replace(&mut node.key, new_key.to_string());
        node.name = match new_key.rfind(delimiter) {
            Some(pos) => new_key[pos + delimiter.len_utf8()..].to_string(),
            None => new_key.to_string(),
        };

        if let Some(index) = parent
            .and_then(|p| self.node_mut(p))
            .and_then(|p| p.index.as_mut())
        {
            index.remove(&old_key);
            index.insert(new_key.to_string(), id);
        }
        true
    }

    /// Overwrite a node's count (reload recounts a rescanned subtree)
    pub(crate) fn set_count(&mut self, id: NodeId, count: usize) {
        if let Some(node) = self.node_mut(id) {
            node.count = count;
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Indented text rendering of the subtree under `id`
    ///
    /// `max_depth` limits how many levels below `id` are shown.
    pub fn dump(&self, id: NodeId, max_depth: Option<usize>) -> String {
        let mut out = String::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((next, depth)) = stack.pop() {
            let Some(node) = self.node(next) else {
                continue;
            };
            let marker = if node.has_child() { "+ " } else { "  " };
            let _ = write!(out, "{:indent$}{}{}", "", marker, node.name, indent = depth * 2);
            if node.has_child() {
                let _ = write!(out, " ({})", node.count);
            }
            if node.removed {
                out.push_str(" [removed]");
            }
            out.push('\n');

            if max_depth.map_or(true, |max| depth < max) {
                stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        out
    }

    // =========================================================================
    // Arena
    // =========================================================================

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Unlink `child` from `parent`'s child list and index
    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let Some(child_key) = self.node(child).map(|c| c.key.clone()) else {
            return;
        };
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|&c| c != child);
            if let Some(index) = parent_node.index.as_mut() {
                index.remove(&child_key);
            }
        }
    }

    /// Release the slots of `id` and everything below it
    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(next.index as usize)
                .filter(|slot| slot.generation == next.generation)
            else {
                continue;
            };
            let Some(node) = slot.node.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(next.index);
            self.live -= 1;
            stack.extend(node.children);
        }
    }
}

impl std::fmt::Debug for KeyTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyTree")
            .field("root", &self.node(self.root).map(Node::name))
            .field("delimiter", &self.delimiter)
            .field("index_threshold", &self.index_threshold)
            .field("live", &self.live)
            .finish()
    }
}
