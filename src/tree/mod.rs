//! Key-Namespace Tree Module
//!
//! Hierarchical model of a flat key space, built by splitting keys on a
//! delimiter.
//!
//! ## Responsibilities
//! - Incremental population from scan batches
//! - Per-prefix aggregate counts
//! - Tombstones for deleted keys, cascading pruning of emptied branches
//!
//! ## Shape
//! ```text
//! keys: user:1:name  user:1:age  user:2:name
//!
//! db0 (root, key "")
//!  └─ user        key "user:"      count 3
//!      ├─ 1       key "user:1:"    count 2
//!      │   ├─ name   key "user:1:name"
//!      │   └─ age    key "user:1:age"
//!      └─ 2       key "user:2:"    count 1
//!          └─ name   key "user:2:name"
//! ```
//!
//! ## Data Structure Choice
//! Nodes live in an arena and refer to each other by [`NodeId`]. A handle
//! carries a generation, so a handle to a pruned node never resolves to a
//! node created later in the same slot.

mod namespace;
mod node;

pub use namespace::KeyTree;
pub use node::Node;

/// Stable handle to a node of one [`KeyTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Fan-out above which child lookups go through a hash index
pub const DEFAULT_INDEX_THRESHOLD: usize = 20;

/// Namespace separator used by convention in Redis key names
pub const DEFAULT_DELIMITER: char = ':';
