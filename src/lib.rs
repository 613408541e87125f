//! # keyscope
//!
//! Model tier of a terminal browser for Redis-compatible key-value stores:
//! - RESP2 framing and a blocking request/reply client
//! - A namespace tree that turns a flat key space into browsable prefixes
//! - A data access layer that fills the tree with resumable cursor scans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    UI / CLI (keyscope bin)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ NodeRef, Value, Reply
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Browser                                │
//! │      (scan / reload / delete / flush / rename / get)         │
//! └─────────────┬─────────────────────────────┬─────────────────┘
//!               │                             │
//!               ▼                             ▼
//!   ┌──────────────────────┐       ┌──────────────────────┐
//!   │   KeyTree per db     │       │       Client         │
//!   │ (arena, pruning,     │       │ (SELECT shadow,      │
//!   │  indexed lookup)     │       │  timeouts)           │
//!   └──────────────────────┘       └──────────┬───────────┘
//!                                             │
//!                                             ▼
//!                                  ┌──────────────────────┐
//!                                  │    RESP2 codec       │
//!                                  └──────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod tree;
pub mod browser;
pub mod classify;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KeyscopeError, Result};
pub use config::{Config, ConnectionProfile};
pub use browser::{Browser, DeleteOutcome, KeyType, NodeRef, Value};
pub use network::Client;
pub use protocol::{Command, Reply};
pub use tree::{KeyTree, NodeId};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of keyscope
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
