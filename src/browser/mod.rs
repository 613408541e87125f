//! Browser Module
//!
//! Data access layer between the UI and the wire: one namespace tree per
//! logical database, cursor-driven population, and the mutations a user can
//! trigger from the tree.
//!
//! ## Responsibilities
//! - Allocate `db0..dbN-1` trees lazily from `CONFIG GET databases`
//! - Drive SCAN loops into the selected database's tree, resumably
//! - Propagate delete, rename and flush into the tree
//! - Decode values per key type for preview
//!
//! ## Retry Policy
//! Reads (`databases`, `select`, `scan_all_keys`, `reload`, `get_value`)
//! reconnect once and retry on connection-class failures. Mutations surface
//! their first failure: retrying a write that may have been applied risks
//! applying it twice.

mod scan;
mod task;
mod value;

pub use scan::{escape_pattern, prefix_pattern, KeyScan, SCAN_DONE};
pub use task::{spawn_delete, DeleteTask};
pub use value::{KeyType, Value};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Span;

use crate::config::Config;
use crate::error::{KeyscopeError, Result};
use crate::network::Client;
use crate::protocol::{Command, Reply};
use crate::tree::{KeyTree, Node, NodeId};

/// Database count assumed when the server refuses `CONFIG GET`
pub const FALLBACK_DATABASES: usize = 16;

/// A node handle qualified by the database whose tree owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub db: usize,
    pub id: NodeId,
}

/// Result of a (possibly cancelled) delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// DEL commands sent
    pub issued: usize,

    /// Keys the server reported as removed
    pub deleted: i64,

    /// Stopped early on request
    pub cancelled: bool,
}

/// Session with one server and the namespace trees built from it
///
/// Not internally synchronized. Share it behind a lock (see
/// [`spawn_delete`]) when work leaves the UI thread.
pub struct Browser {
    config: Config,

    client: Option<Client>,

    /// One tree per database index, empty until first browse
    databases: Vec<KeyTree>,

    /// Interrupted cursor loops, by database and MATCH pattern
    pending: HashMap<(usize, String), KeyScan>,

    span: Span,
}

impl Browser {
    /// Create a browser; nothing is dialed until first use
    pub fn new(config: Config) -> Self {
        let span = tracing::info_span!("browser", addr = %config.addr);
        Self::with_span(config, span)
    }

    /// Create a browser that logs inside `span`
    pub fn with_span(config: Config, span: Span) -> Self {
        Self {
            config,
            client: None,
            databases: Vec::new(),
            pending: HashMap::new(),
            span,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Dial (or redial) the server
    ///
    /// A replaced session had a database selected; the new one selects the
    /// same index before it is installed.
    pub fn connect(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        let index = self.client.as_ref().map_or(0, Client::db_index);
        let conn_span = tracing::debug_span!(parent: &self.span, "conn");
        let mut client = Client::connect(&self.config, conn_span)?;
        if index != 0 {
            client.select(index)?;
        }

        tracing::info!(peer = %client.peer_addr(), db = index, "session ready");
        if let Some(mut old) = self.client.replace(client) {
            old.close();
        }
        Ok(())
    }

    /// Close the session. The selected index is remembered for `connect`.
    pub fn close(&mut self) {
        if let Some(client) = self.client.as_mut() {
            client.close();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(Client::is_connected)
    }

    /// Selected database, from the client's session shadow
    pub fn current_db(&self) -> usize {
        self.client.as_ref().map_or(0, Client::db_index)
    }

    fn client(&mut self) -> Result<&mut Client> {
        match self.client.as_mut() {
            Some(client) if client.is_connected() => Ok(client),
            _ => Err(KeyscopeError::NotConnected),
        }
    }

    /// Dial if no session was ever opened; a dead session is left alone
    fn ensure_session(&mut self) -> Result<()> {
        if self.client.is_none() {
            self.connect()?;
        }
        Ok(())
    }

    /// Run `op`, and once more on a fresh connection if it failed for a
    /// connection-class reason
    ///
    /// A browser that never dialed connects first, so the lazy dial does not
    /// use up the retry.
    fn with_retry<T>(
        &mut self,
        op: &'static str,
        mut f: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let span = self.span.clone();
        let _entered = span.enter();

        self.ensure_session()?;
        match f(self) {
            Err(e) if e.is_retryable() => {
                tracing::warn!(op, error = %e, "reconnecting and retrying once");
                self.connect()?;
                f(self)
            }
            other => other,
        }
    }

    // =========================================================================
    // Databases and Trees
    // =========================================================================

    /// Roots of all database trees, fetching the count on first call
    pub fn databases(&mut self) -> Result<Vec<NodeRef>> {
        self.with_retry("databases", |b| b.ensure_databases())?;
        Ok(self
            .databases
            .iter()
            .enumerate()
            .map(|(db, tree)| NodeRef {
                db,
                id: tree.root(),
            })
            .collect())
    }

    fn ensure_databases(&mut self) -> Result<()> {
        if !self.databases.is_empty() {
            return Ok(());
        }

        let count = match self.client()?.config_databases() {
            Ok(count) => count.max(1),
            Err(KeyscopeError::Command(message)) => {
                tracing::warn!(%message, fallback = FALLBACK_DATABASES, "CONFIG GET refused");
                FALLBACK_DATABASES
            }
            Err(e) => return Err(e),
        };

        let delimiter = self.config.delimiter;
        let threshold = self.config.index_threshold;
        self.databases = (0..count)
            .map(|db| KeyTree::with_options(format!("db{}", db), delimiter, threshold))
            .collect();
        tracing::info!(count, "database trees allocated");
        Ok(())
    }

    /// Number of allocated trees (0 before the first browse)
    pub fn database_count(&self) -> usize {
        self.databases.len()
    }

    pub fn tree(&self, db: usize) -> Option<&KeyTree> {
        self.databases.get(db)
    }

    pub fn node(&self, node: NodeRef) -> Option<&Node> {
        self.tree(node.db)?.node(node.id)
    }

    /// Children of a node as qualified handles
    pub fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.tree(node.db)
            .map(|tree| {
                tree.children(node.id)
                    .iter()
                    .map(|&id| NodeRef { db: node.db, id })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tree_of(&self, db: usize) -> Result<&KeyTree> {
        self.databases
            .get(db)
            .ok_or_else(|| KeyscopeError::InvalidArgument(format!("no database {}", db)))
    }

    fn tree_mut(&mut self, db: usize) -> Result<&mut KeyTree> {
        self.databases
            .get_mut(db)
            .ok_or_else(|| KeyscopeError::InvalidArgument(format!("no database {}", db)))
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Switch the session to database `db`; no round trip if already there
    pub fn select(&mut self, db: usize) -> Result<()> {
        self.with_retry("select", |b| b.select_once(db))
    }

    fn select_once(&mut self, db: usize) -> Result<()> {
        if !self.databases.is_empty() && db >= self.databases.len() {
            return Err(KeyscopeError::InvalidArgument(format!(
                "database {} out of range (0..{})",
                db,
                self.databases.len()
            )));
        }
        let client = self.client()?;
        if client.db_index() == db {
            return Ok(());
        }
        client.select(db)
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Populate the selected database's tree from a full cursor scan
    ///
    /// Returns the top-level nodes. A fresh scan clears the tree first; a
    /// scan interrupted earlier resumes from its last cursor instead.
    pub fn scan_all_keys(&mut self) -> Result<Vec<NodeRef>> {
        self.with_retry("scan", |b| {
            b.ensure_databases()?;
            let db = b.current_db();
            let root = b.tree_of(db)?.root();
            b.scan_into(db, root)?;
            Ok(b.children(NodeRef { db, id: root }))
        })
    }

    /// Populate the selected database's tree with a single `KEYS *`
    ///
    /// Blocks the server for the whole key space; for small datasets only.
    pub fn load_all_keys_legacy(&mut self) -> Result<Vec<NodeRef>> {
        self.with_retry("keys", |b| {
            b.ensure_databases()?;
            let db = b.current_db();
            let keys = b.client()?.keys("*")?;

            let tree = b.tree_mut(db)?;
            let root = tree.root();
            tree.clear_children(root);
            for key in &keys {
                tree.add_key(key);
            }
            tree.set_count(root, keys.len());
            Ok(b.children(NodeRef { db, id: root }))
        })
    }

    /// Run (or resume) the `<prefix>*` scan of `start` into its subtree
    fn scan_into(&mut self, db: usize, start: NodeId) -> Result<usize> {
        let batch = self.config.scan_batch_size;
        let client = match self.client.as_mut() {
            Some(client) if client.is_connected() => client,
            _ => return Err(KeyscopeError::NotConnected),
        };
        let tree = self
            .databases
            .get_mut(db)
            .ok_or_else(|| KeyscopeError::InvalidArgument(format!("no database {}", db)))?;
        let prefix = tree.node(start).ok_or_else(stale_handle)?.key().to_string();

        let slot = (db, prefix_pattern(&prefix));
        let mut scan = match self.pending.remove(&slot) {
            Some(scan) => {
                tracing::debug!(pattern = %slot.1, cursor = %scan.cursor(), "resuming scan");
                scan
            }
            None => {
                tree.clear_children(start);
                KeyScan::new(slot.1.clone(), batch)
            }
        };

        let result = scan.run(client, |key| {
            if let Err(e) = tree.add_key_under(start, key) {
                tracing::warn!(%key, error = %e, "skipping key outside scanned prefix");
            }
        });

        match result {
            Ok(_) => {
                tree.set_count(start, scan.keys_seen());
                tracing::debug!(
                    pattern = %scan.pattern(),
                    rounds = scan.rounds(),
                    keys = scan.keys_seen(),
                    "scan complete"
                );
                Ok(scan.keys_seen())
            }
            Err(e) => {
                tracing::warn!(
                    pattern = %scan.pattern(),
                    cursor = %scan.cursor(),
                    "scan interrupted"
                );
                self.pending.insert(slot, scan);
                Err(e)
            }
        }
    }

    /// Rebuild a node from the server
    ///
    /// A prefix node is cleared and rescanned with `<prefix>*`; if nothing
    /// comes back it is marked removed and pruned. A key node is checked with
    /// `TYPE`: a vanished key is pruned, an existing one loses its tombstone.
    pub fn reload(&mut self, node: NodeRef) -> Result<()> {
        self.with_retry("reload", |b| b.reload_once(node))
    }

    fn reload_once(&mut self, node: NodeRef) -> Result<()> {
        self.select_once(node.db)?;

        let tree = self.tree_of(node.db)?;
        let current = tree.node(node.id).ok_or_else(stale_handle)?;
        let is_prefix = node.id == tree.root() || current.key().ends_with(tree.delimiter());
        let key = current.key().to_string();
        tracing::debug!(%key, is_prefix, "reload");

        if !is_prefix {
            let kind = KeyType::parse(&self.client()?.key_type(&key)?);
            let tree = self.tree_mut(node.db)?;
            if kind == KeyType::None {
                tree.set_removed(node.id, true);
                tree.remove(node.id);
            } else {
                tree.set_removed(node.id, false);
            }
            return Ok(());
        }

        self.scan_into(node.db, node.id)?;
        let tree = self.tree_mut(node.db)?;
        if node.id != tree.root() && !tree.has_child(node.id) {
            tracing::debug!(%key, "prefix is empty, pruning");
            tree.set_removed(node.id, true);
            tree.remove(node.id);
        }
        Ok(())
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Fetch and decode the value of `key` in the selected database
    ///
    /// None when the key does not exist.
    pub fn get_value(&mut self, key: &str) -> Result<Option<Value>> {
        self.with_retry("get", |b| b.fetch_value(key))
    }

    /// Fetch the value behind a tree node, selecting its database first
    ///
    /// Tombstoned nodes yield None without a round trip.
    pub fn value_of(&mut self, node: NodeRef) -> Result<Option<Value>> {
        let tree = self.tree_of(node.db)?;
        if tree.is_removed(node.id) {
            return Ok(None);
        }
        let key = tree.node(node.id).ok_or_else(stale_handle)?.key().to_string();
        self.with_retry("get", |b| {
            b.select_once(node.db)?;
            b.fetch_value(&key)
        })
    }

    fn fetch_value(&mut self, key: &str) -> Result<Option<Value>> {
        let client = self.client()?;
        let value = match KeyType::parse(&client.key_type(key)?) {
            KeyType::String => client.get(key)?.map(|data| Value::from_bytes(&data)),
            KeyType::Hash => Some(Value::Hash(client.hgetall(key)?)),
            KeyType::Set => Some(Value::Set(client.smembers(key)?)),
            KeyType::List => Some(Value::List(client.lrange_all(key)?)),
            KeyType::None => None,
            KeyType::Other(kind) => Some(Value::Unsupported(kind)),
        };
        Ok(value)
    }

    // =========================================================================
    // Mutations (never retried)
    // =========================================================================

    /// `SET` a string value on a key node
    ///
    /// Prefix nodes are rejected: they have no key of their own on the server.
    pub fn set_value(&mut self, node: NodeRef, value: &str) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        let key = self.key_of(node)?;
        self.ensure_session()?;
        self.select_once(node.db)?;
        self.client()?.set(&key, value)?;
        self.tree_mut(node.db)?.set_removed(node.id, false);
        tracing::info!(%key, bytes = value.len(), "value updated");
        Ok(())
    }

    /// Delete a node's key and every key beneath it
    pub fn delete(&mut self, node: NodeRef) -> Result<DeleteOutcome> {
        self.delete_cancellable(node, &AtomicBool::new(false))
    }

    /// Delete a node's subtree, checking `cancel` before every key
    ///
    /// The node goes first, then its descendants in pre-order. Deleted nodes
    /// stay in the tree as tombstones until the next reload.
    pub fn delete_cancellable(
        &mut self,
        node: NodeRef,
        cancel: &AtomicBool,
    ) -> Result<DeleteOutcome> {
        let span = self.span.clone();
        let _entered = span.enter();

        let tree = self.tree_of(node.db)?;
        if node.id == tree.root() {
            return Err(KeyscopeError::InvalidArgument(
                "database roots are flushed, not deleted".to_string(),
            ));
        }
        if !tree.contains(node.id) {
            return Err(stale_handle());
        }
        let mut targets = vec![node.id];
        targets.extend(tree.descendants(node.id));

        self.ensure_session()?;
        self.select_once(node.db)?;
        let client = match self.client.as_mut() {
            Some(client) if client.is_connected() => client,
            _ => return Err(KeyscopeError::NotConnected),
        };
        let tree = &mut self.databases[node.db];

        let mut outcome = DeleteOutcome::default();
        for id in targets {
            if cancel.load(Ordering::Relaxed) {
                outcome.cancelled = true;
                break;
            }
            let Some(target) = tree.node(id) else {
                continue;
            };
            if target.is_removed() {
                continue;
            }
            let key = target.key().to_string();
            outcome.deleted += client.del(&key)?;
            outcome.issued += 1;
            tree.set_removed(id, true);
        }

        tracing::info!(
            issued = outcome.issued,
            deleted = outcome.deleted,
            cancelled = outcome.cancelled,
            "delete finished"
        );
        Ok(outcome)
    }

    /// `FLUSHDB` the database whose root is `node` and empty its tree
    pub fn flush_db(&mut self, node: NodeRef) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        if node.id != self.tree_of(node.db)?.root() {
            return Err(KeyscopeError::InvalidArgument(
                "flush_db takes a database root".to_string(),
            ));
        }
        self.ensure_session()?;
        self.select_once(node.db)?;
        self.client()?.flushdb()?;

        let tree = self.tree_mut(node.db)?;
        let root = tree.root();
        tree.clear_children(root);
        tree.set_count(root, 0);
        self.pending.retain(|(db, _), _| *db != node.db);
        tracing::info!(db = node.db, "database flushed");
        Ok(())
    }

    /// `RENAME` a key and update its node in place
    ///
    /// The node is not moved, even when `new_key` belongs to another branch;
    /// a reload of the affected prefixes shows the new layout.
    pub fn rename(&mut self, node: NodeRef, new_key: &str) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        let old_key = self.key_of(node)?;
        if old_key == new_key {
            return Ok(());
        }
        if new_key.is_empty() {
            return Err(KeyscopeError::InvalidArgument("empty key".to_string()));
        }

        self.ensure_session()?;
        self.select_once(node.db)?;
        self.client()?.rename(&old_key, new_key)?;
        self.tree_mut(node.db)?.rename(node.id, new_key);
        tracing::info!(from = %old_key, to = %new_key, "key renamed");
        Ok(())
    }

    /// Send a user-typed command line verbatim
    pub fn exec(&mut self, line: &str) -> Result<Reply> {
        let span = self.span.clone();
        let _entered = span.enter();

        let command = Command::parse_line(line)
            .ok_or_else(|| KeyscopeError::InvalidArgument("empty command".to_string()))?;
        self.ensure_session()?;
        tracing::debug!(command = %command.name(), "pass-through");
        self.client()?.call(&command)
    }

    /// Key of a leaf node; roots and prefix nodes have none
    fn key_of(&self, node: NodeRef) -> Result<String> {
        let tree = self.tree_of(node.db)?;
        if node.id == tree.root() {
            return Err(KeyscopeError::InvalidArgument(
                "a database root has no key".to_string(),
            ));
        }
        let key = tree.node(node.id).ok_or_else(stale_handle)?.key();
        if tree.can_expand(node.id) || key.ends_with(tree.delimiter()) {
            return Err(KeyscopeError::InvalidArgument(format!(
                "{:?} is a prefix, not a key",
                key
            )));
        }
        Ok(key.to_string())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        self.close();
    }
}

fn stale_handle() -> KeyscopeError {
    KeyscopeError::InvalidArgument("stale node handle".to_string())
}
