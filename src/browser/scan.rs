//! Cursor-driven key scan
//!
//! A `KeyScan` owns the progress of one `SCAN ... MATCH <pattern>` loop so a
//! failed loop can pick up from the last cursor the server handed out.

use crate::error::{KeyscopeError, Result};
use crate::network::Client;

/// Cursor value that starts a scan and, when returned, ends it
pub const SCAN_DONE: &str = "0";

/// Progress of one cursor loop
#[derive(Debug, Clone)]
pub struct KeyScan {
    pattern: String,
    cursor: String,
    batch: usize,
    started: bool,
    rounds: usize,
    keys_seen: usize,
}

impl KeyScan {
    pub fn new(pattern: impl Into<String>, batch: usize) -> Self {
        Self {
            pattern: pattern.into(),
            cursor: SCAN_DONE.to_string(),
            batch: batch.max(1),
            started: false,
            rounds: 0,
            keys_seen: 0,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Cursor the next round will send
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// True only after the server returned cursor "0"
    pub fn is_complete(&self) -> bool {
        self.started && self.cursor == SCAN_DONE
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Keys received so far, duplicates included
    pub fn keys_seen(&self) -> usize {
        self.keys_seen
    }

    /// Issue one SCAN round and advance the cursor
    ///
    /// A complete scan yields no further keys.
    pub fn step(&mut self, client: &mut Client) -> Result<Vec<String>> {
        if self.is_complete() {
            return Ok(Vec::new());
        }
        let page = client.scan(&self.cursor, &self.pattern, self.batch)?;

        self.started = true;
        self.cursor = page.cursor;
        self.rounds += 1;
        self.keys_seen += page.keys.len();
        Ok(page.keys)
    }

    /// Loop until the terminal cursor, handing every key to `sink`
    ///
    /// Returns the number of keys delivered by this call. On failure the
    /// error is wrapped in `ScanIncomplete` carrying the cursor to resume at;
    /// keys from rounds that did complete have already been delivered.
    pub fn run<F>(&mut self, client: &mut Client, mut sink: F) -> Result<usize>
    where
        F: FnMut(&str),
    {
        let mut delivered = 0;
        while !self.is_complete() {
            let keys = self.step(client).map_err(|e| KeyscopeError::ScanIncomplete {
                cursor: self.cursor.clone(),
                source: Box::new(e),
            })?;
            delivered += keys.len();
            for key in &keys {
                sink(key);
            }
        }
        Ok(delivered)
    }
}

/// Escape glob metacharacters so a key prefix matches literally
pub fn escape_pattern(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `MATCH` pattern for every key under `prefix`
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = escape_pattern(prefix);
    pattern.push('*');
    pattern
}
