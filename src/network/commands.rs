//! Typed commands
//!
//! The fixed set of commands the browser issues, each checking the reply
//! shape it expects.

use crate::error::{KeyscopeError, Result};
use crate::protocol::{Command, Reply};

use super::Client;

/// One SCAN round: the next cursor and the keys of this batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: String,
    pub keys: Vec<String>,
}

impl Client {
    /// Send a command and fail on an error reply
    pub fn call_checked(&mut self, command: &Command) -> Result<Reply> {
        self.call(command)?.into_result()
    }

    pub fn auth(&mut self, credential: &str) -> Result<()> {
        let reply = self.call_checked(&Command::new("AUTH").arg(credential))?;
        self.span.in_scope(|| tracing::debug!(reply = %reply, "authenticated"));
        Ok(())
    }

    /// Number of logical databases (`CONFIG GET databases`)
    pub fn config_databases(&mut self) -> Result<usize> {
        let reply = self.call_checked(&Command::new("CONFIG").arg("GET").arg("databases"))?;
        let pair = reply.as_list()?;
        let value = pair.get(1).ok_or_else(|| {
            KeyscopeError::UnexpectedReply("CONFIG GET databases returned no value".to_string())
        })?;
        value.parse().map_err(|_| {
            KeyscopeError::UnexpectedReply(format!("databases is not a number: {}", value))
        })
    }

    /// `SCAN <cursor> MATCH <pattern> COUNT <count>`
    pub fn scan(&mut self, cursor: &str, pattern: &str, count: usize) -> Result<ScanPage> {
        let command = Command::new("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count);
        let parts = self.call_checked(&command)?.into_sub_replies()?;
        let [cursor, keys]: [Reply; 2] = parts.try_into().map_err(|parts: Vec<Reply>| {
            KeyscopeError::UnexpectedReply(format!(
                "SCAN returned {} elements, expected 2",
                parts.len()
            ))
        })?;

        let cursor = cursor.as_string()?;
        let keys = list_or_empty(&keys)?;
        self.span.in_scope(|| {
            tracing::trace!(%pattern, next = %cursor, batch = keys.len(), "scan round");
        });
        Ok(ScanPage { cursor, keys })
    }

    /// `KEYS <pattern>`, single shot. Only sensible on small datasets.
    pub fn keys(&mut self, pattern: &str) -> Result<Vec<String>> {
        let reply = self.call_checked(&Command::new("KEYS").arg(pattern))?;
        list_or_empty(&reply)
    }

    /// `SELECT <index>`; the session shadow is updated by `call`
    pub fn select(&mut self, index: usize) -> Result<()> {
        let reply = self.call_checked(&Command::new("SELECT").arg(index))?;
        if !reply.is_ok_status() {
            return Err(KeyscopeError::UnexpectedReply(format!(
                "SELECT replied {}",
                reply
            )));
        }
        Ok(())
    }

    /// `TYPE <key>`, e.g. "string", "hash" or "none"
    pub fn key_type(&mut self, key: &str) -> Result<String> {
        self.call_checked(&Command::new("TYPE").arg(key))?.as_string()
    }

    /// `GET <key>`; None when the key is gone
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let reply = self.call_checked(&Command::new("GET").arg(key))?;
        if reply.is_nil() {
            return Ok(None);
        }
        reply
            .as_bytes()
            .map(|data| Some(data.to_vec()))
            .ok_or_else(|| KeyscopeError::UnexpectedReply(format!("GET replied {}", reply)))
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.call_checked(&Command::new("SET").arg(key).arg(value))?;
        Ok(())
    }

    /// `HGETALL <key>` as field/value pairs
    pub fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>> {
        let flat = list_or_empty(&self.call_checked(&Command::new("HGETALL").arg(key))?)?;
        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    pub fn smembers(&mut self, key: &str) -> Result<Vec<String>> {
        list_or_empty(&self.call_checked(&Command::new("SMEMBERS").arg(key))?)
    }

    /// `LRANGE <key> 0 -1`
    pub fn lrange_all(&mut self, key: &str) -> Result<Vec<String>> {
        list_or_empty(&self.call_checked(&Command::new("LRANGE").arg(key).arg(0).arg(-1))?)
    }

    pub fn rename(&mut self, key: &str, new_key: &str) -> Result<()> {
        self.call_checked(&Command::new("RENAME").arg(key).arg(new_key))?;
        Ok(())
    }

    /// `DEL <key>`; returns how many keys the server removed
    pub fn del(&mut self, key: &str) -> Result<i64> {
        self.call_checked(&Command::new("DEL").arg(key))?.as_int()
    }

    /// `FLUSHDB` on the selected database
    pub fn flushdb(&mut self) -> Result<()> {
        self.call_checked(&Command::new("FLUSHDB"))?;
        Ok(())
    }
}

/// `as_list`, but an empty array is a valid empty result here
fn list_or_empty(reply: &Reply) -> Result<Vec<String>> {
    match reply.as_list() {
        Err(KeyscopeError::EmptyList) => Ok(Vec::new()),
        other => other,
    }
}
