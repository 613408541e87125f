//! Reply definitions
//!
//! Typed views over one decoded object.

use std::fmt;

use super::Object;
use crate::error::{KeyscopeError, Result};

/// A decoded server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    object: Object,
}

impl Reply {
    /// Wrap a decoded object
    pub fn new(object: Object) -> Self {
        Self { object }
    }

    /// Borrow the underlying object
    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn into_object(self) -> Object {
        self.object
    }

    /// True for `$-1`
    pub fn is_nil(&self) -> bool {
        matches!(self.object, Object::Nil)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.object, Object::Error(_))
    }

    /// True for the `+OK` status line
    pub fn is_ok_status(&self) -> bool {
        matches!(&self.object, Object::SimpleString(text) if text.as_ref() == b"OK")
    }

    /// Turn an error reply into `KeyscopeError::Command`
    pub fn into_result(self) -> Result<Self> {
        match self.object {
            Object::Error(message) => Err(KeyscopeError::Command(message)),
            object => Ok(Self { object }),
        }
    }

    /// Payload of a simple or bulk string, or the message of an error reply
    pub fn as_string(&self) -> Result<String> {
        match &self.object {
            Object::SimpleString(data) | Object::BulkString(data) => {
                Ok(String::from_utf8_lossy(data).into_owned())
            }
            Object::Error(message) => Ok(message.clone()),
            other => Err(mismatch("string", other)),
        }
    }

    /// Raw bytes of a simple or bulk string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.object {
            Object::SimpleString(data) | Object::BulkString(data) => Some(data.as_ref()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match &self.object {
            Object::Integer(value) => Ok(*value),
            other => Err(mismatch("integer", other)),
        }
    }

    /// Flatten an array of strings
    ///
    /// Fails with `EmptyList` on an empty array, so callers can tell
    /// "nothing there" apart from a wrong reply shape.
    pub fn as_list(&self) -> Result<Vec<String>> {
        let items = match &self.object {
            Object::Array(items) => items,
            Object::Error(message) => return Err(KeyscopeError::Command(message.clone())),
            other => return Err(mismatch("array", other)),
        };
        if items.is_empty() {
            return Err(KeyscopeError::EmptyList);
        }

        items
            .iter()
            .map(|item| match item {
                Object::SimpleString(data) | Object::BulkString(data) => {
                    Ok(String::from_utf8_lossy(data).into_owned())
                }
                other => Err(mismatch("array of strings", other)),
            })
            .collect()
    }

    /// Child replies of an array, for walking replies like `[cursor, [keys]]`
    pub fn into_sub_replies(self) -> Result<Vec<Reply>> {
        match self.object {
            Object::Array(items) => Ok(items.into_iter().map(Reply::new).collect()),
            Object::Error(message) => Err(KeyscopeError::Command(message)),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl From<Object> for Reply {
    fn from(object: Object) -> Self {
        Self::new(object)
    }
}

fn mismatch(expected: &str, got: &Object) -> KeyscopeError {
    KeyscopeError::UnexpectedReply(format!("expected {}, got {}", expected, got.kind()))
}

// =============================================================================
// redis-cli style rendering
// =============================================================================

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(&self.object, 0, f)
    }
}

fn render(object: &Object, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match object {
        Object::SimpleString(text) => write!(f, "{}", String::from_utf8_lossy(text)),
        Object::Error(message) => write!(f, "(error) {}", message),
        Object::Integer(value) => write!(f, "(integer) {}", value),
        Object::BulkString(data) => write!(f, "{:?}", String::from_utf8_lossy(data)),
        Object::Nil => f.write_str("(nil)"),
        Object::Array(items) if items.is_empty() => f.write_str("(empty list or set)"),
        Object::Array(items) => {
            let width = items.len().to_string().len();
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                    write!(f, "{:indent$}", "", indent = indent)?;
                }
                write!(f, "{:>width$}) ", i + 1, width = width)?;
                render(item, indent + width + 2, f)?;
            }
            Ok(())
        }
    }
}
