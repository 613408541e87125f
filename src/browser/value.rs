//! Decoded key values

use std::fmt;

use crate::classify::{encode_to_hex, is_text};

/// Type of a stored key as reported by `TYPE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyType {
    String,
    List,
    Set,
    Hash,
    /// The key does not exist
    None,
    /// zset, stream, module types
    Other(String),
}

impl KeyType {
    pub fn parse(name: &str) -> Self {
        match name {
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "hash" => KeyType::Hash,
            "none" => KeyType::None,
            other => KeyType::Other(other.to_string()),
        }
    }
}

/// A value ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// String payload that reads as text
    Text(String),

    /// String payload that looks binary, rendered as `\xHH` escapes
    HexBlob(String),

    /// List elements in order
    List(Vec<String>),

    /// Set members in server order
    Set(Vec<String>),

    /// Hash field/value pairs
    Hash(Vec<(String, String)>),

    /// A type the browser does not decode, by name
    Unsupported(String),
}

impl Value {
    /// Classify a string payload as text or binary
    pub fn from_bytes(data: &[u8]) -> Self {
        if is_text(data) {
            Value::Text(String::from_utf8_lossy(data).into_owned())
        } else {
            Value::HexBlob(encode_to_hex(data))
        }
    }

    /// Size shown next to the preview: bytes for strings, rows otherwise
    pub fn len(&self) -> usize {
        match self {
            Value::Text(text) => text.len(),
            Value::HexBlob(hex) => hex.len() / 4,
            Value::List(items) | Value::Set(items) => items.len(),
            Value::Hash(pairs) => pairs.len(),
            Value::Unsupported(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for the two string renderings
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Text(_) | Value::HexBlob(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) | Value::HexBlob(text) => f.write_str(text),
            Value::List(items) | Value::Set(items) => {
                if items.is_empty() {
                    return f.write_str("(empty list or set)");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {:?}", i + 1, item)?;
                }
                Ok(())
            }
            Value::Hash(pairs) => {
                if pairs.is_empty() {
                    return f.write_str("(empty hash)");
                }
                for (i, (field, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {:?} => {:?}", i + 1, field, value)?;
                }
                Ok(())
            }
            Value::Unsupported(kind) => write!(f, "{} is not supported", kind),
        }
    }
}
