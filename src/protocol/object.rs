//! Decoded RESP2 values.

use bytes::Bytes;

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// +OK style status line
    SimpleString(Bytes),

    /// -ERR ... reply, message without the leading type byte
    Error(String),

    /// :123
    Integer(i64),

    /// $<len> payload, binary safe
    BulkString(Bytes),

    /// *<count> nested objects; *-1 decodes to an empty array
    Array(Vec<Object>),

    /// $-1
    Nil,
}

/// Type tag of an [`Object`], for logging and mismatch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    SimpleString,
    Error,
    Integer,
    BulkString,
    Array,
    Nil,
}

impl Object {
    /// Get the type tag
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::SimpleString(_) => ObjectKind::SimpleString,
            Object::Error(_) => ObjectKind::Error,
            Object::Integer(_) => ObjectKind::Integer,
            Object::BulkString(_) => ObjectKind::BulkString,
            Object::Array(_) => ObjectKind::Array,
            Object::Nil => ObjectKind::Nil,
        }
    }

    /// Convenience constructor for a bulk string
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Object::BulkString(data.into())
    }

    /// Convenience constructor for a status line
    pub fn simple(text: &str) -> Self {
        Object::SimpleString(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::SimpleString => "simple string",
            ObjectKind::Error => "error",
            ObjectKind::Integer => "integer",
            ObjectKind::BulkString => "bulk string",
            ObjectKind::Array => "array",
            ObjectKind::Nil => "nil",
        };
        f.write_str(name)
    }
}
