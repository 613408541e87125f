//! Protocol codec
//!
//! Encoding and decoding functions for the RESP2 wire protocol.
//!
//! ## Decoding
//! ```text
//! ┌──────────┬─────────────────────┬──────┐
//! │ Type (1) │ Line payload        │ CRLF │   + - :   (value is the line)
//! ├──────────┼─────────────────────┼──────┤
//! │   '$'    │ Length              │ CRLF │   followed by <len> bytes + CRLF
//! ├──────────┼─────────────────────┼──────┤
//! │   '*'    │ Count               │ CRLF │   followed by <count> objects
//! └──────────┴─────────────────────┴──────┘
//! ```
//!
//! A read either yields a whole object or an error. Once an error is returned
//! the stream position is unspecified and the caller must drop the stream.

use std::io::{BufRead, Read, Write};

use bytes::Bytes;

use super::Object;
use crate::error::{KeyscopeError, Result};

/// Largest bulk string accepted (the server-side proto-max-bulk-len default)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted
pub const MAX_DEPTH: usize = 64;

/// Longest header or status line accepted, CRLF included
const MAX_LINE_LEN: u64 = 1024 * 1024;

const CRLF: &[u8] = b"\r\n";

// =============================================================================
// Command Encoding
// =============================================================================

/// Encode a command as an array of bulk strings
///
/// Format: `*<argc>\r\n` then `$<len>\r\n<arg>\r\n` per argument
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], out: &mut Vec<u8>) {
    out.push(b'*');
    out.extend_from_slice(args.len().to_string().as_bytes());
    out.extend_from_slice(CRLF);
    for arg in args {
        encode_bulk(arg.as_ref(), out);
    }
}

/// Write a command to a stream
///
/// The whole frame is encoded first, then written and flushed in one go.
pub fn write_command<W: Write, A: AsRef<[u8]>>(writer: &mut W, args: &[A]) -> Result<()> {
    if args.is_empty() {
        return Err(KeyscopeError::InvalidArgument("empty command".to_string()));
    }
    let payload: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
    let mut frame = Vec::with_capacity(16 + payload);
    encode_command(args, &mut frame);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Object Encoding
// =============================================================================

/// Encode any object, as a server would send it
pub fn encode_object(object: &Object, out: &mut Vec<u8>) {
    match object {
        Object::SimpleString(text) => {
            out.push(b'+');
            out.extend_from_slice(text);
            out.extend_from_slice(CRLF);
        }
        Object::Error(message) => {
            out.push(b'-');
            out.extend_from_slice(message.as_bytes());
            out.extend_from_slice(CRLF);
        }
        Object::Integer(value) => {
            out.push(b':');
            out.extend_from_slice(value.to_string().as_bytes());
            out.extend_from_slice(CRLF);
        }
        Object::BulkString(data) => encode_bulk(data, out),
        Object::Array(items) => {
            out.push(b'*');
            out.extend_from_slice(items.len().to_string().as_bytes());
            out.extend_from_slice(CRLF);
            for item in items {
                encode_object(item, out);
            }
        }
        Object::Nil => out.extend_from_slice(b"$-1\r\n"),
    }
}

fn encode_bulk(data: &[u8], out: &mut Vec<u8>) {
    out.push(b'$');
    out.extend_from_slice(data.len().to_string().as_bytes());
    out.extend_from_slice(CRLF);
    out.extend_from_slice(data);
    out.extend_from_slice(CRLF);
}

// =============================================================================
// Object Decoding
// =============================================================================

/// Read one complete object from a stream
///
/// Blocks until the object is complete or an error occurs.
pub fn read_object<R: BufRead>(reader: &mut R) -> Result<Object> {
    read_object_at(reader, 0)
}

fn read_object_at<R: BufRead>(reader: &mut R, depth: usize) -> Result<Object> {
    if depth > MAX_DEPTH {
        return Err(KeyscopeError::ProtocolSyntax(format!(
            "array nesting deeper than {}",
            MAX_DEPTH
        )));
    }

    let line = read_line(reader)?;
    let (&type_byte, rest) = line
        .split_first()
        .ok_or_else(|| KeyscopeError::ProtocolSyntax("empty line".to_string()))?;

    match type_byte {
        b'+' => Ok(Object::SimpleString(Bytes::copy_from_slice(rest))),
        b'-' => Ok(Object::Error(String::from_utf8_lossy(rest).into_owned())),
        b':' => Ok(Object::Integer(parse_number(rest, "integer")?)),
        b'$' => {
            let len = parse_number(rest, "bulk length")?;
            read_bulk(reader, len)
        }
        b'*' => {
            let count = parse_number(rest, "array count")?;
            read_array(reader, count, depth)
        }
        other => Err(KeyscopeError::ProtocolSyntax(format!(
            "unknown type byte 0x{:02x}",
            other
        ))),
    }
}

/// Read a bulk payload of `len` bytes plus its CRLF terminator
fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> Result<Object> {
    if len == -1 {
        return Ok(Object::Nil);
    }
    if !(0..=MAX_BULK_LEN).contains(&len) {
        return Err(KeyscopeError::ProtocolSyntax(format!(
            "invalid bulk length {}",
            len
        )));
    }

    let len = len as usize;
    let mut data = vec![0u8; len + 2];
    reader.read_exact(&mut data)?;
    if &data[len..] != CRLF {
        return Err(KeyscopeError::ProtocolSyntax(
            "bulk string not terminated by CRLF".to_string(),
        ));
    }
    data.truncate(len);
    Ok(Object::BulkString(Bytes::from(data)))
}

/// Read `count` nested objects in order
fn read_array<R: BufRead>(reader: &mut R, count: i64, depth: usize) -> Result<Object> {
    if count == -1 {
        return Ok(Object::Array(Vec::new()));
    }
    if count < 0 {
        return Err(KeyscopeError::ProtocolSyntax(format!(
            "invalid array count {}",
            count
        )));
    }

    // The count comes off the wire; do not trust it for the allocation.
    let mut items = Vec::with_capacity((count as usize).min(1024));
    for _ in 0..count {
        items.push(read_object_at(reader, depth + 1)?);
    }
    Ok(Object::Array(items))
}

/// Read one CRLF terminated line, returned without the terminator
fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let read = reader.by_ref().take(MAX_LINE_LEN).read_until(b'\n', &mut line)?;

    if read == 0 || line.last() != Some(&b'\n') {
        if read as u64 >= MAX_LINE_LEN {
            return Err(KeyscopeError::ProtocolSyntax(format!(
                "line longer than {} bytes",
                MAX_LINE_LEN
            )));
        }
        return Err(KeyscopeError::Connection(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "stream ended inside a reply",
        )));
    }
    if line.len() < 2 || line[line.len() - 2] != b'\r' {
        return Err(KeyscopeError::ProtocolSyntax(
            "line not terminated by CRLF".to_string(),
        ));
    }

    line.truncate(line.len() - 2);
    Ok(line)
}

fn parse_number(digits: &[u8], what: &str) -> Result<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            KeyscopeError::ProtocolSyntax(format!(
                "malformed {}: {:?}",
                what,
                String::from_utf8_lossy(digits)
            ))
        })
}
