//! Protocol Module
//!
//! RESP2 framing for client-server communication.
//!
//! ## Wire Format
//!
//! Every message starts with a type byte and ends its header line with CRLF.
//! ```text
//! +OK\r\n                      simple string
//! -ERR unknown command\r\n     error
//! :42\r\n                      integer
//! $5\r\nhello\r\n              bulk string ($-1 is nil)
//! *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n   array of objects (recursive)
//! ```
//!
//! ### Requests
//! A command is always sent as an array of bulk strings:
//! ```text
//! ┌────────────┬──────────────────┬──────────────────┬─────┐
//! │ *<argc>\r\n│ $<len>\r\n<arg0> │ $<len>\r\n<arg1> │ ... │
//! └────────────┴──────────────────┴──────────────────┴─────┘
//! ```

mod codec;
mod command;
mod object;
mod reply;

pub use codec::{
    encode_command, encode_object, read_object, write_command, MAX_BULK_LEN, MAX_DEPTH,
};
pub use command::Command;
pub use object::{Object, ObjectKind};
pub use reply::Reply;
