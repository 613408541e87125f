//! Error types for keyscope
//!
//! Provides a unified error type for the codec, the client and the browser.

use thiserror::Error;

/// Result type alias using KeyscopeError
pub type Result<T> = std::result::Result<T, KeyscopeError>;

/// Unified error type for keyscope operations
#[derive(Debug, Error)]
pub enum KeyscopeError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    /// Dial failure, timeout, reset or premature end of stream.
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Malformed framing. The connection that produced it is never reused.
    #[error("Protocol syntax error: {0}")]
    ProtocolSyntax(String),

    #[error("Not connected")]
    NotConnected,

    // -------------------------------------------------------------------------
    // Reply Errors
    // -------------------------------------------------------------------------
    /// Error reply returned by the server; the connection stays usable.
    #[error("(error) {0}")]
    Command(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("(empty list or set)")]
    EmptyList,

    // -------------------------------------------------------------------------
    // Scan Errors
    // -------------------------------------------------------------------------
    /// The cursor loop stopped before the server returned cursor "0".
    /// `cursor` is where the next attempt resumes.
    #[error("Scan incomplete at cursor {cursor}: {source}")]
    ScanIncomplete {
        cursor: String,
        #[source]
        source: Box<KeyscopeError>,
    },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Task Errors
    // -------------------------------------------------------------------------
    /// A background task ended without reporting a result (it panicked).
    #[error("Background task aborted")]
    TaskAborted,
}

impl KeyscopeError {
    /// True for failures that a fresh connection may cure.
    ///
    /// Server error replies are never retryable: the server understood the
    /// request and refused it.
    pub fn is_retryable(&self) -> bool {
        match self {
            KeyscopeError::Connection(_)
            | KeyscopeError::ProtocolSyntax(_)
            | KeyscopeError::NotConnected => true,
            KeyscopeError::ScanIncomplete { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// True when the underlying I/O error is a read or write deadline expiry.
    pub fn is_timeout(&self) -> bool {
        match self {
            KeyscopeError::Connection(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            KeyscopeError::ScanIncomplete { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Transport and framing failures leave the stream in an unknown state.
    pub(crate) fn poisons_connection(&self) -> bool {
        matches!(
            self,
            KeyscopeError::Connection(_) | KeyscopeError::ProtocolSyntax(_)
        )
    }
}
