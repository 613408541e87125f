//! Protocol Client
//!
//! One request, one reply, over a persistent TCP stream.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::Span;

use crate::config::Config;
use crate::error::{KeyscopeError, Result};
use crate::protocol::{read_object, write_command, Command, Reply};

/// Buffered halves of one TCP stream
struct Transport {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer, flushed after every command
    writer: BufWriter<TcpStream>,
}

/// Blocking client for a single server connection
///
/// Not internally synchronized: at most one request is in flight and the
/// caller serializes access. The client never reconnects or retries; after a
/// transport or framing failure it drops the stream and every further call
/// fails with `NotConnected`.
pub struct Client {
    transport: Option<Transport>,

    /// Database index the server session is on, as far as we know
    db_index: usize,

    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,

    /// Peer address for logging
    peer_addr: String,

    pub(super) span: Span,
}

impl Client {
    /// Dial the configured address, apply timeouts and authenticate
    pub fn connect(config: &Config, span: Span) -> Result<Self> {
        let addr = resolve(&config.addr)?;
        let stream = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };

        let mut client = Self::from_stream(stream, config, span)?;
        if let Some(auth) = config.auth.as_deref() {
            client.auth(auth)?;
        }
        Ok(client)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, config: &Config, span: Span) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Requests are small and strictly alternating with replies.
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        let mut client = Self {
            transport: Some(Transport {
                reader: BufReader::with_capacity(32 * 1024, read_stream),
                writer: BufWriter::new(write_stream),
            }),
            db_index: 0,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            peer_addr,
            span,
        };
        client.apply_timeouts(client.read_timeout, client.write_timeout)?;

        let _entered = client.span.enter();
        tracing::debug!(peer = %client.peer_addr, "connected");
        drop(_entered);

        Ok(client)
    }

    /// Send one command and wait for its reply
    ///
    /// Error replies come back as `Ok` so a REPL can print them; use
    /// [`Reply::into_result`] to turn them into `KeyscopeError::Command`.
    pub fn call(&mut self, command: &Command) -> Result<Reply> {
        self.exchange(command)
    }

    /// Like [`call`](Self::call) with a deadline for this call only
    ///
    /// The deadline bounds the write and the read separately. The configured
    /// defaults are restored afterwards.
    pub fn call_with_timeout(
        &mut self,
        command: &Command,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        let Some(timeout) = timeout else {
            return self.call(command);
        };

        self.apply_timeouts(Some(timeout), Some(timeout))?;
        let reply = self.exchange(command);
        if self.transport.is_some() {
            self.apply_timeouts(self.read_timeout, self.write_timeout)?;
        }
        reply
    }

    /// Database index of the session, tracked from successful SELECTs
    pub fn db_index(&self) -> usize {
        self.db_index
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Shut the stream down. Idempotent.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            let _ = transport
                .writer
                .get_ref()
                .shutdown(std::net::Shutdown::Both);
            let _entered = self.span.enter();
            tracing::debug!(peer = %self.peer_addr, "connection closed");
        }
    }

    fn exchange(&mut self, command: &Command) -> Result<Reply> {
        if command.is_empty() {
            return Err(KeyscopeError::InvalidArgument("empty command".to_string()));
        }
        let transport = self.transport.as_mut().ok_or(KeyscopeError::NotConnected)?;

        let _entered = self.span.enter();
        tracing::trace!(command = %command.name(), argc = command.args().len(), "send");

        let result = write_command(&mut transport.writer, command.args())
            .and_then(|_| read_object(&mut transport.reader));

        let reply = match result {
            Ok(object) => Reply::new(object),
            Err(e) => {
                if e.poisons_connection() {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "dropping connection");
                    drop(_entered);
                    self.transport = None;
                }
                return Err(e);
            }
        };

        if let Some(index) = command.select_target() {
            if reply.is_ok_status() {
                tracing::debug!(from = self.db_index, to = index, "database selected");
                self.db_index = index;
            }
        }

        Ok(reply)
    }

    fn apply_timeouts(&mut self, read: Option<Duration>, write: Option<Duration>) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(KeyscopeError::NotConnected)?;
        // A zero duration is rejected by the OS API; treat it as "no deadline".
        let read = read.filter(|d| !d.is_zero());
        let write = write.filter(|d| !d.is_zero());
        transport.reader.get_ref().set_read_timeout(read)?;
        transport.writer.get_ref().set_write_timeout(write)?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| KeyscopeError::Config(format!("cannot resolve {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| KeyscopeError::Config(format!("no address for {}", addr)))
}
