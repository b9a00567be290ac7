//! Connection Handler Module
//!
//! This module handles individual client connections to MangoKV.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split off one line      │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Parse + execute         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Write + flush reply     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error / server shutdown
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! Incoming data accumulates in a `BytesMut`. TCP is a stream, so one read
//! may hold half a line or several lines. Complete lines are split off the
//! front of the buffer and processed strictly in order; each reply is flushed
//! before the next line is looked at.

use crate::commands::CommandHandler;
use crate::connection::shutdown::Shutdown;
use crate::protocol::{find_line_end, Reply};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Default maximum length of a single request line (64 KB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the same loop drives a `TcpStream` in the
/// server and an in-memory mock in tests.
pub struct ConnectionHandler<S> {
    /// The client stream; writes are buffered and flushed per reply
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes read but not yet consumed as complete lines
    buffer: BytesMut,

    /// The command handler (shares the store with every connection)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,

    /// Longest accepted line, excluding the newline
    max_line_length: usize,

    /// Server shutdown signal
    shutdown: Shutdown,

    /// Reused reply serialization buffer
    reply_buf: Vec<u8>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            shutdown: Shutdown::never(),
            reply_buf: Vec::with_capacity(64),
        }
    }

    /// Sets the longest line the client may send before being disconnected.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Makes the handler stop when the server shuts down.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Runs the main connection loop.
    ///
    /// This method reads lines from the client, executes them,
    /// and sends back replies until the client disconnects, an error
    /// occurs, or the server shuts down.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Connection closed for shutdown"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(line) = self.next_line()? {
                let reply = self.command_handler.execute_line(&line);
                self.stats.command_processed();
                self.send_reply(&reply).await?;
            }

            if self.shutdown.is_shutdown() {
                return Ok(());
            }

            self.read_more_data().await?;
        }
    }

    /// Splits the next complete line off the buffer, without its newline.
    ///
    /// A complete line longer than `max_line_length` is rejected before it
    /// is parsed.
    fn next_line(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        let Some(end) = find_line_end(&self.buffer) else {
            return Ok(None);
        };
        if end > self.max_line_length {
            return Err(self.line_too_long(end));
        }

        let frame = self.buffer.split_to(end + 1).freeze();
        trace!(
            client = %self.addr,
            consumed = end + 1,
            remaining = self.buffer.len(),
            "Framed line"
        );
        Ok(Some(frame.slice(..end)))
    }

    fn line_too_long(&self, size: usize) -> ConnectionError {
        warn!(
            client = %self.addr,
            size,
            max = self.max_line_length,
            "Line length limit exceeded"
        );
        ConnectionError::LineTooLong {
            max: self.max_line_length,
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns early without reading if the server is shutting down.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Whatever is buffered holds no newline at this point
        if self.buffer.len() > self.max_line_length {
            return Err(self.line_too_long(self.buffer.len()));
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = tokio::select! {
            res = self.stream.get_mut().read_buf(&mut self.buffer) => res?,
            _ = self.shutdown.recv() => {
                debug!(client = %self.addr, "Closing connection for server shutdown");
                return Ok(());
            }
        };

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes one reply and flushes it to the client.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        self.reply_buf.clear();
        reply.serialize_into(&mut self.reply_buf);

        self.stream.write_all(&self.reply_buf).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(self.reply_buf.len());
        trace!(
            client = %self.addr,
            bytes = self.reply_buf.len(),
            "Sent reply"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// The stream ended in the middle of a line
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The client sent more than `max` bytes without a newline
    #[error("Line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
///
/// # Arguments
///
/// * `stream` - The client stream
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
/// * `max_line_length` - Longest accepted request line
/// * `shutdown` - Server shutdown signal
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    max_line_length: usize,
    shutdown: Shutdown,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats)
        .with_max_line_length(max_line_length)
        .with_shutdown(shutdown);

    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
