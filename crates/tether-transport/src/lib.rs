//! Transport contract for Tether.
//!
//! Provides the [`Connection`] trait that every transport plugs into, the
//! pooled [`MessageBuffer`] that travels through it, and an in-process
//! [`ChannelConnection`] for wiring peers together without sockets.
//!
//! Connections are *polled*: the dispatcher calls [`Connection::receive`]
//! once per pending message during its tick and never waits on it. Socket
//! handling, reliability and handshakes belong to the concrete transport,
//! not to this crate.
//!
//! # Feature Flags
//!
//! - `channel` (default): in-process connection pairs via `tokio::sync::mpsc`

mod buffer;
#[cfg(feature = "channel")]
mod channel;
mod error;

pub use buffer::{
    BufferPool, MessageBuffer, DEFAULT_BUFFER_CAPACITY, DEFAULT_RETAINED_BUFFERS,
};
#[cfg(feature = "channel")]
pub use channel::ChannelConnection;
pub use error::TransportError;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Names one connection in logs and errors. Carries no routing meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Hands out ids that are unique within this process.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single link to a remote peer that moves whole messages.
///
/// Implementations must preserve send order (FIFO) on a single connection.
/// Nothing is promised about ordering across different connections.
pub trait Connection: 'static {
    /// Queues a message for the remote peer.
    ///
    /// The connection takes one reference to the buffer and releases it
    /// once the bytes have been handed off.
    fn send(&mut self, message: MessageBuffer) -> Result<(), TransportError>;

    /// Returns the next pending message, or `Ok(None)` if nothing is
    /// waiting. Must return immediately.
    fn receive(&mut self) -> Result<Option<MessageBuffer>, TransportError>;

    /// Tears the connection down. Calling it more than once is harmless.
    fn dispose(&mut self) -> Result<(), TransportError>;

    /// Label used when this connection shows up in logs.
    fn id(&self) -> ConnectionId;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn send(&mut self, message: MessageBuffer) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn receive(&mut self) -> Result<Option<MessageBuffer>, TransportError> {
        (**self).receive()
    }

    fn dispose(&mut self) -> Result<(), TransportError> {
        (**self).dispose()
    }

    fn id(&self) -> ConnectionId {
        (**self).id()
    }
}
