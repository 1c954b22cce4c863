//! In-process connection pairs backed by `tokio::sync::mpsc`.
//!
//! Useful for tests, demos, and for running several peers inside one
//! process. Buffers are handed across without copying.

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::{Connection, ConnectionId, MessageBuffer, TransportError};

/// One end of an in-process, unbounded, ordered message pipe.
pub struct ChannelConnection {
    id: ConnectionId,
    tx: Option<mpsc::UnboundedSender<MessageBuffer>>,
    rx: Option<mpsc::UnboundedReceiver<MessageBuffer>>,
}

impl ChannelConnection {
    /// Creates two connected ends. Whatever one end sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();

        let a = Self {
            id: ConnectionId::next(),
            tx: Some(a_tx),
            rx: Some(a_rx),
        };
        let b = Self {
            id: ConnectionId::next(),
            tx: Some(b_tx),
            rx: Some(b_rx),
        };
        tracing::debug!(a = %a.id, b = %b.id, "created channel connection pair");
        (a, b)
    }

    /// Whether [`dispose`](Connection::dispose) has been called on this end.
    pub fn is_disposed(&self) -> bool {
        self.tx.is_none() && self.rx.is_none()
    }
}

impl Connection for ChannelConnection {
    fn send(&mut self, message: MessageBuffer) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Disposed(self.id))?;
        // On failure the buffer comes back inside the error and is
        // released when the error is dropped.
        tx.send(message).map_err(|_| {
            TransportError::ConnectionClosed(format!("{}: remote end dropped", self.id))
        })
    }

    fn receive(&mut self) -> Result<Option<MessageBuffer>, TransportError> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(None);
        };
        match rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn dispose(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            tracing::debug!(conn = %self.id, "channel connection disposed");
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
