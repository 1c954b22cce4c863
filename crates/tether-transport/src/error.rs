use crate::ConnectionId;

/// Failures a [`Connection`](crate::Connection) can report.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer hung up. Carries whatever detail the transport had.
    #[error("closed by peer ({0})")]
    ConnectionClosed(String),

    /// Local code already called `dispose` on this connection.
    #[error("{0} is disposed")]
    Disposed(ConnectionId),
}
