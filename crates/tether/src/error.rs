//! Unified error type for Tether.

use std::path::PathBuf;

use tether_protocol::ProtocolError;
use tether_scene::SceneError;
use tether_sync::SyncError;
use tether_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// Each variant has a `From` impl, so `?` lifts a layer error into this
/// one without ceremony.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// Buffer or connection failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Framing or payload failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Registry, identity or send-context failure.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Ownership or placement rule broken.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_protocol::NetworkId;
    use tether_transport::ConnectionId;

    #[test]
    fn test_from_transport_error() {
        let err: TetherError = TransportError::Disposed(ConnectionId::new(4)).into();
        assert!(matches!(err, TetherError::Transport(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: TetherError = ProtocolError::UnknownTag("wave".into()).into();
        assert!(matches!(err, TetherError::Protocol(_)));
        assert!(err.to_string().contains("wave"));
    }

    #[test]
    fn test_from_scene_error() {
        let err: TetherError = SceneError::DuplicateName("Ball".into()).into();
        assert!(matches!(err, TetherError::Scene(_)));
    }

    #[test]
    fn test_from_sync_error() {
        let err: TetherError = SyncError::TargetNotPlaced(NetworkId(3)).into();
        assert!(matches!(err, TetherError::Sync(_)));
    }

    #[test]
    fn test_io_error_names_the_path() {
        let err = TetherError::Io {
            path: PathBuf::from("peer.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("peer.json"));
    }
}
