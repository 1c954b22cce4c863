//! Error types for the sync layer.

use tether_protocol::{NetworkId, ProtocolError};
use tether_scene::{ComponentError, SceneError};

use crate::{PlacementState, SnapRef};

/// Errors raised by ownership and placement operations.
///
/// Most of these mean the ownership bookkeeping is wrong somewhere. They
/// are returned to direct callers and logged when they happen inside a
/// dispatch tick.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// An owner-only message arrived at the current owner.
    #[error("{object}: received {tag} while holding ownership")]
    ProtocolViolation {
        object: NetworkId,
        tag: &'static str,
    },

    /// A remote replica tried to author state.
    #[error("{object}: {operation} requires ownership")]
    NotOwner {
        object: NetworkId,
        operation: &'static str,
    },

    /// Only the peer that placed an object may remove it.
    #[error("{object}: only the original placer may remove it")]
    NotOriginalOwner { object: NetworkId },

    /// The placement lifecycle does not allow this step.
    #[error("{object}: cannot {operation} while {state}")]
    InvalidState {
        object: NetworkId,
        operation: &'static str,
        state: PlacementState,
    },

    /// Free placement is disabled for this kind of object.
    #[error("{object}: must be snapped to another object")]
    FreePlacementNotAllowed { object: NetworkId },

    /// A detach named an edge that does not exist.
    #[error("{object}: snap {mine} is not attached to {other}")]
    NotAttached {
        object: NetworkId,
        mine: u32,
        other: SnapRef,
    },

    /// A snap index is out of range.
    #[error("{object}: has no snap {index}")]
    InvalidSnap { object: NetworkId, index: u32 },

    /// The snap target is not in the placed-object index.
    #[error("snap target {0} is not placed")]
    TargetNotPlaced(NetworkId),

    /// The snap target is already mutably borrowed.
    #[error("snap target {0} is busy")]
    TargetBusy(NetworkId),

    /// A message kind this component never handles.
    #[error("{object}: unexpected {tag} message")]
    UnexpectedMessage {
        object: NetworkId,
        tag: &'static str,
    },

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<SyncError> for ComponentError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Protocol(inner) => ComponentError::Decode(inner),
            SyncError::ProtocolViolation { .. }
            | SyncError::NotAttached { .. }
            | SyncError::NotOwner { .. }
            | SyncError::InvalidState { .. } => ComponentError::ProtocolViolation(error.to_string()),
            other => ComponentError::Other(Box::new(other)),
        }
    }
}
