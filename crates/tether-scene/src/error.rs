//! Error types for the scene layer.

use tether_protocol::ProtocolError;

/// Errors raised by registration, identity assignment and sending.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Neither the node nor any of its ancestors carries a network identity,
    /// or the object it resolved to has since been destroyed.
    #[error("no network object for {0:?}")]
    NoNetworkObject(String),

    /// The scene a context was bound to no longer exists.
    #[error("network scene has been dropped")]
    SceneDropped,

    /// Two objects asked for an id derived from the same name.
    #[error("an object named {0:?} already has an id")]
    DuplicateName(String),

    /// Another live object in this scene already uses the network id.
    #[error("network id {0} is already held by another object")]
    DuplicateObjectId(tether_protocol::NetworkId),

    /// A component id override was declared for a different type.
    #[error("component id override on {actual} was declared for {declared}")]
    ComponentIdMismatch {
        declared: &'static str,
        actual: &'static str,
    },

    /// A context was used to register a component of a different type.
    #[error("context for component {expected} used to register {found}")]
    ContextMismatch {
        expected: tether_protocol::ComponentId,
        found: tether_protocol::ComponentId,
    },

    /// Random id generation kept colliding with ids already in use.
    #[error("no unused network id found after {0} attempts")]
    IdSpaceExhausted(usize),

    /// Encoding an outgoing payload failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// What a component handler hands back to the dispatcher.
///
/// The dispatcher logs these and moves on; they never escape a tick.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The message breaks the ownership protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    /// The component was already borrowed when the message arrived.
    #[error("component is busy")]
    Busy,

    /// Anything else a handler wants to report.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}
