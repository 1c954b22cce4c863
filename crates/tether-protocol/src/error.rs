//! Error types for the protocol layer.
//!
//! Everything here is a framing or decoding failure. Whether a well-formed
//! message is *allowed* (ownership rules) is decided higher up.

/// Errors that can occur while framing or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer is shorter than the fixed `(objectId, componentId)` header.
    #[error("message too short for header: {len} bytes")]
    TruncatedHeader { len: usize },

    /// The message buffer is shared, so its header can't be rewritten.
    #[error("message buffer is shared and cannot be modified")]
    BufferShared,

    /// A text payload was not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The leading type tag does not name a known payload.
    #[error("unknown message type {0:?}")]
    UnknownTag(String),

    /// The payload has the wrong number of `$`-separated fields.
    #[error("{tag}: expected {expected} fields, found {found}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },

    /// One field failed to parse.
    #[error("{tag}: field {index} is invalid: {reason}")]
    InvalidField {
        tag: &'static str,
        index: usize,
        reason: String,
    },

    /// Serializing a structured value failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserializing a JSON payload failed.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
