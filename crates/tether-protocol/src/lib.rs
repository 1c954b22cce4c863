//! Wire protocol for Tether.
//!
//! Two layers live here:
//!
//! - **Framing** ([`SceneGraphMessage`]) puts an `(objectId, componentId)`
//!   header in front of an opaque payload so the scene can route it.
//! - **Payloads** ([`SyncMessage`], [`Codec`], [`DelimitedCodec`]) are the
//!   typed messages that ownership-aware components exchange, encoded as
//!   `$`-separated text.
//!
//! ```text
//! Transport (MessageBuffer) → Protocol (SceneGraphMessage) → Scene (component)
//! ```
//!
//! The identity types ([`NetworkId`], [`ComponentId`]) and the small
//! geometry types ([`Vec3`], [`Quat`]) are defined here as well, since they
//! appear on the wire.

mod codec;
mod error;
mod message;
mod payload;
mod types;

pub use codec::{from_json_payload, peek_tag, to_json_payload, Codec, DelimitedCodec, DELIMITER};
pub use error::ProtocolError;
pub use message::{SceneGraphMessage, HEADER_LEN};
pub use payload::{RigidbodyState, SnapLink, SyncMessage};
pub use types::{portable_hash, Address, ComponentId, NetworkId, Quat, Vec3};
