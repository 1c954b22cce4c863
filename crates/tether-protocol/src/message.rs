//! Scene-graph message framing.
//!
//! ```text
//! ┌──────────────────┬─────────────────────┬───────────────────┐
//! │ objectId: i32 LE │ componentId: i32 LE │ payload bytes ... │
//! └──────────────────┴─────────────────────┴───────────────────┘
//! ```
//!
//! A [`SceneGraphMessage`] is a typed view over a [`MessageBuffer`]; the
//! header and payload are read in place, never copied out.

use std::fmt;

use tether_transport::{BufferPool, MessageBuffer};

use crate::{Address, ComponentId, NetworkId, ProtocolError};

/// Size of the fixed `(objectId, componentId)` header.
pub const HEADER_LEN: usize = 8;

/// A message addressed to one component of one network object.
pub struct SceneGraphMessage {
    buffer: MessageBuffer,
}

impl SceneGraphMessage {
    /// Interprets a raw buffer as a scene-graph message.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TruncatedHeader`] if the buffer can't hold
    /// the header.
    pub fn from_buffer(buffer: MessageBuffer) -> Result<Self, ProtocolError> {
        if buffer.len() < HEADER_LEN {
            return Err(ProtocolError::TruncatedHeader { len: buffer.len() });
        }
        Ok(Self { buffer })
    }

    /// Rents a buffer sized for `payload_len` bytes and writes the header.
    /// The payload region is zero-filled.
    pub fn rent(pool: &BufferPool, address: Address, payload_len: usize) -> Self {
        let mut buffer = pool.rent(HEADER_LEN + payload_len);
        let bytes = buffer
            .bytes_mut()
            .expect("freshly rented buffer is unshared");
        write_header(bytes, address);
        Self { buffer }
    }

    /// Rents a buffer and fills it with the header followed by `payload`.
    pub fn with_payload(pool: &BufferPool, address: Address, payload: &[u8]) -> Self {
        let mut message = Self::rent(pool, address, payload.len());
        if let Some(bytes) = message.buffer.bytes_mut() {
            bytes[HEADER_LEN..].copy_from_slice(payload);
        }
        message
    }

    /// Identity of the addressed object.
    pub fn object_id(&self) -> NetworkId {
        NetworkId(read_i32(&self.buffer.as_slice()[0..4]))
    }

    /// Identity of the addressed component slot.
    pub fn component_id(&self) -> ComponentId {
        ComponentId(read_i32(&self.buffer.as_slice()[4..8]))
    }

    /// Both halves of the header.
    pub fn address(&self) -> Address {
        Address {
            object: self.object_id(),
            component: self.component_id(),
        }
    }

    /// Rewrites the header in place.
    ///
    /// # Errors
    /// Returns [`ProtocolError::BufferShared`] if other references to the
    /// buffer exist.
    pub fn set_address(&mut self, address: Address) -> Result<(), ProtocolError> {
        let bytes = self.buffer.bytes_mut().ok_or(ProtocolError::BufferShared)?;
        write_header(bytes, address);
        Ok(())
    }

    /// The bytes after the header.
    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_slice()[HEADER_LEN..]
    }

    /// Mutable payload, available only while the buffer is unshared.
    pub fn payload_mut(&mut self) -> Option<&mut [u8]> {
        self.buffer
            .bytes_mut()
            .map(|bytes| &mut bytes[HEADER_LEN..])
    }

    /// The payload as text.
    pub fn payload_str(&self) -> Result<&str, ProtocolError> {
        Ok(std::str::from_utf8(self.payload())?)
    }

    /// Takes another reference to the same message.
    pub fn acquire(&self) -> Self {
        Self {
            buffer: self.buffer.acquire(),
        }
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    /// Gives up the typed view and returns the buffer.
    pub fn into_buffer(self) -> MessageBuffer {
        self.buffer
    }
}

impl fmt::Debug for SceneGraphMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneGraphMessage")
            .field("object", &self.object_id())
            .field("component", &self.component_id())
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

impl fmt::Display for SceneGraphMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.address())?;
        match std::str::from_utf8(self.payload()) {
            Ok(text) => f.write_str(text),
            Err(_) => write!(f, "<{} bytes>", self.payload().len()),
        }
    }
}

fn write_header(bytes: &mut [u8], address: Address) {
    bytes[0..4].copy_from_slice(&address.object.0.to_le_bytes());
    bytes[4..8].copy_from_slice(&address.component.0.to_le_bytes());
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    i32::from_le_bytes(raw)
}
