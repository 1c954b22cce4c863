//! Codec trait and the `$`-delimited text codec.
//!
//! Wire shape of a typed payload:
//!
//! ```text
//! tag $ field₁ $ field₂ $ …
//! ```
//!
//! - vectors and quaternions are JSON objects (`{"x":1.0,"y":0.0,"z":0.0}`)
//! - booleans are `True` / `False`
//! - integers are decimal text
//!
//! None of those forms can contain `$`. Free-form strings would break the
//! split and are deliberately not supported as fields.
//!
//! Anything the decoder would refuse is refused at encode time too:
//! NaN or infinite vector components, and snap indices outside the wire's
//! signed 32-bit range. A failed encode leaves `out` as it was.

use serde::{de::DeserializeOwned, Serialize};

use crate::{NetworkId, ProtocolError, Quat, RigidbodyState, SnapLink, SyncMessage, Vec3};

/// Field separator.
pub const DELIMITER: char = '$';

/// Converts sync messages to and from payload bytes.
pub trait Codec {
    /// Appends the encoded form of `message` to `out`.
    fn encode_into(&self, message: &SyncMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError>;

    /// Decodes one message from a payload.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] naming the tag and field that failed.
    fn decode(&self, data: &[u8]) -> Result<SyncMessage, ProtocolError>;

    /// Encodes `message` into a fresh `Vec`.
    fn encode(&self, message: &SyncMessage) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        self.encode_into(message, &mut out)?;
        Ok(out)
    }
}

/// The `$`-delimited text codec spoken by every peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedCodec;

impl Codec for DelimitedCodec {
    fn encode_into(&self, message: &SyncMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let start = out.len();
        let result = write_fields(message, out);
        if result.is_err() {
            out.truncate(start);
        }
        result
    }

    fn decode(&self, data: &[u8]) -> Result<SyncMessage, ProtocolError> {
        let text = std::str::from_utf8(data)?;
        let mut parts = text.split(DELIMITER);
        let tag = parts.next().unwrap_or_default();

        let message = match tag {
            SyncMessage::RIGIDBODY_UPDATE => {
                let mut f = Fields::new(SyncMessage::RIGIDBODY_UPDATE, parts, 4);
                let state = RigidbodyState {
                    position: f.json()?,
                    rotation: f.json()?,
                    linear_velocity: f.json()?,
                    angular_velocity: f.json()?,
                };
                f.finish()?;
                SyncMessage::RigidbodyUpdate(state)
            }
            SyncMessage::GRASP_UPDATE => {
                let mut f = Fields::new(SyncMessage::GRASP_UPDATE, parts, 1);
                let grasped = f.boolean()?;
                f.finish()?;
                SyncMessage::GraspUpdate { grasped }
            }
            SyncMessage::SET_KINEMATIC => {
                let mut f = Fields::new(SyncMessage::SET_KINEMATIC, parts, 1);
                let state = f.boolean()?;
                f.finish()?;
                SyncMessage::SetKinematic { state }
            }
            SyncMessage::POSITION_UPDATE => {
                let mut f = Fields::new(SyncMessage::POSITION_UPDATE, parts, 2);
                let position = f.json()?;
                let rotation = f.json()?;
                f.finish()?;
                SyncMessage::PositionUpdate { position, rotation }
            }
            SyncMessage::ON_PLACE => {
                let mut f = Fields::new(SyncMessage::ON_PLACE, parts, 3);
                let snap_index = f.int()?;
                let target = f.int()?;
                let target_snap_index = f.int()?;
                f.finish()?;
                let link = if snap_index < 0 {
                    None
                } else {
                    let target_snap_index = u32::try_from(target_snap_index).map_err(|_| {
                        ProtocolError::InvalidField {
                            tag: SyncMessage::ON_PLACE,
                            index: 3,
                            reason: format!("negative target snap {target_snap_index}"),
                        }
                    })?;
                    Some(SnapLink {
                        snap_index: snap_index.unsigned_abs(),
                        target: NetworkId(target),
                        target_snap_index,
                    })
                };
                SyncMessage::OnPlace { link }
            }
            SyncMessage::ON_REMOVE => {
                Fields::new(SyncMessage::ON_REMOVE, parts, 0).finish()?;
                SyncMessage::OnRemove
            }
            SyncMessage::ON_DESTROY => {
                Fields::new(SyncMessage::ON_DESTROY, parts, 0).finish()?;
                SyncMessage::OnDestroy
            }
            SyncMessage::NEW_OWNER => {
                Fields::new(SyncMessage::NEW_OWNER, parts, 0).finish()?;
                SyncMessage::NewOwner
            }
            other => return Err(ProtocolError::UnknownTag(other.to_string())),
        };
        Ok(message)
    }
}

fn write_fields(message: &SyncMessage, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let tag = message.tag();
    out.extend_from_slice(tag.as_bytes());
    match message {
        SyncMessage::RigidbodyUpdate(state) => {
            push_vec3(out, tag, 1, state.position)?;
            push_quat(out, tag, 2, state.rotation)?;
            push_vec3(out, tag, 3, state.linear_velocity)?;
            push_vec3(out, tag, 4, state.angular_velocity)?;
        }
        SyncMessage::GraspUpdate { grasped } => push_bool(out, *grasped),
        SyncMessage::SetKinematic { state } => push_bool(out, *state),
        SyncMessage::PositionUpdate { position, rotation } => {
            push_vec3(out, tag, 1, *position)?;
            push_quat(out, tag, 2, *rotation)?;
        }
        SyncMessage::OnPlace { link } => match link {
            Some(link) => {
                push_snap_index(out, tag, 1, link.snap_index)?;
                push_int(out, i64::from(link.target.0));
                push_snap_index(out, tag, 3, link.target_snap_index)?;
            }
            None => {
                push_int(out, -1);
                push_int(out, 0);
                push_int(out, -1);
            }
        },
        SyncMessage::OnRemove | SyncMessage::OnDestroy | SyncMessage::NewOwner => {}
    }
    Ok(())
}

/// Reads the leading tag of a delimited payload without decoding the rest.
pub fn peek_tag(data: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(data).ok()?;
    text.split(DELIMITER).next()
}

/// Serializes an arbitrary value as a JSON payload.
pub fn to_json_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(value).map_err(ProtocolError::Encode)
}

/// Parses a JSON payload produced by [`to_json_payload`].
pub fn from_json_payload<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(data).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn push_json<T: Serialize>(out: &mut Vec<u8>, value: &T) -> Result<(), ProtocolError> {
    out.push(DELIMITER as u8);
    serde_json::to_writer(&mut *out, value).map_err(ProtocolError::Encode)
}

fn push_vec3(
    out: &mut Vec<u8>,
    tag: &'static str,
    index: usize,
    value: Vec3,
) -> Result<(), ProtocolError> {
    if !value.is_finite() {
        return Err(non_finite(tag, index));
    }
    push_json(out, &value)
}

fn push_quat(
    out: &mut Vec<u8>,
    tag: &'static str,
    index: usize,
    value: Quat,
) -> Result<(), ProtocolError> {
    if !value.is_finite() {
        return Err(non_finite(tag, index));
    }
    push_json(out, &value)
}

fn non_finite(tag: &'static str, index: usize) -> ProtocolError {
    ProtocolError::InvalidField {
        tag,
        index,
        reason: "NaN or infinite component".to_owned(),
    }
}

fn push_snap_index(
    out: &mut Vec<u8>,
    tag: &'static str,
    index: usize,
    value: u32,
) -> Result<(), ProtocolError> {
    let value = i32::try_from(value).map_err(|_| ProtocolError::InvalidField {
        tag,
        index,
        reason: format!("snap index {value} exceeds the int32 range"),
    })?;
    push_int(out, i64::from(value));
    Ok(())
}

fn push_bool(out: &mut Vec<u8>, value: bool) {
    out.push(DELIMITER as u8);
    out.extend_from_slice(if value { b"True" } else { b"False" });
}

fn push_int(out: &mut Vec<u8>, value: i64) {
    out.push(DELIMITER as u8);
    out.extend_from_slice(value.to_string().as_bytes());
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// Positional field reader that reports which field went wrong.
struct Fields<'a> {
    tag: &'static str,
    parts: std::str::Split<'a, char>,
    expected: usize,
    index: usize,
}

impl<'a> Fields<'a> {
    fn new(tag: &'static str, parts: std::str::Split<'a, char>, expected: usize) -> Self {
        Self {
            tag,
            parts,
            expected,
            index: 0,
        }
    }

    fn next(&mut self) -> Result<&'a str, ProtocolError> {
        let field = self.parts.next().ok_or(ProtocolError::FieldCount {
            tag: self.tag,
            expected: self.expected,
            found: self.index,
        })?;
        self.index += 1;
        Ok(field)
    }

    fn invalid(&self, reason: String) -> ProtocolError {
        ProtocolError::InvalidField {
            tag: self.tag,
            index: self.index,
            reason,
        }
    }

    fn json<T: DeserializeOwned>(&mut self) -> Result<T, ProtocolError> {
        let field = self.next()?;
        serde_json::from_str(field).map_err(|e| self.invalid(e.to_string()))
    }

    fn boolean(&mut self) -> Result<bool, ProtocolError> {
        let field = self.next()?;
        if field.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if field.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(self.invalid(format!("expected True or False, got {field:?}")))
        }
    }

    fn int(&mut self) -> Result<i32, ProtocolError> {
        let field = self.next()?;
        field
            .parse::<i32>()
            .map_err(|e| self.invalid(format!("{field:?}: {e}")))
    }

    fn finish(mut self) -> Result<(), ProtocolError> {
        let extra = self.parts.by_ref().count();
        if extra > 0 {
            return Err(ProtocolError::FieldCount {
                tag: self.tag,
                expected: self.expected,
                found: self.index + extra,
            });
        }
        Ok(())
    }
}
