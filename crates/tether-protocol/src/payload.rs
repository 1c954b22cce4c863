//! Typed sync payloads.
//!
//! Every message an ownership-aware object exchanges is one variant of
//! [`SyncMessage`]. Handlers decode once and `match`; nothing downstream
//! inspects tag strings.

use crate::{NetworkId, Quat, Vec3};

/// Full physical state of a rigidbody, as broadcast by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidbodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// A snap attachment requested by a placement: our snap `snap_index`
/// connects to snap `target_snap_index` on the placed object `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapLink {
    pub snap_index: u32,
    pub target: NetworkId,
    pub target_snap_index: u32,
}

/// The closed set of sync messages.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// Owner's physical state. Receivers apply velocities only.
    RigidbodyUpdate(RigidbodyState),
    /// The sender grabbed (`true`) or let go of (`false`) the object.
    GraspUpdate { grasped: bool },
    /// The owner changed the kinematic flag.
    SetKinematic { state: bool },
    /// Owner's pose for a placeable.
    PositionUpdate { position: Vec3, rotation: Quat },
    /// The owner committed a ghost, optionally snapping it to another object.
    OnPlace { link: Option<SnapLink> },
    /// The original placer removed a placed object.
    OnRemove,
    /// The owner discarded a ghost before placing it.
    OnDestroy,
    /// The sender took ownership; everyone else must let go.
    NewOwner,
}

impl SyncMessage {
    pub const RIGIDBODY_UPDATE: &'static str = "rigidbodyUpdate";
    pub const GRASP_UPDATE: &'static str = "graspUpdate";
    pub const SET_KINEMATIC: &'static str = "setKinematic";
    pub const POSITION_UPDATE: &'static str = "positionUpdate";
    pub const ON_PLACE: &'static str = "onPlace";
    pub const ON_REMOVE: &'static str = "onRemove";
    pub const ON_DESTROY: &'static str = "onDestroy";
    pub const NEW_OWNER: &'static str = "newOwner";

    /// The wire tag for this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RigidbodyUpdate(_) => Self::RIGIDBODY_UPDATE,
            Self::GraspUpdate { .. } => Self::GRASP_UPDATE,
            Self::SetKinematic { .. } => Self::SET_KINEMATIC,
            Self::PositionUpdate { .. } => Self::POSITION_UPDATE,
            Self::OnPlace { .. } => Self::ON_PLACE,
            Self::OnRemove => Self::ON_REMOVE,
            Self::OnDestroy => Self::ON_DESTROY,
            Self::NewOwner => Self::NEW_OWNER,
        }
    }

    /// Whether only the owner may author this message. Receiving one of
    /// these while holding ownership is a protocol violation.
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            Self::RigidbodyUpdate(_)
                | Self::SetKinematic { .. }
                | Self::PositionUpdate { .. }
                | Self::OnPlace { .. }
                | Self::OnDestroy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_wire_names() {
        assert_eq!(SyncMessage::NewOwner.tag(), "newOwner");
        assert_eq!(SyncMessage::GraspUpdate { grasped: true }.tag(), "graspUpdate");
        assert_eq!(
            SyncMessage::RigidbodyUpdate(RigidbodyState::default()).tag(),
            "rigidbodyUpdate"
        );
    }

    #[test]
    fn test_authoritative_messages() {
        assert!(SyncMessage::OnDestroy.is_authoritative());
        assert!(SyncMessage::SetKinematic { state: true }.is_authoritative());
        assert!(!SyncMessage::NewOwner.is_authoritative());
        assert!(!SyncMessage::GraspUpdate { grasped: false }.is_authoritative());
        assert!(!SyncMessage::OnRemove.is_authoritative());
    }
}
