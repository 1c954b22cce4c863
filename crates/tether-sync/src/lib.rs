//! Ownership-aware object sync for Tether.
//!
//! Two kinds of networked objects are built on top of the scene:
//!
//! - [`NetworkedRigidbody`]: physics state owned by one peer at a time,
//!   handed over by grasping or by [`take_control`](NetworkedRigidbody::take_control).
//! - [`Placeable`]: building pieces that go from ghost to placed to
//!   removed, snapping onto each other as they are placed.
//!
//! Both follow the same rule: the owner is the only source of owner-only
//! messages (`rigidbodyUpdate`, `setKinematic`, `positionUpdate`,
//! `onPlace`, `onDestroy`). An owner that receives one reports
//! [`SyncError::ProtocolViolation`] and leaves its state untouched.
//!
//! The host supplies physics through [`PhysicsBody`] and hands through
//! [`Grasper`]. [`SimpleBody`] and [`Hand`] are plain implementations for
//! headless peers.

mod error;
mod index;
mod physics;
mod placeable;
mod rigidbody;

pub use error::SyncError;
pub use index::PlacedIndex;
pub use physics::{Grasper, Hand, PhysicsBody, SimpleBody};
pub use placeable::{Placeable, PlaceableDescriptor, PlacementState, SnapEdge, SnapRef};
pub use rigidbody::{FollowConfig, NetworkedRigidbody, RigidbodySet};
