//! Placeable objects: ghost → placed → removed, with a snap graph.
//!
//! ```text
//!            place / onPlace              remove / onRemove
//!   Ghost ───────────────────▶ Placed ───────────────────────▶ Removed
//!     │                                                          ▲
//!     └──────────────── deselect / onDestroy ────────────────────┘
//! ```
//!
//! Snap edges are stored on both ends as `(my snap, their object + snap)`
//! pairs. Objects never hold each other; the other end is resolved through
//! the [`PlacedIndex`] whenever it is needed.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tether_protocol::{
    Codec, DelimitedCodec, NetworkId, Quat, SceneGraphMessage, SnapLink, SyncMessage, Vec3,
};
use tether_scene::{ComponentError, NetworkComponent, NetworkContext, NetworkScene, Node};

use crate::{PlacedIndex, SyncError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of a placeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementState {
    /// Not committed yet. Colliders off.
    Ghost,
    /// Committed. Colliders on, possibly snapped to others.
    Placed,
    /// Torn down. Terminal.
    Removed,
}

impl fmt::Display for PlacementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ghost => write!(f, "ghost"),
            Self::Placed => write!(f, "placed"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// One snap point on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapRef {
    pub object: NetworkId,
    pub snap: u32,
}

impl fmt::Display for SnapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object, self.snap)
    }
}

/// An attachment as seen from one side: our snap `mine` is joined to
/// `other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapEdge {
    pub mine: u32,
    pub other: SnapRef,
}

/// Static description of a kind of placeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceableDescriptor {
    pub name: String,
    pub material_cost: u32,
    #[serde(default = "default_true")]
    pub can_be_placed_freely: bool,
    pub snap_count: u32,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Placeable
// ---------------------------------------------------------------------------

/// A networked object that is positioned as a ghost, then placed, and
/// finally removed.
pub struct Placeable {
    context: NetworkContext,
    descriptor: PlaceableDescriptor,
    node: Option<Rc<Node>>,
    index: PlacedIndex,
    this: Weak<RefCell<Placeable>>,
    state: PlacementState,
    owner: bool,
    original_owner: bool,
    colliders_enabled: bool,
    snap_colliders: Vec<bool>,
    attached_to: Vec<SnapEdge>,
    position: Vec3,
    rotation: Quat,
}

impl Placeable {
    /// Creates a ghost on `node` and queues its registration.
    ///
    /// The placeable keeps `node` alive until it is removed; dropping the
    /// node at that point is what takes it out of the scene.
    pub fn spawn(
        scene: &NetworkScene,
        node: Rc<Node>,
        descriptor: PlaceableDescriptor,
        index: &PlacedIndex,
    ) -> Result<Rc<RefCell<Self>>, SyncError> {
        let context = scene.context::<Self>(&node)?;
        let snap_count = descriptor.snap_count as usize;
        let placeable = Rc::new_cyclic(|this| {
            RefCell::new(Self {
                context: context.clone(),
                descriptor,
                node: Some(node),
                index: index.clone(),
                this: this.clone(),
                state: PlacementState::Ghost,
                owner: false,
                original_owner: false,
                colliders_enabled: false,
                snap_colliders: vec![false; snap_count],
                attached_to: Vec::new(),
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
            })
        });
        scene.register_component(&context, &placeable)?;
        Ok(placeable)
    }

    /// The spawning peer starts as owner; replicas don't.
    pub fn on_spawned(&mut self, local: bool) {
        self.owner = local;
        tracing::debug!(object = %self.id(), local, "placeable spawned");
    }

    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    pub fn id(&self) -> NetworkId {
        self.context.object_id()
    }

    pub fn descriptor(&self) -> &PlaceableDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn is_original_owner(&self) -> bool {
        self.original_owner
    }

    pub fn colliders_enabled(&self) -> bool {
        self.colliders_enabled
    }

    /// Whether the collider on snap `index` is active, or `None` if there
    /// is no such snap.
    pub fn snap_collider_enabled(&self, index: u32) -> Option<bool> {
        self.snap_colliders.get(index as usize).copied()
    }

    pub fn attached_to(&self) -> &[SnapEdge] {
        &self.attached_to
    }

    pub fn is_attached(&self, mine: u32, other: SnapRef) -> bool {
        self.attached_to.contains(&SnapEdge { mine, other })
    }

    pub fn pose(&self) -> (Vec3, Quat) {
        (self.position, self.rotation)
    }

    pub fn node(&self) -> Option<&Rc<Node>> {
        self.node.as_ref()
    }

    // -- owner operations ---------------------------------------------------

    pub fn take_control(&mut self) -> Result<(), SyncError> {
        self.context.send(&SyncMessage::NewOwner)?;
        self.owner = true;
        Ok(())
    }

    /// Moves the object and tells the replicas.
    pub fn move_to(&mut self, position: Vec3, rotation: Quat) -> Result<(), SyncError> {
        self.require_owner("move")?;
        self.position = position;
        self.rotation = rotation;
        self.context
            .send(&SyncMessage::PositionUpdate { position, rotation })?;
        Ok(())
    }

    /// Commits the ghost, optionally snapping one of our snaps onto a snap
    /// of an already placed object.
    pub fn place(&mut self, link: Option<SnapLink>) -> Result<(), SyncError> {
        self.require_owner("place")?;
        self.require_state(PlacementState::Ghost, "place")?;
        if let Some(link) = link {
            self.check_snap(link.snap_index)?;
            if link.target == self.id() {
                return Err(SyncError::InvalidSnap {
                    object: self.id(),
                    index: link.snap_index,
                });
            }
            let target = self
                .index
                .get(link.target)
                .ok_or(SyncError::TargetNotPlaced(link.target))?;
            target
                .try_borrow()
                .map_err(|_| SyncError::TargetBusy(link.target))?
                .check_snap(link.target_snap_index)?;
        }

        self.context.send(&SyncMessage::OnPlace { link })?;
        self.apply_place(link)?;
        self.original_owner = true;
        Ok(())
    }

    /// Places without snapping, if this kind of object allows it.
    pub fn place_freely(&mut self) -> Result<(), SyncError> {
        if !self.descriptor.can_be_placed_freely {
            return Err(SyncError::FreePlacementNotAllowed { object: self.id() });
        }
        self.place(None)
    }

    /// Removes a placed object. Only the peer that placed it may.
    pub fn remove(&mut self) -> Result<(), SyncError> {
        if !self.original_owner {
            return Err(SyncError::NotOriginalOwner { object: self.id() });
        }
        self.require_state(PlacementState::Placed, "remove")?;
        self.context.send(&SyncMessage::OnRemove)?;
        self.teardown();
        Ok(())
    }

    /// Discards a ghost that was never placed.
    pub fn deselect(&mut self) -> Result<(), SyncError> {
        self.require_owner("deselect")?;
        self.require_state(PlacementState::Ghost, "deselect")?;
        self.context.send(&SyncMessage::OnDestroy)?;
        self.destroy();
        Ok(())
    }

    // -- snap graph ---------------------------------------------------------

    /// Records that our snap `mine` is joined to `other` and turns its
    /// collider off. Callers make sure the edge isn't already there.
    pub fn attach(&mut self, mine: u32, other: SnapRef) -> Result<(), SyncError> {
        self.check_snap(mine)?;
        self.snap_colliders[mine as usize] = false;
        self.attached_to.push(SnapEdge { mine, other });
        tracing::trace!(object = %self.id(), mine, %other, "snap attached");
        Ok(())
    }

    /// Removes the edge between our snap `mine` and `other`.
    ///
    /// # Errors
    /// [`SyncError::NotAttached`] if there is no such edge.
    pub fn detach(&mut self, mine: u32, other: SnapRef) -> Result<(), SyncError> {
        let position = self
            .attached_to
            .iter()
            .position(|edge| *edge == SnapEdge { mine, other })
            .ok_or(SyncError::NotAttached {
                object: self.id(),
                mine,
                other,
            })?;
        self.attached_to.remove(position);
        if let Some(collider) = self.snap_colliders.get_mut(mine as usize) {
            *collider = true;
        }
        tracing::trace!(object = %self.id(), mine, %other, "snap detached");
        Ok(())
    }

    // -- remote messages ----------------------------------------------------

    /// Applies a message from another peer.
    pub fn handle(&mut self, message: SyncMessage) -> Result<(), SyncError> {
        if self.state == PlacementState::Removed {
            tracing::trace!(object = %self.id(), tag = message.tag(), "ignoring message for removed placeable");
            return Ok(());
        }
        if message.is_authoritative() && self.owner {
            return Err(SyncError::ProtocolViolation {
                object: self.id(),
                tag: message.tag(),
            });
        }

        match message {
            SyncMessage::PositionUpdate { position, rotation } => {
                self.position = position;
                self.rotation = rotation;
            }
            SyncMessage::OnPlace { link } => {
                self.require_state(PlacementState::Ghost, "place")?;
                self.apply_place(link)?;
            }
            SyncMessage::OnRemove => self.teardown(),
            SyncMessage::OnDestroy => self.destroy(),
            SyncMessage::NewOwner => self.owner = false,
            other @ (SyncMessage::RigidbodyUpdate(_)
            | SyncMessage::GraspUpdate { .. }
            | SyncMessage::SetKinematic { .. }) => {
                return Err(SyncError::UnexpectedMessage {
                    object: self.id(),
                    tag: other.tag(),
                });
            }
        }
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn apply_place(&mut self, link: Option<SnapLink>) -> Result<(), SyncError> {
        if let Some(link) = link {
            self.check_snap(link.snap_index)?;
            match self.index.get(link.target).filter(|_| link.target != self.id()) {
                Some(target) => {
                    let mine = SnapRef {
                        object: self.id(),
                        snap: link.snap_index,
                    };
                    let theirs = SnapRef {
                        object: link.target,
                        snap: link.target_snap_index,
                    };
                    target
                        .try_borrow_mut()
                        .map_err(|_| SyncError::TargetBusy(link.target))?
                        .attach(theirs.snap, mine)?;
                    self.attach(mine.snap, theirs)?;
                }
                None => tracing::warn!(
                    object = %self.id(),
                    target = %link.target,
                    "snap target is not placed; placing without attachment"
                ),
            }
        }

        self.colliders_enabled = true;
        for (index, collider) in self.snap_colliders.iter_mut().enumerate() {
            *collider = !self
                .attached_to
                .iter()
                .any(|edge| edge.mine as usize == index);
        }
        self.state = PlacementState::Placed;
        self.index.insert(self.id(), self.this.clone());
        tracing::info!(object = %self.id(), name = %self.descriptor.name, "placed");
        Ok(())
    }

    /// Detaches every edge on both ends, then destroys this object.
    fn teardown(&mut self) {
        while let Some(edge) = self.attached_to.last().copied() {
            if let Err(error) = self.detach(edge.mine, edge.other) {
                tracing::warn!(object = %self.id(), %error, "local detach failed");
                self.attached_to.pop();
                continue;
            }
            let mine = SnapRef {
                object: self.id(),
                snap: edge.mine,
            };
            let Some(other) = self.index.get(edge.other.object) else {
                tracing::debug!(object = %self.id(), other = %edge.other, "other end already gone");
                continue;
            };
            let detached = match other.try_borrow_mut() {
                Ok(mut other) => other.detach(edge.other.snap, mine),
                Err(_) => Err(SyncError::TargetBusy(edge.other.object)),
            };
            if let Err(error) = detached {
                tracing::warn!(object = %self.id(), %error, "remote end detach failed");
            }
        }
        self.destroy();
    }

    fn destroy(&mut self) {
        self.state = PlacementState::Removed;
        self.colliders_enabled = false;
        self.index.remove(self.id(), &self.this);
        self.node = None;
        tracing::info!(object = %self.id(), name = %self.descriptor.name, "placeable removed");
    }

    fn require_owner(&self, operation: &'static str) -> Result<(), SyncError> {
        if self.owner {
            Ok(())
        } else {
            Err(SyncError::NotOwner {
                object: self.id(),
                operation,
            })
        }
    }

    fn require_state(&self, expected: PlacementState, operation: &'static str) -> Result<(), SyncError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SyncError::InvalidState {
                object: self.id(),
                operation,
                state: self.state,
            })
        }
    }

    fn check_snap(&self, index: u32) -> Result<(), SyncError> {
        if (index as usize) < self.snap_colliders.len() {
            Ok(())
        } else {
            Err(SyncError::InvalidSnap {
                object: self.id(),
                index,
            })
        }
    }
}

impl NetworkComponent for Placeable {
    fn process_message(&mut self, message: &SceneGraphMessage) -> Result<(), ComponentError> {
        let decoded = DelimitedCodec.decode(message.payload())?;
        tracing::trace!(object = %self.id(), tag = decoded.tag(), "placeable message");
        Ok(self.handle(decoded)?)
    }
}

impl fmt::Debug for Placeable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeable")
            .field("id", &self.id())
            .field("name", &self.descriptor.name)
            .field("state", &self.state)
            .field("owner", &self.owner)
            .field("attached_to", &self.attached_to)
            .finish()
    }
}
