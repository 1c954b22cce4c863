//! Physical-state sync with grasp-driven ownership handoff.
//!
//! Exactly one peer owns a rigidbody at a time. The owner simulates it and
//! broadcasts `rigidbodyUpdate`s; everyone else applies the velocities and
//! lets their own physics step reconcile position.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tether_protocol::{
    Codec, DelimitedCodec, NetworkId, Quat, SceneGraphMessage, SyncMessage, Vec3,
};
use tether_scene::{ComponentError, NetworkComponent, NetworkContext, NetworkScene, Node};

use crate::{Grasper, PhysicsBody, SyncError};

/// Tuning for the grasp follow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Velocity per metre of separation between the body and its holder.
    pub gain: f32,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self { gain: 20.0 }
    }
}

/// A rigidbody whose state is shared with every peer.
pub struct NetworkedRigidbody {
    context: NetworkContext,
    body: Box<dyn PhysicsBody>,
    follow: FollowConfig,
    owner: bool,
    grasped_by: Option<Rc<dyn Grasper>>,
    grasped_remotely: bool,
    remote_pose: Option<(Vec3, Quat)>,
}

impl NetworkedRigidbody {
    /// Creates the component for `node` and queues its registration.
    pub fn spawn(
        scene: &NetworkScene,
        node: &Rc<Node>,
        body: impl PhysicsBody + 'static,
        follow: FollowConfig,
    ) -> Result<Rc<RefCell<Self>>, SyncError> {
        let context = scene.context::<Self>(node)?;
        let rigidbody = Rc::new(RefCell::new(Self {
            context: context.clone(),
            body: Box::new(body),
            follow,
            owner: false,
            grasped_by: None,
            grasped_remotely: false,
            remote_pose: None,
        }));
        scene.register_component(&context, &rigidbody)?;
        Ok(rigidbody)
    }

    /// The spawning peer starts as owner; replicas don't.
    pub fn on_spawned(&mut self, local: bool) {
        self.owner = local;
    }

    pub fn id(&self) -> NetworkId {
        self.context.object_id()
    }

    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn is_grasped(&self) -> bool {
        self.grasped_by.is_some()
    }

    pub fn is_grasped_remotely(&self) -> bool {
        self.grasped_remotely
    }

    pub fn body(&self) -> &dyn PhysicsBody {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> &mut dyn PhysicsBody {
        self.body.as_mut()
    }

    /// Last pose received from the owner, for the host to reconcile
    /// toward.
    pub fn remote_pose(&self) -> Option<(Vec3, Quat)> {
        self.remote_pose
    }

    // -- local operations ---------------------------------------------------

    /// Claims ownership unless another peer is holding the object.
    /// Returns whether control was taken.
    pub fn take_control(&mut self) -> Result<bool, SyncError> {
        if self.grasped_remotely {
            tracing::debug!(object = %self.id(), "take_control refused; grasped remotely");
            return Ok(false);
        }
        self.owner = true;
        self.context.send(&SyncMessage::NewOwner)?;
        Ok(true)
    }

    /// Picks the object up with `holder`, claiming ownership
    /// unconditionally.
    pub fn grasp(&mut self, holder: Rc<dyn Grasper>) -> Result<(), SyncError> {
        self.owner = true;
        self.grasped_by = Some(holder);
        self.body.set_gravity(false);
        self.context.send(&SyncMessage::GraspUpdate { grasped: true })?;
        Ok(())
    }

    /// Lets go if `holder` is the one holding the object. Returns whether
    /// anything was released.
    pub fn release(&mut self, holder: &Rc<dyn Grasper>) -> Result<bool, SyncError> {
        let held_by_holder = self
            .grasped_by
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, holder));
        if !held_by_holder {
            return Ok(false);
        }
        self.grasped_by = None;
        self.body.set_gravity(true);
        self.context.send(&SyncMessage::GraspUpdate { grasped: false })?;
        Ok(true)
    }

    /// Changes the kinematic flag everywhere. Only the owner may; on a
    /// replica this does nothing and returns `false`.
    pub fn set_kinematic(&mut self, state: bool) -> Result<bool, SyncError> {
        if !self.owner {
            return Ok(false);
        }
        self.body.set_kinematic(state);
        self.context.send(&SyncMessage::SetKinematic { state })?;
        Ok(true)
    }

    /// Broadcasts the current physical state if this peer owns the body.
    pub fn send_update(&mut self) -> Result<bool, SyncError> {
        if !self.owner {
            return Ok(false);
        }
        self.context
            .send(&SyncMessage::RigidbodyUpdate(self.body.state()))?;
        Ok(true)
    }

    /// Pulls a held body toward its holder. Call once per physics step.
    pub fn fixed_update(&mut self) {
        let Some(holder) = &self.grasped_by else {
            return;
        };
        let pull = (holder.position() - self.body.position()) * self.follow.gain;
        self.body.set_angular_velocity(Vec3::ZERO);
        self.body.set_linear_velocity(pull);
    }

    /// Runs the host physics for one step.
    pub fn step(&mut self, dt: f32) {
        self.body.step(dt);
    }

    // -- remote messages ----------------------------------------------------

    /// Applies a message from another peer.
    ///
    /// # Errors
    /// [`SyncError::ProtocolViolation`] if an owner-only message arrives
    /// while this peer is the owner. Nothing is modified in that case.
    pub fn handle(&mut self, message: SyncMessage) -> Result<(), SyncError> {
        if message.is_authoritative() && self.owner {
            return Err(SyncError::ProtocolViolation {
                object: self.id(),
                tag: message.tag(),
            });
        }

        match message {
            SyncMessage::RigidbodyUpdate(state) => {
                self.body.set_linear_velocity(state.linear_velocity);
                self.body.set_angular_velocity(state.angular_velocity);
                self.remote_pose = Some((state.position, state.rotation));
            }
            SyncMessage::PositionUpdate { position, rotation } => {
                self.remote_pose = Some((position, rotation));
            }
            SyncMessage::GraspUpdate { grasped } => {
                self.owner = false;
                self.grasped_by = None;
                self.body.set_gravity(!grasped);
                self.grasped_remotely = grasped;
            }
            SyncMessage::SetKinematic { state } => self.body.set_kinematic(state),
            SyncMessage::NewOwner => self.owner = false,
            other @ (SyncMessage::OnPlace { .. }
            | SyncMessage::OnRemove
            | SyncMessage::OnDestroy) => {
                return Err(SyncError::UnexpectedMessage {
                    object: self.id(),
                    tag: other.tag(),
                });
            }
        }
        Ok(())
    }
}

impl NetworkComponent for NetworkedRigidbody {
    fn process_message(&mut self, message: &SceneGraphMessage) -> Result<(), ComponentError> {
        let decoded = DelimitedCodec.decode(message.payload())?;
        tracing::trace!(object = %self.id(), tag = decoded.tag(), "rigidbody message");
        Ok(self.handle(decoded)?)
    }
}

impl fmt::Debug for NetworkedRigidbody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkedRigidbody")
            .field("id", &self.id())
            .field("owner", &self.owner)
            .field("grasped", &self.is_grasped())
            .field("grasped_remotely", &self.grasped_remotely)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RigidbodySet
// ---------------------------------------------------------------------------

/// Drives every networked rigidbody of a peer once per physics step.
///
/// Holds bodies weakly; dropped bodies disappear on the next pass.
#[derive(Default)]
pub struct RigidbodySet {
    bodies: Vec<Weak<RefCell<NetworkedRigidbody>>>,
}

impl RigidbodySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, body: &Rc<RefCell<NetworkedRigidbody>>) {
        let weak = Rc::downgrade(body);
        if !self.bodies.iter().any(|known| Weak::ptr_eq(known, &weak)) {
            self.bodies.push(weak);
        }
    }

    pub fn unregister(&mut self, body: &Rc<RefCell<NetworkedRigidbody>>) {
        let weak = Rc::downgrade(body);
        self.bodies.retain(|known| !Weak::ptr_eq(known, &weak));
    }

    /// Live bodies currently tracked.
    pub fn len(&self) -> usize {
        self.bodies.iter().filter(|b| b.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the grasp follow on every body.
    pub fn fixed_update(&mut self) {
        self.prune();
        for body in self.live() {
            match body.try_borrow_mut() {
                Ok(mut body) => body.fixed_update(),
                Err(_) => tracing::warn!("rigidbody busy during fixed update; skipped"),
            }
        }
    }

    /// Advances every body's physics by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        for body in self.live() {
            match body.try_borrow_mut() {
                Ok(mut body) => body.step(dt),
                Err(_) => tracing::warn!("rigidbody busy during physics step; skipped"),
            }
        }
    }

    /// Broadcasts state for every owned body. Returns how many updates went
    /// out; failures are logged and skipped.
    pub fn send_updates(&mut self) -> usize {
        self.prune();
        let mut sent = 0;
        for body in self.live() {
            let Ok(mut body) = body.try_borrow_mut() else {
                tracing::warn!("rigidbody busy during send; skipped");
                continue;
            };
            match body.send_update() {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(error) => tracing::warn!(object = %body.id(), %error, "rigidbody update failed"),
            }
        }
        sent
    }

    fn live(&self) -> Vec<Rc<RefCell<NetworkedRigidbody>>> {
        self.bodies.iter().filter_map(Weak::upgrade).collect()
    }

    fn prune(&mut self) {
        self.bodies.retain(|body| body.strong_count() > 0);
    }
}

impl fmt::Debug for RigidbodySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigidbodySet")
            .field("bodies", &self.len())
            .finish()
    }
}
