//! One process's sync runtime.
//!
//! A [`Peer`] bundles the pieces every participant needs: the scene and its
//! connections, the placed-object index, the set of networked rigidbodies
//! and the frame clock that paces them. Each frame runs the same pipeline:
//!
//! ```text
//! scene.tick ─▶ grasp follow ─▶ physics step ─▶ owner state broadcast
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tether_scene::{NetworkScene, Node, TickSummary};
use tether_sync::{
    FollowConfig, NetworkedRigidbody, PhysicsBody, Placeable, PlaceableDescriptor, PlacedIndex,
    RigidbodySet,
};
use tether_tick::{Frame, FrameClock, FrameStats};
use tether_transport::{Connection, ConnectionId};

use crate::{PeerConfig, TetherError};

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub tick: TickSummary,
    /// `rigidbodyUpdate`s broadcast for owned bodies.
    pub updates_sent: usize,
}

/// A participant in the shared scene.
pub struct Peer {
    scene: NetworkScene,
    placed: PlacedIndex,
    rigidbodies: RigidbodySet,
    clock: FrameClock,
    follow: FollowConfig,
}

impl Peer {
    pub fn new(config: PeerConfig) -> Self {
        let PeerConfig {
            scene,
            clock,
            follow,
        } = config;
        Self {
            scene: NetworkScene::new(scene),
            placed: PlacedIndex::new(),
            rigidbodies: RigidbodySet::new(),
            clock: FrameClock::new(clock),
            follow,
        }
    }

    pub fn scene(&self) -> &NetworkScene {
        &self.scene
    }

    pub fn placed(&self) -> &PlacedIndex {
        &self.placed
    }

    pub fn rigidbodies(&self) -> &RigidbodySet {
        &self.rigidbodies
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Adds a link to another peer.
    pub fn connect(&self, connection: impl Connection) -> ConnectionId {
        self.scene.add_connection(connection)
    }

    /// A network object every peer knows by `name`.
    pub fn object(&self, name: &str) -> Result<Rc<Node>, TetherError> {
        Ok(self.scene.object_by_name(name)?)
    }

    /// Adds a networked rigidbody to `node` and drives it from now on.
    /// `local` makes this peer its initial owner. The caller keeps `node`
    /// alive; once it is dropped the body leaves the scene.
    pub fn spawn_rigidbody(
        &mut self,
        node: &Rc<Node>,
        body: impl PhysicsBody + 'static,
        local: bool,
    ) -> Result<Rc<RefCell<NetworkedRigidbody>>, TetherError> {
        let rigidbody = NetworkedRigidbody::spawn(&self.scene, node, body, self.follow)?;
        rigidbody.borrow_mut().on_spawned(local);
        self.rigidbodies.register(&rigidbody);
        Ok(rigidbody)
    }

    /// Adds a placeable ghost to `node`. The placeable keeps the node
    /// alive until it is removed.
    pub fn spawn_placeable(
        &self,
        node: Rc<Node>,
        descriptor: PlaceableDescriptor,
        local: bool,
    ) -> Result<Rc<RefCell<Placeable>>, TetherError> {
        let placeable = Placeable::spawn(&self.scene, node, descriptor, &self.placed)?;
        placeable.borrow_mut().on_spawned(local);
        Ok(placeable)
    }

    /// Runs one frame of `dt` without waiting on the clock.
    pub fn run_frame(&mut self, dt: f32) -> FrameReport {
        let tick = self.scene.tick();
        self.rigidbodies.fixed_update();
        self.rigidbodies.step(dt);
        let updates_sent = self.rigidbodies.send_updates();
        FrameReport { tick, updates_sent }
    }

    /// Runs `frames` frames paced by the clock.
    pub async fn run(&mut self, frames: u64) -> FrameStats {
        self.run_with(frames, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_frame` at the start of every
    /// frame, before the scene ticks. Host input goes there.
    pub async fn run_with<F>(&mut self, frames: u64, mut on_frame: F) -> FrameStats
    where
        F: FnMut(&mut Peer, &Frame),
    {
        for _ in 0..frames {
            let frame = self.clock.next_frame().await;
            on_frame(self, &frame);
            let report = self.run_frame(frame.dt.as_secs_f32());
            self.clock.end_frame();
            tracing::trace!(
                frame = frame.index,
                received = report.tick.received,
                applied = report.tick.applied,
                sent = report.updates_sent,
                "frame done"
            );
        }
        self.clock.stats().clone()
    }

    /// Disposes every connection. The peer stays usable for local work.
    pub fn dispose(&self) {
        self.scene.dispose();
    }
}

impl Default for Peer {
    fn default() -> Self {
        Self::new(PeerConfig::default())
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("scene", &self.scene)
            .field("placed", &self.placed.len())
            .field("rigidbodies", &self.rigidbodies.len())
            .finish()
    }
}
