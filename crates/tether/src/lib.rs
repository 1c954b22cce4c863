//! # Tether
//!
//! Peer-to-peer scene sync for shared VR spaces.
//!
//! Every peer holds its own copy of the scene. Objects that need to stay
//! in step across peers get a network identity; their components exchange
//! small messages through a [`NetworkScene`](tether_scene::NetworkScene),
//! and ownership rules decide which peer is allowed to say what.
//!
//! The layers, bottom to top:
//!
//! | crate | role |
//! |---|---|
//! | `tether-transport` | pooled buffers and the polled [`Connection`](tether_transport::Connection) contract |
//! | `tether-protocol` | `(objectId, componentId)` framing and the typed `$`-delimited payloads |
//! | `tether-scene` | object registry and per-frame dispatch |
//! | `tether-sync` | rigidbody ownership, placeables and the snap graph |
//! | `tether-tick` | fixed-rate frame clock |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # async fn demo() -> Result<(), TetherError> {
//! tether::logging::init();
//!
//! let mut alice = Peer::default();
//! let mut bob = Peer::default();
//! let (a, b) = ChannelConnection::pair();
//! alice.connect(a);
//! bob.connect(b);
//!
//! let ball = alice.object("Ball")?;
//! alice.spawn_rigidbody(&ball, SimpleBody::default(), true)?;
//! let replica = bob.object("Ball")?;
//! bob.spawn_rigidbody(&replica, SimpleBody::default(), false)?;
//!
//! tokio::join!(alice.run(600), bob.run(600));
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod peer;

pub use config::PeerConfig;
pub use error::TetherError;
pub use peer::{FrameReport, Peer};

pub use tether_protocol as protocol;
pub use tether_scene as scene;
pub use tether_sync as sync;
pub use tether_tick as tick;
pub use tether_transport as transport;

/// Everything a typical host needs.
pub mod prelude {
    pub use crate::{FrameReport, Peer, PeerConfig, TetherError};

    pub use tether_protocol::{
        Address, Codec, ComponentId, DelimitedCodec, NetworkId, Quat, SceneGraphMessage,
        SnapLink, SyncMessage, Vec3,
    };
    pub use tether_scene::{
        ComponentError, NetworkComponent, NetworkContext, NetworkScene, Node, SceneConfig,
    };
    pub use tether_sync::{
        FollowConfig, Grasper, Hand, NetworkedRigidbody, PhysicsBody, Placeable,
        PlaceableDescriptor, PlacedIndex, PlacementState, SimpleBody, SnapRef, SyncError,
    };
    pub use tether_tick::{ClockConfig, ClockPolicy, Frame, FrameClock};
    pub use tether_transport::{ChannelConnection, Connection};
}
