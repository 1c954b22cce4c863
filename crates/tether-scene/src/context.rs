//! Send handle given to a registered component.

use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tether_protocol::{
    to_json_payload, Address, ComponentId, NetworkId, SceneGraphMessage, SyncMessage,
};

use crate::scene::SceneShared;
use crate::{NetworkScene, Node, SceneError};

/// Binds a component to `(scene, objectId, componentId)`.
///
/// Holds the scene and the object weakly: sending after either is gone
/// fails instead of keeping them alive.
#[derive(Clone)]
pub struct NetworkContext {
    scene: Weak<SceneShared>,
    object: Weak<Node>,
    object_id: NetworkId,
    component_id: ComponentId,
}

impl NetworkContext {
    pub(crate) fn new(
        scene: Weak<SceneShared>,
        object: &Rc<Node>,
        object_id: NetworkId,
        component_id: ComponentId,
    ) -> Self {
        Self {
            scene,
            object: Rc::downgrade(object),
            object_id,
            component_id,
        }
    }

    pub(crate) fn object_handle(&self) -> Weak<Node> {
        self.object.clone()
    }

    pub fn object_id(&self) -> NetworkId {
        self.object_id
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Where this component's own messages are addressed.
    pub fn address(&self) -> Address {
        Address {
            object: self.object_id,
            component: self.component_id,
        }
    }

    /// Whether the network object this context resolved to still exists.
    pub fn is_object_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    /// The scene this context sends through, if it still exists.
    pub fn scene(&self) -> Option<NetworkScene> {
        self.scene.upgrade().map(NetworkScene::from_shared)
    }

    /// Encodes and broadcasts a typed sync message to this component's
    /// peers.
    ///
    /// # Errors
    /// [`SceneError::NoNetworkObject`] once the owning object is destroyed,
    /// [`SceneError::SceneDropped`] once the scene is gone.
    pub fn send(&self, message: &SyncMessage) -> Result<(), SceneError> {
        let scene = self.live_scene()?;
        self.ensure_object()?;
        scene.send_sync(self.address(), message)
    }

    /// Broadcasts raw payload bytes to this component's peers.
    pub fn send_bytes(&self, payload: &[u8]) -> Result<(), SceneError> {
        self.ensure_object()?;
        self.send_to(self.object_id, payload)
    }

    /// Sends `payload` from this component slot to a different object.
    pub fn send_to(&self, object: NetworkId, payload: &[u8]) -> Result<(), SceneError> {
        let scene = self.live_scene()?;
        let address = Address {
            object,
            component: self.component_id,
        };
        let message = SceneGraphMessage::with_payload(scene.pool(), address, payload);
        scene.send(message);
        Ok(())
    }

    /// Broadcasts `value` as a JSON payload.
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), SceneError> {
        let payload = to_json_payload(value)?;
        self.send_bytes(&payload)
    }

    fn live_scene(&self) -> Result<Rc<SceneShared>, SceneError> {
        self.scene.upgrade().ok_or(SceneError::SceneDropped)
    }

    fn ensure_object(&self) -> Result<(), SceneError> {
        if self.is_object_alive() {
            Ok(())
        } else {
            Err(SceneError::NoNetworkObject(self.object_id.to_string()))
        }
    }
}

impl fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkContext")
            .field("address", &self.address())
            .field("object_alive", &self.is_object_alive())
            .finish()
    }
}
