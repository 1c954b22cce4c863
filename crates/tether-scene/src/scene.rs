//! The network scene: registry, dispatcher and connection fan-out.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tether_protocol::{
    Address, Codec, DelimitedCodec, NetworkId, SceneGraphMessage, SyncMessage,
};
use tether_transport::{BufferPool, Connection, ConnectionId, MessageBuffer};

use crate::component::component_id_of;
use crate::registry::{Registration, Registry};
use crate::{ComponentError, NetworkComponent, NetworkContext, Node, SceneConfig, SceneError};

/// How many random draws `generate_unique_id` makes before giving up.
const MAX_ID_ATTEMPTS: usize = 16;

/// What one [`NetworkScene::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Messages drained from connections and routed.
    pub received: usize,
    /// Queued registrations applied to the registry.
    pub applied: usize,
    /// Objects pruned because they were destroyed.
    pub pruned: usize,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub(crate) struct SceneShared {
    config: SceneConfig,
    pool: BufferPool,
    codec: DelimitedCodec,
    connections: RefCell<Vec<Box<dyn Connection>>>,
    registry: RefCell<Registry>,
    pending: RefCell<Vec<Registration>>,
    /// Ids handed out by name, with the name that produced each.
    named: RefCell<HashMap<NetworkId, String>>,
    issued: RefCell<HashSet<NetworkId>>,
    scratch: RefCell<Vec<u8>>,
    ticking: Cell<bool>,
}

impl SceneShared {
    fn new(config: SceneConfig) -> Self {
        Self {
            pool: BufferPool::new(config.retained_buffers, config.buffer_capacity),
            codec: DelimitedCodec,
            connections: RefCell::new(Vec::new()),
            registry: RefCell::new(Registry::default()),
            pending: RefCell::new(Vec::new()),
            named: RefCell::new(HashMap::new()),
            issued: RefCell::new(HashSet::new()),
            scratch: RefCell::new(Vec::with_capacity(config.buffer_capacity)),
            ticking: Cell::new(false),
            config,
        }
    }

    pub(crate) fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Hands one reference of `message` to every connection, then drops
    /// the caller's reference.
    pub(crate) fn send(&self, message: SceneGraphMessage) {
        let mut connections = self.connections.borrow_mut();
        for connection in connections.iter_mut() {
            if let Err(error) = connection.send(message.buffer().acquire()) {
                tracing::warn!(conn = %connection.id(), %error, "send failed");
            }
        }
        drop(connections);
        message.into_buffer().release();
    }

    pub(crate) fn send_sync(
        &self,
        address: Address,
        message: &SyncMessage,
    ) -> Result<(), SceneError> {
        let framed = {
            let mut scratch = self.scratch.borrow_mut();
            scratch.clear();
            self.codec.encode_into(message, &mut scratch)?;
            SceneGraphMessage::with_payload(&self.pool, address, &scratch)
        };
        tracing::trace!(object = %address.object, component = %address.component, tag = message.tag(), "sending");
        self.send(framed);
        Ok(())
    }

    fn receive_connection_messages(&self) -> usize {
        let limit = self.config.drain_limit;
        let mut received = 0;
        let mut index = 0;

        while index < self.connections.borrow().len() {
            let mut drained = 0;
            loop {
                if limit.is_some_and(|limit| drained >= limit) {
                    break;
                }
                // The borrow ends before routing so handlers can send.
                let next = {
                    let mut connections = self.connections.borrow_mut();
                    let Some(connection) = connections.get_mut(index) else {
                        break;
                    };
                    connection
                        .receive()
                        .map_err(|error| (connection.id(), error))
                };
                match next {
                    Ok(Some(buffer)) => {
                        drained += 1;
                        self.handle_incoming(buffer);
                    }
                    Ok(None) => break,
                    Err((conn, error)) => {
                        tracing::warn!(%conn, %error, "receive failed");
                        break;
                    }
                }
            }
            received += drained;
            index += 1;
        }
        received
    }

    fn handle_incoming(&self, buffer: MessageBuffer) {
        match SceneGraphMessage::from_buffer(buffer) {
            Ok(message) => self.route(&message),
            Err(error) => tracing::warn!(%error, "dropping malformed message"),
        }
    }

    fn route(&self, message: &SceneGraphMessage) {
        let address = message.address();
        let registry = self.registry.borrow();
        // Dead handles are evicted by the sweep after routing.
        let recipient = registry
            .get(address.object)
            .and_then(|entry| entry.components.get(&address.component))
            .and_then(|handle| handle.upgrade());

        match recipient {
            Some(component) => deliver(&component, message, address),
            None => {
                tracing::trace!(object = %address.object, component = %address.component, "no recipient; dropped")
            }
        }
    }

    fn apply_pending(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        let mut registry = self.registry.borrow_mut();
        pending
            .into_iter()
            .map(|registration| registry.insert(registration))
            .filter(Result::is_ok)
            .count()
    }

    /// Sweeps the registry and forgets the identities of pruned objects.
    fn prune(&self) -> usize {
        let gone = self.registry.borrow_mut().sweep();
        if !gone.is_empty() {
            let mut issued = self.issued.borrow_mut();
            let mut named = self.named.borrow_mut();
            for id in &gone {
                issued.remove(id);
                named.remove(id);
            }
        }
        gone.len()
    }

    fn id_in_use(&self, id: NetworkId) -> bool {
        self.issued.borrow().contains(&id)
            || self.named.borrow().contains_key(&id)
            || self.registry.borrow().uses_id(id)
            || self
                .pending
                .borrow()
                .iter()
                .any(|registration| registration.object_id == id)
    }

    /// Whether `id` is registered, or queued, for a live object other
    /// than `object`.
    fn id_held_by_other(&self, id: NetworkId, object: &Weak<Node>) -> bool {
        self.registry.borrow().held_by_other(id, object)
            || self.pending.borrow().iter().any(|registration| {
                registration.object_id == id
                    && registration.object.strong_count() > 0
                    && !Weak::ptr_eq(&registration.object, object)
            })
    }

    fn dispose(&self) {
        let mut connections = self.connections.borrow_mut();
        let count = connections.len();
        for connection in connections.iter_mut() {
            if let Err(error) = connection.dispose() {
                tracing::debug!(conn = %connection.id(), %error, "ignoring dispose error");
            }
        }
        connections.clear();
        if count > 0 {
            tracing::info!(connections = count, "network scene disposed");
        }
    }
}

impl Drop for SceneShared {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn deliver(
    component: &Rc<RefCell<dyn NetworkComponent>>,
    message: &SceneGraphMessage,
    address: Address,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut handler = component
            .try_borrow_mut()
            .map_err(|_| ComponentError::Busy)?;
        handler.process_message(message)
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::error!(
            object = %address.object,
            component = %address.component,
            %error,
            "component failed to process message"
        ),
        Err(payload) => tracing::error!(
            object = %address.object,
            component = %address.component,
            panic = panic_message(payload.as_ref()),
            "component panicked while processing message"
        ),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// NetworkScene
// ---------------------------------------------------------------------------

/// Connects networked components to network connections.
///
/// Cloning gives another handle to the same scene. When the last handle
/// goes away every connection is disposed.
///
/// The scene is single-threaded: handlers run on the thread that calls
/// [`tick`](Self::tick), one message at a time.
#[derive(Clone)]
pub struct NetworkScene {
    shared: Rc<SceneShared>,
}

impl NetworkScene {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            shared: Rc::new(SceneShared::new(config)),
        }
    }

    pub(crate) fn from_shared(shared: Rc<SceneShared>) -> Self {
        Self { shared }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.shared.config
    }

    /// The buffer pool outgoing messages are rented from.
    pub fn pool(&self) -> &BufferPool {
        self.shared.pool()
    }

    // -- connections --------------------------------------------------------

    /// Adds a connection. It is drained on every tick and receives every
    /// outgoing message from now on.
    pub fn add_connection(&self, connection: impl Connection) -> ConnectionId {
        let id = connection.id();
        self.shared
            .connections
            .borrow_mut()
            .push(Box::new(connection));
        tracing::info!(conn = %id, "connection added");
        id
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connections.borrow().len()
    }

    /// Disposes and forgets every connection. Errors from individual
    /// connections are logged and skipped.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    // -- identity -----------------------------------------------------------

    /// Derives an id from `name`, the same on every peer.
    ///
    /// The name is released again once the object it named has been
    /// pruned from the registry.
    ///
    /// # Errors
    /// [`SceneError::DuplicateName`] if `name` is still assigned in this
    /// scene, including when a different name hashes to the same id.
    pub fn assign_id_by_name(&self, name: &str) -> Result<NetworkId, SceneError> {
        let id = NetworkId::from_name(name);
        let mut named = self.shared.named.borrow_mut();
        if let Some(other) = named.get(&id) {
            if other != name {
                tracing::warn!(%id, name, other = other.as_str(), "name hash collision");
            }
            return Err(SceneError::DuplicateName(name.to_owned()));
        }
        named.insert(id, name.to_owned());
        Ok(id)
    }

    /// Draws a random id that is not in use anywhere in this scene.
    ///
    /// Ids picked independently by other peers are not checked.
    pub fn generate_unique_id(&self) -> Result<NetworkId, SceneError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = NetworkId::random();
            if !self.shared.id_in_use(candidate) {
                self.shared.issued.borrow_mut().insert(candidate);
                return Ok(candidate);
            }
            tracing::debug!(id = %candidate, "generated id already in use; drawing again");
        }
        Err(SceneError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
    }

    /// A network object whose id is derived from its name.
    pub fn object_by_name(&self, name: &str) -> Result<Rc<Node>, SceneError> {
        let id = self.assign_id_by_name(name)?;
        Ok(Node::object(name, id))
    }

    /// A network object with a freshly generated id.
    pub fn spawn_object(&self, name: &str) -> Result<Rc<Node>, SceneError> {
        let id = self.generate_unique_id()?;
        Ok(Node::object(name, id))
    }

    // -- registration -------------------------------------------------------

    /// Builds the send context a component of type `C` on `node` will use,
    /// without registering anything.
    pub fn context<C: NetworkComponent>(
        &self,
        node: &Rc<Node>,
    ) -> Result<NetworkContext, SceneError> {
        let (object, object_id) = node
            .owning_object()
            .and_then(|object| object.network_id().map(|id| (object, id)))
            .ok_or_else(|| SceneError::NoNetworkObject(node.name().to_owned()))?;
        let component_id = component_id_of::<C>()?;
        Ok(NetworkContext::new(
            Rc::downgrade(&self.shared),
            &object,
            object_id,
            component_id,
        ))
    }

    /// Queues `component` for insertion under `context`'s address. The
    /// registry picks it up at the end of the next tick.
    ///
    /// # Errors
    /// [`SceneError::DuplicateObjectId`] if another live object already
    /// holds, or is queued with, the same network id.
    pub fn register_component<C: NetworkComponent>(
        &self,
        context: &NetworkContext,
        component: &Rc<RefCell<C>>,
    ) -> Result<(), SceneError> {
        let component_id = component_id_of::<C>()?;
        if context.component_id() != component_id {
            return Err(SceneError::ContextMismatch {
                expected: context.component_id(),
                found: component_id,
            });
        }
        let object = context.object_handle();
        if self.shared.id_held_by_other(context.object_id(), &object) {
            return Err(SceneError::DuplicateObjectId(context.object_id()));
        }
        let handle: Rc<RefCell<dyn NetworkComponent>> = component.clone();
        self.shared.pending.borrow_mut().push(Registration {
            object,
            object_id: context.object_id(),
            component_id,
            handle: Rc::downgrade(&handle),
        });
        tracing::trace!(object = %context.object_id(), component = %component_id, "registration queued");
        Ok(())
    }

    /// [`context`](Self::context) followed by
    /// [`register_component`](Self::register_component).
    pub fn register<C: NetworkComponent>(
        &self,
        node: &Rc<Node>,
        component: &Rc<RefCell<C>>,
    ) -> Result<NetworkContext, SceneError> {
        let context = self.context::<C>(node)?;
        self.register_component(&context, component)?;
        Ok(context)
    }

    // -- dispatch -----------------------------------------------------------

    /// Runs one dispatch tick.
    ///
    /// 1. Drains every connection, routing each message as it arrives.
    /// 2. Applies queued registrations.
    /// 3. Prunes destroyed objects and dead components.
    ///
    /// Handler errors and panics are logged and never escape.
    pub fn tick(&self) -> TickSummary {
        if self.shared.ticking.replace(true) {
            tracing::warn!("tick called from inside a tick; ignored");
            return TickSummary::default();
        }

        let received = self.shared.receive_connection_messages();
        let applied = self.shared.apply_pending();
        let pruned = self.shared.prune();
        self.shared.ticking.set(false);

        if applied > 0 || pruned > 0 {
            tracing::debug!(received, applied, pruned, "registry flushed");
        }
        TickSummary {
            received,
            applied,
            pruned,
        }
    }

    /// Sends a framed message to every connection.
    pub fn send(&self, message: SceneGraphMessage) {
        self.shared.send(message);
    }

    /// Encodes and sends a sync message to `address` on every connection.
    pub fn send_sync(&self, address: Address, message: &SyncMessage) -> Result<(), SceneError> {
        self.shared.send_sync(address, message)
    }

    // -- inspection ---------------------------------------------------------

    /// Whether a live component is registered at `address`. Pending
    /// registrations don't count until the next tick.
    pub fn is_registered(&self, address: Address) -> bool {
        self.shared.registry.borrow().contains(address)
    }

    /// Every `(object, component)` pair currently in the registry.
    pub fn addresses(&self) -> Vec<Address> {
        self.shared.registry.borrow().addresses()
    }

    pub fn object_count(&self) -> usize {
        self.shared.registry.borrow().object_count()
    }

    pub fn component_count(&self) -> usize {
        self.shared.registry.borrow().component_count()
    }

    pub fn pending_registrations(&self) -> usize {
        self.shared.pending.borrow().len()
    }
}

impl Default for NetworkScene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl fmt::Debug for NetworkScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkScene")
            .field("connections", &self.connection_count())
            .field("objects", &self.object_count())
            .field("components", &self.component_count())
            .field("pending", &self.pending_registrations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_id_by_name_rejects_duplicates() {
        let scene = NetworkScene::default();
        let id = scene.assign_id_by_name("Ball 1").unwrap();
        assert_eq!(id, NetworkId::from_name("Ball 1"));
        assert!(matches!(
            scene.assign_id_by_name("Ball 1"),
            Err(SceneError::DuplicateName(name)) if name == "Ball 1"
        ));
    }

    #[test]
    fn test_generated_ids_do_not_repeat() {
        let scene = NetworkScene::default();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            assert!(seen.insert(scene.generate_unique_id().unwrap()));
        }
    }

    #[test]
    fn test_generated_id_avoids_named_ids() {
        let scene = NetworkScene::default();
        let named = scene.assign_id_by_name("Table").unwrap();
        assert!(scene.shared.id_in_use(named));
    }

    #[test]
    fn test_name_is_released_once_its_object_is_pruned() {
        struct Quiet;
        impl NetworkComponent for Quiet {
            fn process_message(&mut self, _: &SceneGraphMessage) -> Result<(), ComponentError> {
                Ok(())
            }
        }

        let scene = NetworkScene::default();
        let node = scene.object_by_name("Crate").unwrap();
        let component = Rc::new(RefCell::new(Quiet));
        scene.register(&node, &component).unwrap();
        scene.tick();
        assert!(scene.object_by_name("Crate").is_err());

        drop(node);
        assert_eq!(scene.tick().pruned, 1);
        assert!(!scene.shared.id_in_use(NetworkId::from_name("Crate")));
        assert!(scene.object_by_name("Crate").is_ok());
    }

    #[test]
    fn test_generated_id_is_forgotten_after_prune() {
        struct Quiet;
        impl NetworkComponent for Quiet {
            fn process_message(&mut self, _: &SceneGraphMessage) -> Result<(), ComponentError> {
                Ok(())
            }
        }

        let scene = NetworkScene::default();
        let node = scene.spawn_object("Ball").unwrap();
        let id = node.network_id().unwrap();
        let component = Rc::new(RefCell::new(Quiet));
        scene.register(&node, &component).unwrap();
        scene.tick();
        assert!(scene.shared.issued.borrow().contains(&id));

        drop(node);
        scene.tick();
        assert!(scene.shared.issued.borrow().is_empty());
        assert!(!scene.shared.id_in_use(id));
    }

    #[test]
    fn test_panic_message_extracts_text() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_empty_tick_is_a_no_op() {
        let scene = NetworkScene::default();
        assert_eq!(scene.tick(), TickSummary::default());
        assert_eq!(scene.object_count(), 0);
    }
}
