//! Attachment hierarchy.
//!
//! A [`Node`] stands in for a host-engine object. Nodes that carry a
//! [`NetworkId`] are network objects; plain nodes hang below them and
//! resolve their identity by walking up.

use std::fmt;
use std::rc::{Rc, Weak};

use tether_protocol::NetworkId;

/// One object in the host's attachment hierarchy.
///
/// Children hold their parent weakly, so dropping a parent ends the
/// lifetime of its identity even while children are still referenced.
pub struct Node {
    name: String,
    identity: Option<NetworkId>,
    parent: Option<Weak<Node>>,
}

impl Node {
    /// A network object with a fixed identity.
    pub fn object(name: impl Into<String>, id: NetworkId) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            identity: Some(id),
            parent: None,
        })
    }

    /// A network object nested below another node.
    pub fn object_under(name: impl Into<String>, id: NetworkId, parent: &Rc<Node>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            identity: Some(id),
            parent: Some(Rc::downgrade(parent)),
        })
    }

    /// A plain node with no identity of its own.
    pub fn child(name: impl Into<String>, parent: &Rc<Node>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            identity: None,
            parent: Some(Rc::downgrade(parent)),
        })
    }

    /// A detached plain node.
    pub fn root(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            identity: None,
            parent: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// This node's own identity, if it is a network object.
    pub fn network_id(&self) -> Option<NetworkId> {
        self.identity
    }

    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// The nearest network object at or above this node.
    pub fn owning_object(self: &Rc<Self>) -> Option<Rc<Node>> {
        let mut current = Some(Rc::clone(self));
        while let Some(node) = current {
            if node.identity.is_some() {
                return Some(node);
            }
            current = node.parent();
        }
        None
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .finish()
    }
}
