//! Placed-object index.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tether_protocol::NetworkId;

use crate::Placeable;

/// Maps ids to placed objects so snap targets named on the wire can be
/// found. One index per peer; clones share it.
#[derive(Clone, Default)]
pub struct PlacedIndex {
    entries: Rc<RefCell<HashMap<NetworkId, Weak<RefCell<Placeable>>>>>,
}

impl PlacedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, id: NetworkId, placeable: Weak<RefCell<Placeable>>) {
        self.entries.borrow_mut().insert(id, placeable);
    }

    /// Removes `id` only if it still points at `placeable`.
    pub(crate) fn remove(&self, id: NetworkId, placeable: &Weak<RefCell<Placeable>>) {
        let mut entries = self.entries.borrow_mut();
        if entries
            .get(&id)
            .is_some_and(|current| Weak::ptr_eq(current, placeable))
        {
            entries.remove(&id);
        }
    }

    /// The placed object with this id, if it is still around.
    pub fn get(&self, id: NetworkId) -> Option<Rc<RefCell<Placeable>>> {
        self.entries.borrow().get(&id).and_then(Weak::upgrade)
    }

    pub fn contains(&self, id: NetworkId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live placed objects.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every live placed object.
    pub fn ids(&self) -> Vec<NetworkId> {
        self.entries
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl fmt::Debug for PlacedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacedIndex").field("placed", &self.len()).finish()
    }
}
