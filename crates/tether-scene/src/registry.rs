//! Object/component bookkeeping behind the dispatcher.
//!
//! Entries are only ever changed between scans: registrations land in a
//! pending queue and dead handles are swept after routing finishes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use tether_protocol::{Address, ComponentId, NetworkId};

use crate::{NetworkComponent, Node};

pub(crate) type ComponentHandle = Weak<RefCell<dyn NetworkComponent>>;

/// A queued insertion, applied at the next tick boundary.
pub(crate) struct Registration {
    pub(crate) object: Weak<Node>,
    pub(crate) object_id: NetworkId,
    pub(crate) component_id: ComponentId,
    pub(crate) handle: ComponentHandle,
}

/// Everything registered for one network object.
pub(crate) struct ObjectEntry {
    pub(crate) id: NetworkId,
    pub(crate) object: Weak<Node>,
    pub(crate) components: HashMap<ComponentId, ComponentHandle>,
}

impl ObjectEntry {
    pub(crate) fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }
}

/// Why [`Registry::insert`] turned a registration away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refusal {
    /// The object was dropped while its registration sat in the queue.
    ObjectGone,
    /// A different live object already holds this id.
    IdTaken,
}

/// Entries keyed by network id. One live object per id.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<NetworkId, ObjectEntry>,
}

impl Registry {
    pub(crate) fn get(&self, id: NetworkId) -> Option<&ObjectEntry> {
        self.entries.get(&id).filter(|entry| entry.is_alive())
    }

    /// Whether `id` belongs to a live object other than `object`.
    pub(crate) fn held_by_other(&self, id: NetworkId, object: &Weak<Node>) -> bool {
        self.get(id)
            .is_some_and(|entry| !Weak::ptr_eq(&entry.object, object))
    }

    /// A second component with the same id on the same object replaces
    /// the first. An entry whose object died but hasn't been swept yet is
    /// taken over by the newcomer.
    pub(crate) fn insert(&mut self, registration: Registration) -> Result<(), Refusal> {
        if registration.object.strong_count() == 0 {
            tracing::trace!(
                object = %registration.object_id,
                "object destroyed before its registration was applied"
            );
            return Err(Refusal::ObjectGone);
        }
        if self.held_by_other(registration.object_id, &registration.object) {
            tracing::warn!(
                object = %registration.object_id,
                component = %registration.component_id,
                "network id collision; registration dropped"
            );
            return Err(Refusal::IdTaken);
        }

        let entry = self
            .entries
            .entry(registration.object_id)
            .or_insert_with(|| ObjectEntry {
                id: registration.object_id,
                object: registration.object.clone(),
                components: HashMap::new(),
            });
        if !Weak::ptr_eq(&entry.object, &registration.object) {
            entry.object = registration.object;
            entry.components.clear();
        }

        let replaced = entry
            .components
            .insert(registration.component_id, registration.handle)
            .is_some_and(|old| old.strong_count() > 0);
        if replaced {
            tracing::debug!(
                object = %registration.object_id,
                component = %registration.component_id,
                "component slot re-registered"
            );
        }
        Ok(())
    }

    /// Drops dead components, then objects that are destroyed or left
    /// without any live component. Returns the ids that went away.
    pub(crate) fn sweep(&mut self) -> Vec<NetworkId> {
        let mut gone = Vec::new();
        self.entries.retain(|id, entry| {
            entry.components.retain(|_, handle| handle.strong_count() > 0);
            let keep = entry.is_alive() && !entry.components.is_empty();
            if !keep {
                gone.push(*id);
            }
            keep
        });
        gone
    }

    pub(crate) fn uses_id(&self, id: NetworkId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn contains(&self, address: Address) -> bool {
        self.get(address.object).is_some_and(|entry| {
            entry
                .components
                .get(&address.component)
                .is_some_and(|handle| handle.strong_count() > 0)
        })
    }

    /// Sorted by object, then component.
    pub(crate) fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self
            .entries
            .values()
            .flat_map(|entry| {
                entry.components.keys().map(|component| Address {
                    object: entry.id,
                    component: *component,
                })
            })
            .collect();
        addresses.sort_by_key(|address| (address.object, address.component));
        addresses
    }

    pub(crate) fn object_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn component_count(&self) -> usize {
        self.entries.values().map(|entry| entry.components.len()).sum()
    }
}
