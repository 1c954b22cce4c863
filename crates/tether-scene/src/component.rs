//! The handler contract and component id resolution.

use std::any::TypeId;

use tether_protocol::{ComponentId, SceneGraphMessage};

use crate::{ComponentError, SceneError};

/// A message handler bound to one slot of a network object.
pub trait NetworkComponent: 'static {
    /// Handles one message addressed to this component.
    ///
    /// Errors are logged by the dispatcher and do not stop the tick.
    fn process_message(&mut self, message: &SceneGraphMessage) -> Result<(), ComponentError>;

    /// An explicit id binding, for components whose id must not follow
    /// their type name.
    fn id_override() -> Option<ComponentIdOverride>
    where
        Self: Sized,
    {
        None
    }
}

/// Binds an explicit [`ComponentId`] to one concrete type.
///
/// The type is recorded so an override copied onto another component
/// type is caught instead of silently sharing a slot.
#[derive(Debug, Clone, Copy)]
pub struct ComponentIdOverride {
    type_id: TypeId,
    type_name: &'static str,
    id: ComponentId,
}

impl ComponentIdOverride {
    /// Declares `id` as the component id of `T`.
    pub fn of<T: 'static>(id: i32) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            id: ComponentId(id),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }
}

/// Resolves the component id for `C`.
///
/// Defaults to the portable hash of the unqualified type name. An
/// override must name `C` itself.
pub fn component_id_of<C: NetworkComponent>() -> Result<ComponentId, SceneError> {
    match C::id_override() {
        Some(binding) if binding.type_id != TypeId::of::<C>() => {
            Err(SceneError::ComponentIdMismatch {
                declared: binding.type_name,
                actual: std::any::type_name::<C>(),
            })
        }
        Some(binding) => Ok(binding.id),
        None => Ok(ComponentId::from_type_name(short_type_name::<C>())),
    }
}

/// `my_crate::module::Thing<u8>` → `Thing`.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
