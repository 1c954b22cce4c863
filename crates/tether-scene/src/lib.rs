//! Network object registry and message dispatcher for Tether.
//!
//! A [`NetworkScene`] owns a set of connections and a registry that maps
//! network objects to their addressable components. Once per frame the
//! host calls [`NetworkScene::tick`]:
//!
//! ```text
//! connections ──receive──▶ route ──▶ component.process_message
//!                                         │
//!                                         └──send──▶ every connection
//! ```
//!
//! Registrations made at any time, including from inside a handler, are
//! queued and only reach the registry between scans. Objects are tracked
//! through weak handles and are pruned once the host drops them.

mod component;
mod config;
mod context;
mod error;
mod node;
mod registry;
mod scene;

pub use component::{component_id_of, ComponentIdOverride, NetworkComponent};
pub use config::SceneConfig;
pub use context::NetworkContext;
pub use error::{ComponentError, SceneError};
pub use node::Node;
pub use scene::{NetworkScene, TickSummary};
