//! Scene configuration.

use serde::{Deserialize, Serialize};
use tether_transport::{DEFAULT_BUFFER_CAPACITY, DEFAULT_RETAINED_BUFFERS};

/// Tuning knobs for a [`NetworkScene`](crate::NetworkScene).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Most idle buffers the pool keeps for reuse.
    pub retained_buffers: usize,

    /// Capacity reserved for newly allocated buffers.
    pub buffer_capacity: usize,

    /// Cap on messages drained from one connection per tick.
    /// `None` drains until the connection reports nothing pending.
    pub drain_limit: Option<usize>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            retained_buffers: DEFAULT_RETAINED_BUFFERS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            drain_limit: None,
        }
    }
}
