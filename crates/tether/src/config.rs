//! Peer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tether_scene::SceneConfig;
use tether_sync::FollowConfig;
use tether_tick::ClockConfig;

use crate::TetherError;

/// Everything a [`Peer`](crate::Peer) is built from. Missing sections
/// and fields take their defaults.
///
/// ```json
/// {
///   "scene": { "retained_buffers": 64, "drain_limit": 128 },
///   "clock": { "rate_hz": 90, "policy": { "kind": "catch_up", "max_catchup": 3 } },
///   "follow": { "gain": 15.0 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub scene: SceneConfig,
    pub clock: ClockConfig,
    pub follow: FollowConfig,
}

impl PeerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, TetherError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TetherError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TetherError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded peer config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_tick::ClockPolicy;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(PeerConfig::from_json_str("{}").unwrap(), PeerConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = PeerConfig::from_json_str(
            r#"{
                "scene": { "drain_limit": 128 },
                "clock": { "rate_hz": 90, "policy": { "kind": "catch_up", "max_catchup": 3 } },
                "follow": { "gain": 15.0 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.scene.drain_limit, Some(128));
        assert_eq!(config.scene.retained_buffers, SceneConfig::default().retained_buffers);
        assert_eq!(config.clock.rate_hz, 90);
        assert_eq!(config.clock.policy, ClockPolicy::CatchUp { max_catchup: 3 });
        assert_eq!(config.follow.gain, 15.0);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = PeerConfig::from_json_str("{ scene: ").unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PeerConfig::from_json_file("/nonexistent/tether/peer.json").unwrap_err();
        assert!(matches!(err, TetherError::Io { .. }));
    }
}
