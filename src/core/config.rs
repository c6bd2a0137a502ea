//! Playback configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::Result;

/// Default cross-fade time used by one-shot returns and `play` helpers (seconds)
pub const DEFAULT_BLEND_TIME: f32 = 0.3;

/// Rate assumed when a clip file carries a non-positive ticks-per-second value
pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

/// Defaults shared by animation layers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Blend time used when a one-shot clip returns to its previous clip
    pub default_blend_time: f32,
    /// Multiplier applied to every `update` delta
    pub global_speed: f32,
    /// Fallback rate for clips without a usable ticks-per-second value
    pub default_ticks_per_second: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_blend_time: DEFAULT_BLEND_TIME,
            global_speed: 1.0,
            default_ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

impl AnimationConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnimationConfig::default();
        assert_eq!(config.default_blend_time, 0.3);
        assert_eq!(config.global_speed, 1.0);
        assert_eq!(config.default_ticks_per_second, 25.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AnimationConfig::from_json_str(r#"{ "global_speed": 2.0 }"#).unwrap();
        assert_eq!(config.global_speed, 2.0);
        assert_eq!(config.default_blend_time, DEFAULT_BLEND_TIME);
    }

    #[test]
    fn test_invalid_json() {
        let result = AnimationConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(crate::core::Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.json");
        let config = AnimationConfig {
            default_blend_time: 0.5,
            ..Default::default()
        };
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();

        let loaded = AnimationConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
