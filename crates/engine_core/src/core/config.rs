//! # Unified Configuration System
//!
//! Configuration for the collision tree builder, the joint animation
//! controller, and crate-wide settings such as the log level.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: Logging and debug features
//! - **Collision Config**: OBB tree construction limits
//! - **Animation Config**: Playback defaults for joint controllers

use serde::{Deserialize, Serialize};

use crate::animation::RepeatMode;

pub use crate::config::{Config, ConfigError};

/// # Engine Configuration
///
/// Crate-wide behavior: logging and debug features.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level filter handed to `env_logger`
    pub log_level: String,
    /// Whether to enable debug features
    pub debug_mode: bool,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: cfg!(debug_assertions),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable debug mode
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Collision Configuration
///
/// Limits used when splitting a mesh into an OBB tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// A node holding at most this many triangles becomes a leaf
    pub max_leaf_triangles: usize,
    /// Hard cap on tree depth; nodes at this depth become leaves
    pub max_depth: usize,
}

impl CollisionConfig {
    /// Create the default collision configuration
    pub fn new() -> Self {
        Self {
            max_leaf_triangles: 4,
            max_depth: 32,
        }
    }

    /// Set the leaf threshold
    pub fn with_max_leaf_triangles(mut self, count: usize) -> Self {
        self.max_leaf_triangles = count;
        self
    }

    /// Set the depth cap
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_leaf_triangles == 0 {
            return Err(ConfigError::Invalid("max_leaf_triangles must be at least 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Animation Configuration
///
/// Defaults applied to joint controllers built from clips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Behavior when the clock leaves the playable time range
    pub repeat_mode: RepeatMode,
    /// Playback speed multiplier applied to every `dt`
    pub speed: f32,
    /// Whether to recompute each skinned mesh's model bound after an update
    pub update_model_bound: bool,
}

impl AnimationConfig {
    /// Create the default animation configuration
    pub fn new() -> Self {
        Self {
            repeat_mode: RepeatMode::Wrap,
            speed: 1.0,
            update_model_bound: true,
        }
    }

    /// Set repeat mode
    pub fn with_repeat_mode(mut self, mode: RepeatMode) -> Self {
        self.repeat_mode = mode;
        self
    }

    /// Set playback speed
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() {
            return Err(ConfigError::Invalid(format!("speed must be finite, got {}", self.speed)));
        }
        Ok(())
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Configuration
///
/// Top-level configuration applications load from a TOML or RON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Crate-wide settings
    pub engine: EngineConfig,
    /// Collision tree settings
    pub collision: CollisionConfig,
    /// Animation playback settings
    pub animation: AnimationConfig,
}

impl CoreConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.collision.validate()?;
        self.animation.validate()?;
        Ok(())
    }
}

impl Config for CoreConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collision.max_leaf_triangles, 4);
        assert_eq!(config.animation.repeat_mode, RepeatMode::Wrap);
    }

    #[test]
    fn test_rejects_zero_leaf_size() {
        let mut config = CoreConfig::default();
        config.collision = config.collision.with_max_leaf_triangles(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: CoreConfig = toml::from_str(
            "[animation]\nrepeat_mode = \"Cycle\"\nspeed = 2.0\n\n[collision]\nmax_leaf_triangles = 2\n",
        )
        .unwrap();

        assert_eq!(config.animation.repeat_mode, RepeatMode::Cycle);
        assert_eq!(config.animation.speed, 2.0);
        assert!(config.animation.update_model_bound);
        assert_eq!(config.collision.max_leaf_triangles, 2);
        assert_eq!(config.collision.max_depth, 32);
        assert_eq!(config.engine.log_level, "info");
    }

    #[test]
    fn test_ron_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("engine_core_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("core.ron");

        let mut config = CoreConfig::default();
        config.animation = config.animation.with_repeat_mode(RepeatMode::Clamp).with_speed(0.5);
        config.save_to_file(&path).unwrap();

        let loaded = CoreConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.animation, config.animation);
        assert_eq!(loaded.collision, config.collision);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = CoreConfig::load_from_file("settings.json").unwrap_err();
        // The read happens first, so a missing file reports IO
        assert!(matches!(err, ConfigError::Io(_) | ConfigError::UnsupportedFormat(_)));
        let err = CoreConfig::default().save_to_file("settings.json").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
