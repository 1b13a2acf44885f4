//! # Core Module
//!
//! Shared abstractions used by the collision and animation subsystems.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration for all subsystems
//! - **Error**: Crate-level error type

pub mod config;
pub mod error;

pub use config::{AnimationConfig, CollisionConfig, Config, ConfigError, CoreConfig, EngineConfig};
pub use error::CoreError;
