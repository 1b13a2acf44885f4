//! Crate-level error type
//!
//! Each subsystem reports its own error enum; `CoreError` lets applications
//! propagate any of them with `?`.

use thiserror::Error;

use crate::animation::AnimationError;
use crate::config::ConfigError;
use crate::scene::GeometryError;

/// Any error raised by this crate
#[derive(Error, Debug)]
pub enum CoreError {
    /// Mesh arrays violated the triangle mesh invariants
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Skeleton, keyframe, or controller misuse
    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    /// Configuration could not be loaded or saved
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
