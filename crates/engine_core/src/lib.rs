//! # Engine Core
//!
//! Mesh collision and skeletal animation for a 3D engine.
//!
//! ## Features
//!
//! - **OBB Trees**: Oriented bounding box hierarchies over triangle meshes
//! - **Collision Queries**: Mesh/mesh candidate pairs, exact triangle pairs, ray picking
//! - **Joint Animation**: Sparse keyframes, hole filling, hierarchical skinning
//! - **Frame Hand-off**: Whole-frame publication from a logic thread to a render thread
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use engine_core::prelude::*;
//!
//! fn main() -> Result<(), CoreError> {
//!     let triangle = || TriMesh::new(
//!         vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
//!         Vec::new(),
//!         vec![0, 1, 2],
//!     );
//!
//!     let mut world = CollisionWorld::new(CollisionConfig::default());
//!     world.insert(triangle()?);
//!     world.insert(triangle()?);
//!     for pair in world.colliding_pairs() {
//!         println!("{:?} touches {:?}", pair.first, pair.second);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::cast_precision_loss)]

pub mod animation;
pub mod config;
pub mod core;
pub mod foundation;
pub mod physics;
pub mod scene;

#[cfg(test)]
mod tests;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        animation::{
            frame_channel, AnimationClip, AnimationError, ControllerState, FramePublisher, FrameReceiver,
            JointController, JointDesc, JointMeshBinding, RepeatMode, Skeleton, SkinnedFrame, SkinnedMesh,
        },
        core::{AnimationConfig, CollisionConfig, Config, CoreConfig, CoreError, EngineConfig},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        physics::collision::{
            find_colliding_triangles, find_intersecting_triangles, find_ray_hits, intersects, pick_closest,
            CollisionTree, CollisionWorld, MeshId, ObbTree, Ray, RayHit,
        },
        scene::{GeometryError, TriMesh, AABB},
    };
}
