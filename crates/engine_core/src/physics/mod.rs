//! Physics module for collision detection
//!
//! Provides OBB-tree based mesh/mesh and ray/mesh queries.

pub mod collision;

pub use collision::{
    CollisionTree,
    CollisionWorld,
    MeshId,
    ObbTree,
    OrientedBox,
    Ray,
    RayHit,
    Triangle,
};
