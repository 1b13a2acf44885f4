//! Collision detection between triangle meshes
//!
//! Each mesh is wrapped in an [`ObbTree`] built once from a geometry
//! snapshot. A [`CollisionTree`] places that tree in the world, and the
//! functions in [`intersect`] descend two placed trees together to find
//! candidate triangle pairs, or one tree against a ray.

pub mod intersect;
pub mod obb;
pub mod obb_tree;
pub mod primitives;
pub mod tree;
pub mod world;

pub use intersect::{find_colliding_triangles, find_intersecting_triangles, find_ray_hits, intersects, pick_closest};
pub use obb::OrientedBox;
pub use obb_tree::{NodeId, NodeKind, ObbNode, ObbTree};
pub use primitives::{Ray, RayHit, Triangle};
pub use tree::CollisionTree;
pub use world::{CollisionWorld, MeshId, MeshPair, WorldRayHit};
