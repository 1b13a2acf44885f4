//! Scene geometry
//!
//! Triangle meshes and the axis-aligned bounds used for model and world
//! extents. Meshes own their collision cache; see [`TriMesh::refresh_collision`].

mod bounds;
mod mesh;

pub use bounds::AABB;
pub use mesh::{validate_geometry, GeometryError, TriMesh};
