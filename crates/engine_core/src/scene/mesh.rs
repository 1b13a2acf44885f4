//! Triangle mesh geometry
//!
//! A [`TriMesh`] owns vertex, normal, and index buffers plus a geometry
//! version counter. Every geometry change bumps the version, and the
//! mesh's collision tree is a cache keyed by that version: it is rebuilt the
//! next time a query refreshes it, and is never handed out while stale.

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::core::config::CollisionConfig;
use crate::foundation::math::{Transform, Vec3};
use crate::physics::collision::{self, CollisionTree, ObbTree, Ray, RayHit, Triangle};

use super::bounds::AABB;

/// Mesh arrays that violate the triangle mesh invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Index buffer length is not a multiple of three
    #[error("index count {count} is not a multiple of 3")]
    IndexCountNotMultipleOfThree {
        /// Length of the index buffer
        count: usize,
    },

    /// An index references a vertex that does not exist
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending index value
        index: u32,
        /// Where in the index buffer it appears
        position: usize,
        /// Number of vertices available
        vertex_count: usize,
    },

    /// Normal buffer is neither empty nor one-per-vertex
    #[error("{normals} normals supplied for {vertices} vertices")]
    NormalCountMismatch {
        /// Number of vertices
        vertices: usize,
        /// Number of normals
        normals: usize,
    },

    /// A vertex position contains NaN or infinity
    #[error("vertex {index} is not finite")]
    NonFiniteVertex {
        /// Offending vertex
        index: usize,
    },

    /// Vertex data replacement with a different vertex count
    #[error("expected {expected} vertices, got {actual}")]
    VertexCountChanged {
        /// Current vertex count
        expected: usize,
        /// Supplied vertex count
        actual: usize,
    },
}

fn check_finite(vertices: &[Vec3]) -> Result<(), GeometryError> {
    match vertices.iter().position(|v| v.iter().any(|c| !c.is_finite())) {
        Some(index) => Err(GeometryError::NonFiniteVertex { index }),
        None => Ok(()),
    }
}

/// Check vertex, normal, and index arrays against the mesh invariants
pub fn validate_geometry(vertices: &[Vec3], normals: &[Vec3], indices: &[u32]) -> Result<(), GeometryError> {
    if indices.len() % 3 != 0 {
        return Err(GeometryError::IndexCountNotMultipleOfThree { count: indices.len() });
    }
    if !normals.is_empty() && normals.len() != vertices.len() {
        return Err(GeometryError::NormalCountMismatch {
            vertices: vertices.len(),
            normals: normals.len(),
        });
    }
    check_finite(vertices)?;
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|(_, &i)| i as usize >= vertices.len())
    {
        return Err(GeometryError::IndexOutOfRange {
            index,
            position,
            vertex_count: vertices.len(),
        });
    }
    Ok(())
}

/// Indexed triangle mesh with a versioned collision cache
#[derive(Debug, Clone)]
pub struct TriMesh {
    name: String,
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    version: u64,
    world: Transform,
    model_bound: Option<AABB>,
    collision_config: CollisionConfig,
    collision: Option<CollisionTree>,
}

impl TriMesh {
    /// Create a mesh, rejecting arrays that break the invariants
    ///
    /// `normals` may be empty; otherwise it needs one entry per vertex.
    pub fn new(vertices: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, GeometryError> {
        validate_geometry(&vertices, &normals, &indices)?;
        let model_bound = AABB::from_points(&vertices);
        Ok(Self {
            name: String::new(),
            vertices,
            normals,
            indices,
            version: 0,
            world: Transform::identity(),
            model_bound,
            collision_config: CollisionConfig::default(),
            collision: None,
        })
    }

    /// Builder-style name used in log messages
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style collision tree settings
    pub fn with_collision_config(mut self, config: CollisionConfig) -> Self {
        self.set_collision_config(config);
        self
    }

    /// Mesh name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertex positions in model space
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Vertex normals in model space (may be empty)
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Triangle index buffer
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Geometry version; bumped by every geometry change
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Model-space triangle by index
    pub fn triangle(&self, index: usize) -> Triangle {
        let i = &self.indices[index * 3..index * 3 + 3];
        Triangle::new(
            self.vertices[i[0] as usize],
            self.vertices[i[1] as usize],
            self.vertices[i[2] as usize],
        )
    }

    /// World-space triangle by index
    pub fn world_triangle(&self, index: usize) -> Triangle {
        self.triangle(index).transformed(&self.world)
    }

    /// Atomically replace all geometry
    ///
    /// On error the mesh is left untouched.
    pub fn reconstruct(&mut self, vertices: Vec<Vec3>, normals: Vec<Vec3>, indices: Vec<u32>) -> Result<(), GeometryError> {
        validate_geometry(&vertices, &normals, &indices)?;
        self.vertices = vertices;
        self.normals = normals;
        self.indices = indices;
        self.geometry_changed();
        self.update_model_bound();
        Ok(())
    }

    /// Replace vertex positions and normals, keeping the index buffer
    pub fn set_vertex_data(&mut self, vertices: &[Vec3], normals: &[Vec3]) -> Result<(), GeometryError> {
        if vertices.len() != self.vertices.len() {
            return Err(GeometryError::VertexCountChanged {
                expected: self.vertices.len(),
                actual: vertices.len(),
            });
        }
        if !normals.is_empty() && normals.len() != vertices.len() {
            return Err(GeometryError::NormalCountMismatch {
                vertices: vertices.len(),
                normals: normals.len(),
            });
        }
        check_finite(vertices)?;

        self.vertices.copy_from_slice(vertices);
        if normals.is_empty() {
            self.normals.clear();
        } else {
            self.normals = normals.to_vec();
        }
        self.geometry_changed();
        Ok(())
    }

    /// Edit positions and normals through a closure; buffer lengths cannot change
    ///
    /// The edit runs on a copy. If it leaves a non-finite position the mesh is
    /// left untouched.
    pub fn modify_vertices<F>(&mut self, edit: F) -> Result<(), GeometryError>
    where
        F: FnOnce(&mut [Vec3], &mut [Vec3]),
    {
        let mut vertices = self.vertices.clone();
        let mut normals = self.normals.clone();
        edit(&mut vertices, &mut normals);
        check_finite(&vertices)?;

        self.vertices = vertices;
        self.normals = normals;
        self.geometry_changed();
        self.update_model_bound();
        Ok(())
    }

    fn geometry_changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// World placement of the mesh
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// Move the mesh; collision world bounds follow on the next refresh
    pub fn set_world_transform(&mut self, world: Transform) {
        self.world = world;
    }

    /// Recompute the model-space bound from the current vertices
    pub fn update_model_bound(&mut self) -> Option<AABB> {
        self.model_bound = AABB::from_points(&self.vertices);
        self.model_bound
    }

    /// Model-space bound as of the last update
    pub fn model_bound(&self) -> Option<AABB> {
        self.model_bound
    }

    /// World-space box around the model bound
    pub fn world_bound(&self) -> Option<AABB> {
        self.model_bound.map(|b| b.transformed(&self.world))
    }

    /// Raw position bytes for a vertex buffer upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw normal bytes for a vertex buffer upload
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Raw index bytes for an index buffer upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Collision tree settings
    pub fn collision_config(&self) -> &CollisionConfig {
        &self.collision_config
    }

    /// Change collision tree settings; drops the cached tree
    pub fn set_collision_config(&mut self, config: CollisionConfig) {
        if config != self.collision_config {
            self.collision_config = config;
            self.collision = None;
        }
    }

    /// Bring the collision cache up to date and return it
    ///
    /// Rebuilds the OBB tree only when the geometry version changed since the
    /// last build; the world bound is refreshed every call.
    pub fn refresh_collision(&mut self) -> &CollisionTree {
        let refreshed = match self.collision.take() {
            Some(mut cached) if cached.tree().source_version() == self.version => {
                cached.refresh(&self.world);
                cached
            }
            _ => {
                debug!("Rebuilding collision tree for mesh '{}' (version {})", self.name, self.version);
                let tree = ObbTree::build(self, &self.collision_config);
                CollisionTree::new(Arc::new(tree), &self.world)
            }
        };
        self.collision.insert(refreshed)
    }

    /// The cached collision tree, or `None` when it was never built or is
    /// older than the current geometry or placement
    pub fn collision_tree(&self) -> Option<&CollisionTree> {
        let cached = self.collision.as_ref()?;
        if cached.tree().source_version() != self.version || cached.world_transform() != &self.world {
            warn!("Collision tree for mesh '{}' is stale; call refresh_collision first", self.name);
            return None;
        }
        Some(cached)
    }

    /// Whether any triangle candidates of the two meshes overlap
    pub fn intersects_mesh(&mut self, other: &mut TriMesh) -> bool {
        self.refresh_collision();
        other.refresh_collision();
        match (self.collision_tree(), other.collision_tree()) {
            (Some(a), Some(b)) => collision::intersects(a, b),
            _ => false,
        }
    }

    /// Candidate triangle pairs as parallel index lists
    pub fn find_intersecting_triangles(&mut self, other: &mut TriMesh) -> (Vec<usize>, Vec<usize>) {
        self.refresh_collision();
        other.refresh_collision();
        match (self.collision_tree(), other.collision_tree()) {
            (Some(a), Some(b)) => collision::find_intersecting_triangles(a, b),
            _ => (Vec::new(), Vec::new()),
        }
    }

    /// Triangles whose bounds the ray passes through
    pub fn find_ray_hits(&mut self, ray: &Ray) -> Vec<usize> {
        collision::find_ray_hits(self.refresh_collision(), ray)
    }

    /// Closest exact hit of the ray on this mesh
    pub fn pick(&mut self, ray: &Ray) -> Option<RayHit> {
        collision::pick_closest(self.refresh_collision(), ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriMesh {
        TriMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![Vec3::z(); 4],
            vec![0, 1, 2, 0, 2, 3],
        )
        .unwrap()
        .with_name("quad")
    }

    #[test]
    fn test_validation_errors() {
        let v = vec![Vec3::zeros(); 3];
        assert_eq!(
            TriMesh::new(v.clone(), Vec::new(), vec![0, 1]).unwrap_err(),
            GeometryError::IndexCountNotMultipleOfThree { count: 2 }
        );
        assert_eq!(
            TriMesh::new(v.clone(), Vec::new(), vec![0, 1, 5]).unwrap_err(),
            GeometryError::IndexOutOfRange { index: 5, position: 2, vertex_count: 3 }
        );
        assert_eq!(
            TriMesh::new(v.clone(), vec![Vec3::z()], vec![0, 1, 2]).unwrap_err(),
            GeometryError::NormalCountMismatch { vertices: 3, normals: 1 }
        );
        let mut bad = v;
        bad[1].y = f32::NAN;
        assert_eq!(
            TriMesh::new(bad, Vec::new(), vec![0, 1, 2]).unwrap_err(),
            GeometryError::NonFiniteVertex { index: 1 }
        );
    }

    #[test]
    fn test_reconstruct_is_atomic() {
        let mut mesh = quad();
        let before = mesh.version();
        assert!(mesh.reconstruct(vec![Vec3::zeros()], Vec::new(), vec![0, 0, 1]).is_err());
        assert_eq!(mesh.version(), before);
        assert_eq!(mesh.triangle_count(), 2);

        mesh.reconstruct(vec![Vec3::zeros(), Vec3::x(), Vec3::y()], Vec::new(), vec![0, 1, 2])
            .unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.version() > before);
        assert_eq!(mesh.model_bound().unwrap().max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_modify_vertices_rejects_non_finite_edit() {
        let mut mesh = quad();
        let before = mesh.version();
        let tree = mesh.refresh_collision().shared_tree();

        let err = mesh.modify_vertices(|v, _| v[1].x = f32::NAN).unwrap_err();
        assert_eq!(err, GeometryError::NonFiniteVertex { index: 1 });
        assert_eq!(mesh.version(), before);
        assert!(mesh.vertices()[1].x.is_finite());
        assert!(Arc::ptr_eq(&tree, &mesh.collision_tree().unwrap().shared_tree()));

        // A valid edit refreshes the model bound
        mesh.modify_vertices(|v, _| v[3].z = 2.0).unwrap();
        assert!(mesh.version() > before);
        assert_eq!(mesh.model_bound().unwrap().max.z, 2.0);
        let root = *mesh.refresh_collision().world_bound().unwrap();
        assert!(root.center.iter().all(|c| c.is_finite()));
        assert!(root.half_extents.iter().all(|h| h.is_finite() && *h >= 0.0));
    }

    #[test]
    fn test_collision_cache_tracks_geometry_version() {
        let mut mesh = quad();
        assert!(mesh.collision_tree().is_none());

        let built = mesh.refresh_collision().shared_tree();
        assert_eq!(built.source_version(), mesh.version());

        // Refresh without changes reuses the tree
        let reused = mesh.refresh_collision().shared_tree();
        assert!(Arc::ptr_eq(&built, &reused));

        // Geometry change makes the cache stale until refreshed
        mesh.modify_vertices(|v, _| v[2].z = 0.5).unwrap();
        assert!(mesh.collision_tree().is_none());
        let rebuilt = mesh.refresh_collision().shared_tree();
        assert!(!Arc::ptr_eq(&built, &rebuilt));
        assert_eq!(rebuilt.source_version(), mesh.version());
    }

    #[test]
    fn test_moving_mesh_invalidates_world_bound_until_refresh() {
        let mut mesh = quad();
        mesh.refresh_collision();
        mesh.set_world_transform(Transform::from_position(Vec3::new(0.0, 0.0, 5.0)));
        assert!(mesh.collision_tree().is_none());

        let z = mesh.refresh_collision().world_bound().unwrap().center.z;
        assert!((z - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_mesh_level_queries_follow_transforms() {
        let mut a = quad();
        let mut b = quad();
        b.set_world_transform(Transform::from_position(Vec3::new(0.5, 0.5, 0.0)));
        assert!(a.intersects_mesh(&mut b));

        b.set_world_transform(Transform::from_position(Vec3::new(5.0, 0.0, 0.0)));
        assert!(!a.intersects_mesh(&mut b));

        let hit = a.pick(&Ray::new(Vec3::new(0.75, 0.25, 3.0), -Vec3::z())).unwrap();
        assert_eq!(hit.triangle, 0);
        // Both triangles share the quad's bounds, so both are candidates
        assert_eq!(a.find_ray_hits(&Ray::new(Vec3::new(0.1, 0.9, 3.0), -Vec3::z())), vec![0, 1]);
        assert_eq!(a.pick(&Ray::new(Vec3::new(0.1, 0.9, 3.0), -Vec3::z())).unwrap().triangle, 1);
        assert!(a.find_ray_hits(&Ray::new(Vec3::new(2.0, 0.5, 3.0), -Vec3::z())).is_empty());
    }

    #[test]
    fn test_set_vertex_data_keeps_topology() {
        let mut mesh = quad();
        let moved: Vec<Vec3> = mesh.vertices().iter().map(|v| v + Vec3::z()).collect();
        let before = mesh.version();
        mesh.set_vertex_data(&moved, &[]).unwrap();
        assert_eq!(mesh.version(), before + 1);
        assert!(mesh.normals().is_empty());
        assert_eq!(
            mesh.set_vertex_data(&moved[..2], &[]).unwrap_err(),
            GeometryError::VertexCountChanged { expected: 4, actual: 2 }
        );
    }

    #[test]
    fn test_byte_views() {
        let mesh = quad();
        assert_eq!(mesh.position_bytes().len(), 4 * 3 * 4);
        assert_eq!(mesh.index_bytes().len(), 6 * 4);
    }
}
