//! Collection of meshes queried against each other
//!
//! Broad phase compares world bounding boxes of each mesh's collision tree;
//! the narrow phase runs the simultaneous tree descent plus exact triangle
//! tests on the surviving pairs.

use log::{debug, trace};
use slotmap::{new_key_type, SlotMap};

use crate::core::config::CollisionConfig;
use crate::scene::TriMesh;

use super::intersect::{find_colliding_triangles, pick_closest};
use super::primitives::{Ray, RayHit};

new_key_type! {
    /// Handle to a mesh stored in a [`CollisionWorld`]
    pub struct MeshId;
}

/// Two meshes with at least one pair of touching triangles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshPair {
    /// Mesh with the smaller handle
    pub first: MeshId,
    /// Mesh with the larger handle
    pub second: MeshId,
    /// Touching triangles as `(index in first, index in second)`
    pub triangles: Vec<(usize, usize)>,
}

/// Closest ray hit across every mesh in a world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRayHit {
    /// Mesh that was hit
    pub mesh: MeshId,
    /// Hit details within that mesh
    pub hit: RayHit,
}

/// Owns meshes and answers pairwise collision and picking queries
#[derive(Debug, Default)]
pub struct CollisionWorld {
    meshes: SlotMap<MeshId, TriMesh>,
    config: CollisionConfig,
}

impl CollisionWorld {
    /// Create an empty world using the given tree settings for every mesh
    pub fn new(config: CollisionConfig) -> Self {
        Self {
            meshes: SlotMap::with_key(),
            config,
        }
    }

    /// Add a mesh; its collision settings are replaced by the world's
    pub fn insert(&mut self, mut mesh: TriMesh) -> MeshId {
        mesh.set_collision_config(self.config);
        let id = self.meshes.insert(mesh);
        debug!("Inserted mesh {:?} into collision world ({} total)", id, self.meshes.len());
        id
    }

    /// Remove a mesh, handing it back
    pub fn remove(&mut self, id: MeshId) -> Option<TriMesh> {
        self.meshes.remove(id)
    }

    /// Mesh by handle
    pub fn get(&self, id: MeshId) -> Option<&TriMesh> {
        self.meshes.get(id)
    }

    /// Mutable mesh by handle, for moving or reshaping it
    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut TriMesh> {
        self.meshes.get_mut(id)
    }

    /// Number of meshes
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether the world holds no meshes
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Iterate over all meshes
    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &TriMesh)> {
        self.meshes.iter()
    }

    fn refresh_all(&mut self) {
        for (_, mesh) in &mut self.meshes {
            mesh.refresh_collision();
        }
    }

    /// Every pair of meshes with touching triangles, ordered by handle
    pub fn colliding_pairs(&mut self) -> Vec<MeshPair> {
        self.refresh_all();

        let mut ids: Vec<MeshId> = self.meshes.keys().collect();
        ids.sort_unstable();

        let mut pairs = Vec::new();
        for (i, &first) in ids.iter().enumerate() {
            for &second in &ids[i + 1..] {
                let (Some(a), Some(b)) = (
                    self.meshes[first].collision_tree(),
                    self.meshes[second].collision_tree(),
                ) else {
                    continue;
                };

                // Broad phase on the root world boxes
                let overlapping = match (a.world_bound(), b.world_bound()) {
                    (Some(ba), Some(bb)) => ba.intersects(bb),
                    _ => false,
                };
                if !overlapping {
                    continue;
                }

                let triangles = find_colliding_triangles(a, b);
                trace!("{:?} vs {:?}: {} touching triangle pairs", first, second, triangles.len());
                if !triangles.is_empty() {
                    pairs.push(MeshPair { first, second, triangles });
                }
            }
        }
        pairs
    }

    /// Closest hit of `ray` over all meshes
    pub fn ray_cast(&mut self, ray: &Ray) -> Option<WorldRayHit> {
        self.refresh_all();

        let mut best: Option<WorldRayHit> = None;
        for (mesh_id, mesh) in &self.meshes {
            let Some(tree) = mesh.collision_tree() else {
                continue;
            };
            if let Some(hit) = pick_closest(tree, ray) {
                if best.map_or(true, |b| hit.distance < b.hit.distance) {
                    best = Some(WorldRayHit { mesh: mesh_id, hit });
                }
            }
        }
        best
    }
}
