//! Vertex-to-joint bindings
//!
//! Each bound vertex follows exactly one joint. Skinning always starts from
//! the bind-pose copy retained here, never from the mesh's current buffers.

use log::warn;

use crate::foundation::math::{utils, Mat4, Point3, Vec3};
use crate::scene::TriMesh;

use super::{AnimationError, AnimationResult};

/// Per-vertex joint assignment plus the bind-pose vertex data
#[derive(Debug, Clone)]
pub struct JointMeshBinding {
    joints: Vec<Option<usize>>,
    bind_positions: Vec<Vec3>,
    bind_normals: Vec<Vec3>,
}

impl JointMeshBinding {
    /// Bind `mesh` in its current pose; `joints` holds one entry per vertex
    pub fn new(joints: Vec<Option<usize>>, mesh: &TriMesh) -> AnimationResult<Self> {
        if joints.len() != mesh.vertex_count() {
            return Err(AnimationError::BindingMismatch {
                bindings: joints.len(),
                vertices: mesh.vertex_count(),
            });
        }
        Ok(Self {
            joints,
            bind_positions: mesh.vertices().to_vec(),
            bind_normals: mesh.normals().to_vec(),
        })
    }

    /// Bind from importer data where negative indices mark unbound vertices
    pub fn from_import(joints: &[i32], mesh: &TriMesh) -> AnimationResult<Self> {
        let joints = joints.iter().map(|&j| usize::try_from(j).ok()).collect();
        Self::new(joints, mesh)
    }

    /// Joint driving a vertex
    pub fn joint(&self, vertex: usize) -> Option<usize> {
        self.joints[vertex]
    }

    /// Joint entry for every vertex
    pub fn joints(&self) -> &[Option<usize>] {
        &self.joints
    }

    /// Number of vertices attached to a joint
    pub fn bound_count(&self) -> usize {
        self.joints.iter().flatten().count()
    }

    /// Highest joint index referenced
    pub fn max_joint(&self) -> Option<usize> {
        self.joints.iter().flatten().copied().max()
    }

    /// Bind-pose positions
    pub fn bind_positions(&self) -> &[Vec3] {
        &self.bind_positions
    }

    /// Bind-pose normals
    pub fn bind_normals(&self) -> &[Vec3] {
        &self.bind_normals
    }

    /// Transform the bind pose by per-joint skinning matrices
    ///
    /// Unbound vertices keep their bind values. Output buffers are resized to
    /// match the bind pose.
    pub fn skin_into(&self, transforms: &[Mat4], positions: &mut Vec<Vec3>, normals: &mut Vec<Vec3>) {
        positions.clear();
        positions.extend(self.bind_positions.iter().zip(&self.joints).map(|(p, joint)| {
            match joint.and_then(|j| transforms.get(j)) {
                Some(m) => m.transform_point(&Point3::from(*p)).coords,
                None => *p,
            }
        }));

        normals.clear();
        normals.extend(self.bind_normals.iter().zip(&self.joints).map(|(n, joint)| {
            match joint.and_then(|j| transforms.get(j)) {
                Some(m) => utils::rotate_direction(m, n).try_normalize(f32::EPSILON).unwrap_or(*n),
                None => *n,
            }
        }));
    }
}

/// A mesh animated by a joint controller
#[derive(Debug, Clone)]
pub struct SkinnedMesh {
    mesh: TriMesh,
    binding: JointMeshBinding,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl SkinnedMesh {
    /// Attach a binding to the mesh it was built from
    pub fn new(mesh: TriMesh, binding: JointMeshBinding) -> AnimationResult<Self> {
        if binding.joints.len() != mesh.vertex_count() {
            return Err(AnimationError::BindingMismatch {
                bindings: binding.joints.len(),
                vertices: mesh.vertex_count(),
            });
        }
        Ok(Self {
            mesh,
            binding,
            positions: Vec::new(),
            normals: Vec::new(),
        })
    }

    /// Bind every vertex to a single joint
    pub fn rigid(mesh: TriMesh, joint: usize) -> AnimationResult<Self> {
        let binding = JointMeshBinding::new(vec![Some(joint); mesh.vertex_count()], &mesh)?;
        Self::new(mesh, binding)
    }

    /// The live mesh
    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    /// Mutable access for placement and collision queries
    ///
    /// Replacing geometry through this handle does not update the binding.
    pub fn mesh_mut(&mut self) -> &mut TriMesh {
        &mut self.mesh
    }

    /// The vertex binding
    pub fn binding(&self) -> &JointMeshBinding {
        &self.binding
    }

    /// Give back the live mesh
    pub fn into_mesh(self) -> TriMesh {
        self.mesh
    }

    /// Write the skinned bind pose into the live mesh
    pub fn apply(&mut self, transforms: &[Mat4], update_model_bound: bool) {
        self.binding.skin_into(transforms, &mut self.positions, &mut self.normals);
        if let Err(err) = self.mesh.set_vertex_data(&self.positions, &self.normals) {
            warn!("Skipping skinned update of mesh '{}': {}", self.mesh.name(), err);
            return;
        }
        if update_model_bound {
            self.mesh.update_model_bound();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Transform};
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn segment() -> TriMesh {
        TriMesh::new(
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0)],
            vec![Vec3::x(); 3],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_import_indices_mark_unbound_vertices() {
        let binding = JointMeshBinding::from_import(&[0, -1, 1], &segment()).unwrap();
        assert_eq!(binding.joints(), &[Some(0), None, Some(1)]);
        assert_eq!(binding.bound_count(), 2);
        assert_eq!(binding.max_joint(), Some(1));

        assert!(matches!(
            JointMeshBinding::from_import(&[0, 0], &segment()),
            Err(AnimationError::BindingMismatch { bindings: 2, vertices: 3 })
        ));
    }

    #[test]
    fn test_skinning_starts_from_bind_pose() {
        let binding = JointMeshBinding::from_import(&[0, -1, 0], &segment()).unwrap();
        let mut skinned = SkinnedMesh::new(segment(), binding).unwrap();
        let quarter = Transform::from_rotation_translation(
            Quat::from_axis_angle(&Vec3::z_axis(), FRAC_PI_2),
            Vec3::zeros(),
        )
        .to_matrix();

        // Applying twice must not rotate twice
        skinned.apply(&[quarter], true);
        skinned.apply(&[quarter], true);

        let vertices = skinned.mesh().vertices();
        assert_relative_eq!(vertices[0], Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(vertices[1], Vec3::new(2.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(skinned.mesh().normals()[0], Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(skinned.mesh().model_bound().unwrap().min.x, -1.0, epsilon = EPSILON);
    }
}
