//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the rigid/scaled [`Transform`] used for
//! mesh world placement and joint poses.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, UnitQuaternion, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Transform representing position, rotation, and scale
///
/// Applied to a point in scale, rotate, translate order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a rigid transform from a rotation and a translation
    pub fn from_rotation_translation(rotation: Quat, position: Vec3) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Builder-style uniform scale
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Builder-style per-axis scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Convert to a transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.rotation * self.scale.component_mul(point) + self.position
    }

    /// Apply this transform to a direction (no translation)
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * self.scale.component_mul(vector)
    }

    /// Whether all three scale factors are equal
    pub fn has_uniform_scale(&self) -> bool {
        let s = self.scale;
        (s.x - s.y).abs() <= f32::EPSILON && (s.y - s.z).abs() <= f32::EPSILON
    }

    /// Combine this transform with another (`self` applied after `other`)
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * self.scale.component_mul(&other.position),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }

    /// Get the inverse transform
    ///
    /// Exact for uniform scale; for non-uniform scale combined with rotation
    /// the result is only the TRS approximation.
    pub fn inverse(&self) -> Transform {
        let inv_scale = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);
        let inv_rotation = self.rotation.inverse();
        let inv_position = inv_scale.component_mul(&(inv_rotation * -self.position));

        Transform {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    /// Interpolate towards `other`: slerp for rotation, lerp for position and scale
    pub fn interpolate(&self, other: &Transform, t: f32) -> Transform {
        Transform {
            position: utils::lerp_vec3(&self.position, &other.position, t),
            rotation: utils::slerp(&self.rotation, &other.rotation, t),
            scale: utils::lerp_vec3(&self.scale, &other.scale, t),
        }
    }
}

/// Math utility functions
pub mod utils {
    use super::{Quat, Vec3};

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Component-wise linear interpolation
    pub fn lerp_vec3(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
        a + (b - a) * t
    }

    /// Spherical linear interpolation along the shortest arc
    ///
    /// Nearly parallel inputs fall back to a normalized lerp, which avoids the
    /// division by `sin(theta) ~ 0`.
    pub fn slerp(a: &Quat, b: &Quat, t: f32) -> Quat {
        let qa = *a.quaternion();
        let mut qb = *b.quaternion();
        let mut cos_theta = qa.dot(&qb);
        if cos_theta < 0.0 {
            qb = -qb;
            cos_theta = -cos_theta;
        }

        if cos_theta > 0.9995 {
            let blended = qa * (1.0 - t) + qb * t;
            return Quat::new_normalize(blended);
        }

        let theta = cos_theta.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin_theta;
        let wb = (t * theta).sin() / sin_theta;
        Quat::new_normalize(qa * wa + qb * wb)
    }

    /// Rotation-only part of a homogeneous matrix applied to a direction
    pub fn rotate_direction(matrix: &super::Mat4, direction: &Vec3) -> Vec3 {
        matrix.fixed_view::<3, 3>(0, 0) * direction
    }
}
