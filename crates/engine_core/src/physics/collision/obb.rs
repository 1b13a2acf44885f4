//! Oriented bounding boxes
//!
//! Boxes are fit to point sets by principal component analysis: the
//! eigenvectors of the point covariance give the box orientation, and the
//! extents come from projecting every point onto those axes.

use crate::foundation::math::{Mat3, Transform, Vec3};
use crate::scene::AABB;

use super::primitives::Ray;

/// Relative padding added to fitted extents so float round-off never leaves a
/// source vertex outside its box
const FIT_PADDING: f32 = 1e-5;

/// Padding in units of `f32::EPSILON` per unit of coordinate magnitude; covers
/// the round-off of rebuilding a center far from the origin
const MAGNITUDE_PADDING_ULPS: f32 = 8.0;

/// Tolerance used by the separating axis test
const SAT_EPSILON: f32 = 1e-6;

/// A box with arbitrary orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    /// Center of the box
    pub center: Vec3,
    /// Orthonormal, right-handed box axes
    pub axes: [Vec3; 3],
    /// Half-size along each axis
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// Create a box from its parts; `axes` must be orthonormal
    pub fn new(center: Vec3, axes: [Vec3; 3], half_extents: Vec3) -> Self {
        Self { center, axes, half_extents }
    }

    /// Axis-aligned box with the same volume as `aabb`
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self::new(aabb.center(), [Vec3::x(), Vec3::y(), Vec3::z()], aabb.extents())
    }

    /// Fit a box around `points` using the covariance of the point set
    ///
    /// An empty slice yields a zero-sized box at the origin.
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::new(Vec3::zeros(), [Vec3::x(), Vec3::y(), Vec3::z()], Vec3::zeros());
        }

        let inv_count = 1.0 / points.len() as f32;
        let mean = points.iter().fold(Vec3::zeros(), |acc, p| acc + p) * inv_count;
        let covariance = points.iter().fold(Mat3::zeros(), |acc, p| {
            let d = p - mean;
            acc + d * d.transpose()
        }) * inv_count;

        let axes = principal_axes(&covariance);

        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for p in points {
            let d = p - mean;
            for (i, axis) in axes.iter().enumerate() {
                let proj = d.dot(axis);
                min[i] = min[i].min(proj);
                max[i] = max[i].max(proj);
            }
        }

        let mid = (min + max) * 0.5;
        let center = mean + axes[0] * mid.x + axes[1] * mid.y + axes[2] * mid.z;
        let mut half = (max - min) * 0.5;

        // The center is rebuilt in world coordinates, so measure again from it
        for p in points {
            let d = p - center;
            for (i, axis) in axes.iter().enumerate() {
                half[i] = half[i].max(d.dot(axis).abs());
            }
        }
        let pad = FIT_PADDING * half.max().max(1.0) + magnitude_padding(&center, &half);

        Self::new(center, axes, half.add_scalar(pad))
    }

    /// Index (0..3) of the axis with the largest half extent
    pub fn longest_axis(&self) -> usize {
        self.half_extents.imax()
    }

    /// Box volume
    pub fn volume(&self) -> f32 {
        8.0 * self.half_extents.x * self.half_extents.y * self.half_extents.z
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        let [ax, ay, az] = self.axes;
        let h = self.half_extents;
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 != 0 { 1.0 } else { -1.0 };
            let sy = if i & 2 != 0 { 1.0 } else { -1.0 };
            let sz = if i & 4 != 0 { 1.0 } else { -1.0 };
            *corner = self.center + ax * (sx * h.x) + ay * (sy * h.y) + az * (sz * h.z);
        }
        corners
    }

    /// Whether `point` lies inside the box, allowing `tolerance` slack per axis
    pub fn contains_point(&self, point: &Vec3, tolerance: f32) -> bool {
        let d = point - self.center;
        self.axes
            .iter()
            .enumerate()
            .all(|(i, axis)| d.dot(axis).abs() <= self.half_extents[i] + tolerance)
    }

    /// Axis-aligned box enclosing this one
    pub fn to_aabb(&self) -> AABB {
        let reach = Vec3::from_fn(|row, _| {
            self.axes
                .iter()
                .enumerate()
                .map(|(i, axis)| axis[row].abs() * self.half_extents[i])
                .sum()
        });
        AABB::from_center_extents(self.center, reach)
    }

    /// Separating axis test against another box (15 candidate axes)
    ///
    /// Touching boxes count as overlapping.
    pub fn intersects(&self, other: &OrientedBox) -> bool {
        let a = &self.axes;
        let b = &other.axes;
        let ea = self.half_extents;
        let eb = other.half_extents;

        // Rotation expressing B in A's frame
        let mut r = [[0.0f32; 3]; 3];
        let mut abs_r = [[0.0f32; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                r[i][j] = a[i].dot(&b[j]);
                abs_r[i][j] = r[i][j].abs() + SAT_EPSILON;
            }
        }

        let t_world = other.center - self.center;
        let t = [t_world.dot(&a[0]), t_world.dot(&a[1]), t_world.dot(&a[2])];

        // Axes A0, A1, A2
        for i in 0..3 {
            let ra = ea[i];
            let rb = eb[0] * abs_r[i][0] + eb[1] * abs_r[i][1] + eb[2] * abs_r[i][2];
            if t[i].abs() > ra + rb {
                return false;
            }
        }

        // Axes B0, B1, B2
        for j in 0..3 {
            let ra = ea[0] * abs_r[0][j] + ea[1] * abs_r[1][j] + ea[2] * abs_r[2][j];
            let rb = eb[j];
            let t_b = t[0] * r[0][j] + t[1] * r[1][j] + t[2] * r[2][j];
            if t_b.abs() > ra + rb {
                return false;
            }
        }

        // Cross axes Ai x Bj
        for i in 0..3 {
            let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
            for j in 0..3 {
                let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
                let ra = ea[i1] * abs_r[i2][j] + ea[i2] * abs_r[i1][j];
                let rb = eb[j1] * abs_r[i][j2] + eb[j2] * abs_r[i][j1];
                let t_term = t[i2] * r[i1][j] - t[i1] * r[i2][j];
                if t_term.abs() > ra + rb {
                    return false;
                }
            }
        }

        true
    }

    /// Slab test in the box frame; returns the entry distance along the ray
    /// (0 when the origin is inside)
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        if !ray.is_valid() {
            return None;
        }

        let offset = ray.origin - self.center;
        let mut t_enter = 0.0f32;
        let mut t_exit = f32::INFINITY;

        for (i, axis) in self.axes.iter().enumerate() {
            let origin = offset.dot(axis);
            let dir = ray.direction.dot(axis);
            let half = self.half_extents[i];

            if dir.abs() < 1e-9 {
                if origin.abs() > half {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let t1 = (-half - origin) * inv;
            let t2 = (half - origin) * inv;
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
            if t_exit < t_enter {
                return None;
            }
        }

        Some(t_enter)
    }

    /// Box enclosing this one after `transform` is applied
    ///
    /// Exact for uniform scale. Non-uniform scale shears the box, so the
    /// result keeps the rotated axes and widens each extent to the support of
    /// the sheared shape along that axis.
    pub fn transformed(&self, transform: &Transform) -> Self {
        let center = transform.transform_point(&self.center);
        let axes = self.axes.map(|axis| transform.rotation * axis);

        let half_extents = if transform.has_uniform_scale() {
            self.half_extents * transform.scale.x.abs()
        } else {
            let scaled = self.axes.map(|axis| transform.scale.component_mul(&axis));
            Vec3::from_fn(|i, _| {
                (0..3)
                    .map(|j| self.half_extents[j] * self.axes[i].dot(&scaled[j]).abs())
                    .sum()
            })
        };

        let pad = magnitude_padding(&center, &half_extents);
        Self::new(center, axes, half_extents.add_scalar(pad))
    }
}

/// Slack proportional to how far the box reaches from the origin
fn magnitude_padding(center: &Vec3, half_extents: &Vec3) -> f32 {
    let reach = center.abs().max() + half_extents.max();
    MAGNITUDE_PADDING_ULPS * f32::EPSILON * reach
}

/// Orthonormal, right-handed eigenbasis of a covariance matrix
///
/// Falls back to the world axes when the decomposition is not finite.
fn principal_axes(covariance: &Mat3) -> [Vec3; 3] {
    let world = [Vec3::x(), Vec3::y(), Vec3::z()];
    let eigen = covariance.symmetric_eigen();
    let vectors = eigen.eigenvectors;
    if vectors.iter().any(|v| !v.is_finite()) {
        return world;
    }

    let e0 = vectors.column(0).normalize();
    let e1 = vectors.column(1).normalize();
    let e2 = e0.cross(&e1);
    if e2.magnitude_squared() < 0.5 {
        return world;
    }
    // Re-orthogonalize e1 against round-off
    let e1 = e2.cross(&e0).normalize();

    [e0, e1, e2.normalize()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    fn unit_box_at(center: Vec3) -> OrientedBox {
        OrientedBox::new(center, [Vec3::x(), Vec3::y(), Vec3::z()], Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_fit_contains_every_point() {
        let points: Vec<Vec3> = (0..40)
            .map(|i| {
                let f = i as f32;
                Vec3::new(f * 0.5, f * 0.25 + (f * 1.3).sin(), (f * 0.7).cos() * 2.0)
            })
            .collect();

        let obb = OrientedBox::from_points(&points);
        for p in &points {
            assert!(obb.contains_point(p, 0.0), "point {p:?} escaped");
        }
    }

    #[test]
    fn test_fit_aligns_with_elongated_set() {
        // Points along a diagonal line in the xy-plane with small jitter
        let dir = Vec3::new(1.0, 1.0, 0.0).normalize();
        let side = Vec3::new(-1.0, 1.0, 0.0).normalize();
        let points: Vec<Vec3> = (0..20)
            .map(|i| dir * (i as f32) + side * if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();

        let obb = OrientedBox::from_points(&points);
        let long = obb.axes[obb.longest_axis()];
        assert_relative_eq!(long.dot(&dir).abs(), 1.0, epsilon = 1e-4);
        assert!(obb.volume() < 1.0);
    }

    #[test]
    fn test_fit_of_coincident_points_is_degenerate_but_valid() {
        let points = [Vec3::new(2.0, 2.0, 2.0); 5];
        let obb = OrientedBox::from_points(&points);
        assert!(obb.contains_point(&points[0], 0.0));
        assert!(obb.half_extents.iter().all(|h| h.is_finite()));
    }

    #[test]
    fn test_axis_aligned_overlap_and_separation() {
        let a = unit_box_at(Vec3::zeros());
        assert!(a.intersects(&unit_box_at(Vec3::new(1.5, 0.0, 0.0))));
        assert!(a.intersects(&unit_box_at(Vec3::new(2.0, 0.0, 0.0))));
        assert!(!a.intersects(&unit_box_at(Vec3::new(2.1, 0.0, 0.0))));
    }

    #[test]
    fn test_rotated_box_separated_only_by_cross_or_face_axis() {
        let a = unit_box_at(Vec3::zeros());
        let spin = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
        let rotated = OrientedBox::new(
            Vec3::new(2.3, 2.3, 0.0),
            [spin * Vec3::x(), spin * Vec3::y(), Vec3::z()],
            Vec3::new(1.0, 1.0, 1.0),
        );
        // Corner-to-corner along the diagonal: AABBs would overlap, boxes do not
        assert!(a.to_aabb().intersects(&rotated.to_aabb()));
        assert!(!a.intersects(&rotated));
        assert_eq!(a.intersects(&rotated), rotated.intersects(&a));
    }

    #[test]
    fn test_ray_slab() {
        let b = unit_box_at(Vec3::new(0.0, 0.0, -5.0));
        let hit = b.intersect_ray(&Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0)));
        assert_relative_eq!(hit.unwrap(), 4.0, epsilon = 1e-5);
        assert!(b.intersect_ray(&Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0))).is_none());
        assert!(b.intersect_ray(&Ray::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0))).is_none());
    }

    #[test]
    fn test_transformed_stays_conservative_under_nonuniform_scale() {
        let tilted = OrientedBox::new(
            Vec3::new(1.0, 0.0, 0.0),
            [
                Vec3::new(1.0, 1.0, 0.0).normalize(),
                Vec3::new(-1.0, 1.0, 0.0).normalize(),
                Vec3::z(),
            ],
            Vec3::new(2.0, 0.5, 1.0),
        );
        let transform = Transform::from_rotation_translation(
            Quat::from_axis_angle(&Vec3::x_axis(), 0.4),
            Vec3::new(0.0, 3.0, -1.0),
        )
        .with_scale(Vec3::new(3.0, 0.5, 2.0));

        let moved = tilted.transformed(&transform);
        for corner in tilted.corners() {
            let p = transform.transform_point(&corner);
            assert!(moved.contains_point(&p, 1e-4), "corner {p:?} escaped");
        }
    }

    #[test]
    fn test_fit_contains_points_far_from_origin() {
        let offset = Vec3::new(2.0e4, -1.5e4, 3.0e4);
        let points: Vec<Vec3> = (0..240)
            .map(|i| {
                let f = i as f32;
                offset + Vec3::new(f * 0.37, (f * 0.9).sin() * 3.0, (f * 0.41).cos() * 1.7)
            })
            .collect();

        // Every prefix exercises a different center and axis set
        for len in [3, 17, 80, 240] {
            let obb = OrientedBox::from_points(&points[..len]);
            for p in &points[..len] {
                assert!(obb.contains_point(p, 0.0), "point {p:?} escaped a {len}-point fit");
            }
        }
    }

    #[test]
    fn test_far_boxes_sharing_a_point_overlap() {
        let offset = Vec3::new(2.0e4, -1.5e4, 3.0e4);
        let strip: Vec<Vec3> = (0..40)
            .map(|i| offset + Vec3::new(i as f32 * 0.5, (i % 2) as f32 * 0.8, (i as f32 * 0.3).sin()))
            .collect();
        let big = OrientedBox::from_points(&strip);
        for shared in &strip {
            let tiny = OrientedBox::from_points(&[
                *shared,
                shared + Vec3::new(1e-3, 0.0, 0.0),
                shared + Vec3::new(0.0, 0.0, 1e-3),
            ]);
            assert!(big.intersects(&tiny), "box through {shared:?} reported separate");
            assert!(tiny.intersects(&big));
        }
    }
}
