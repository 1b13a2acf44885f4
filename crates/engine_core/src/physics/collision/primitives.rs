//! Primitive collision shapes and intersection algorithms
//!
//! Rays and triangles with the exact tests callers run on the candidate
//! pairs an OBB tree query narrows down to.

use crate::foundation::math::{Transform, Vec3};
use crate::scene::AABB;

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized)
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// A ray with a zero or non-finite direction cannot hit anything
    pub fn is_valid(&self) -> bool {
        self.direction.iter().all(|c| c.is_finite()) && self.direction.magnitude_squared() > 0.0
    }
}

/// Result of picking a mesh with a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Index of the triangle that was hit
    pub triangle: usize,
    /// The distance from the ray origin to the hit point
    pub distance: f32,
    /// The point of intersection in world space
    pub point: Vec3,
    /// The surface normal at the intersection point
    pub normal: Vec3,
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// The three vertices in winding order
    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Calculates the normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).normalize()
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Axis-aligned bounds of the three vertices
    pub fn bounds(&self) -> AABB {
        AABB::new(self.v0, self.v0).grown(&self.v1).grown(&self.v2)
    }

    /// Copy of this triangle with `transform` applied to each vertex
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self::new(
            transform.transform_point(&self.v0),
            transform.transform_point(&self.v1),
            transform.transform_point(&self.v2),
        )
    }

    /// Möller-Trumbore ray-triangle intersection algorithm
    /// Returns (t, u, v) barycentric coordinates if hit, None otherwise
    ///
    /// See: "Fast, Minimum Storage Ray/Triangle Intersection" by Möller & Trumbore
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 0.000001;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle?
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        if t >= 0.0 {
            Some((t, u, v))
        } else {
            None // Behind ray origin
        }
    }

    /// Test if this triangle intersects another triangle
    ///
    /// Separating Axis Theorem over both face normals and the nine edge-edge
    /// cross products. Coplanar pairs make every edge-edge axis degenerate, so
    /// the in-plane edge normals of both triangles are tested instead.
    pub fn intersects_triangle(&self, other: &Triangle) -> bool {
        const EPSILON: f32 = 0.000001;

        fn project_triangle(tri: &Triangle, axis: &Vec3) -> (f32, f32) {
            let p0 = axis.dot(&tri.v0);
            let p1 = axis.dot(&tri.v1);
            let p2 = axis.dot(&tri.v2);
            (p0.min(p1).min(p2), p0.max(p1).max(p2))
        }

        // Returns false if `axis` separates the triangles
        fn test_axis(tri1: &Triangle, tri2: &Triangle, axis: Vec3) -> bool {
            let axis_len_sq = axis.magnitude_squared();
            if axis_len_sq < EPSILON * EPSILON {
                return true; // Degenerate axis, skip
            }

            let normalized_axis = axis / axis_len_sq.sqrt();
            let (min1, max1) = project_triangle(tri1, &normalized_axis);
            let (min2, max2) = project_triangle(tri2, &normalized_axis);
            max1 >= min2 && max2 >= min1
        }

        let edges1 = [self.v1 - self.v0, self.v2 - self.v1, self.v0 - self.v2];
        let edges2 = [other.v1 - other.v0, other.v2 - other.v1, other.v0 - other.v2];

        let n1 = edges1[0].cross(&edges1[1]);
        let n2 = edges2[0].cross(&edges2[1]);
        if !test_axis(self, other, n1) || !test_axis(self, other, n2) {
            return false;
        }

        let coplanar = n1.cross(&n2).magnitude_squared() <= EPSILON * n1.magnitude_squared() * n2.magnitude_squared();
        if coplanar {
            return edges1
                .iter()
                .map(|e| n1.cross(e))
                .chain(edges2.iter().map(|e| n2.cross(e)))
                .all(|axis| test_axis(self, other, axis));
        }

        for edge1 in &edges1 {
            for edge2 in &edges2 {
                if !test_axis(self, other, edge1.cross(edge2)) {
                    return false;
                }
            }
        }

        // No separating axis found = triangles intersect
        true
    }
}
