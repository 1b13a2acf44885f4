//! Joint hierarchy and bind pose
//!
//! Joints are stored in the order they were supplied, but every pass over the
//! hierarchy uses [`Skeleton::order`], which lists parents before their
//! children regardless of index.

use std::collections::VecDeque;

use log::debug;

use crate::foundation::math::{Mat4, Quat, Transform, Vec3};

use super::{AnimationError, AnimationResult};

/// One joint as supplied by an importer
#[derive(Debug, Clone, PartialEq)]
pub struct JointDesc {
    /// Joint name, used for lookup only
    pub name: String,
    /// Parent joint, `None` for a root
    pub parent: Option<usize>,
    /// Translation relative to the parent at bind time
    pub bind_translation: Vec3,
    /// Rotation relative to the parent at bind time
    pub bind_rotation: Quat,
}

impl JointDesc {
    /// Create a joint at the parent's origin
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            bind_translation: Vec3::zeros(),
            bind_rotation: Quat::identity(),
        }
    }

    /// Set the bind translation
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.bind_translation = translation;
        self
    }

    /// Set the bind rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.bind_rotation = rotation;
        self
    }
}

/// Validated joint forest with precomputed bind-pose chains
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<JointDesc>,
    order: Vec<usize>,
    reference: Vec<Mat4>,
    bind_world: Vec<Transform>,
    inverse_chain: Vec<Mat4>,
}

impl Skeleton {
    /// Validate parent links and precompute the bind pose
    ///
    /// Fails when a parent index is out of range or when parent links form a
    /// cycle (which also leaves those joints unreachable from any root).
    pub fn new(joints: Vec<JointDesc>) -> AnimationResult<Self> {
        let count = joints.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut queue = VecDeque::new();

        for (joint, desc) in joints.iter().enumerate() {
            match desc.parent {
                Some(parent) if parent >= count => {
                    return Err(AnimationError::InvalidParent {
                        joint,
                        parent: parent as i64,
                    });
                }
                Some(parent) => children[parent].push(joint),
                None => queue.push_back(joint),
            }
        }

        // Breadth-first from the roots; anything not reached sits on a cycle
        let mut order = Vec::with_capacity(count);
        while let Some(joint) = queue.pop_front() {
            order.push(joint);
            queue.extend(children[joint].iter().copied());
        }
        if order.len() != count {
            let mut reached = vec![false; count];
            for &j in &order {
                reached[j] = true;
            }
            let joint = reached.iter().position(|r| !r).unwrap_or(0);
            return Err(AnimationError::CyclicHierarchy { joint });
        }

        let reference: Vec<Transform> = joints
            .iter()
            .map(|j| Transform::from_rotation_translation(j.bind_rotation, j.bind_translation))
            .collect();

        let mut bind_world = vec![Transform::identity(); count];
        for &joint in &order {
            bind_world[joint] = match joints[joint].parent {
                Some(parent) => bind_world[parent].combine(&reference[joint]),
                None => reference[joint],
            };
        }
        let inverse_chain = bind_world.iter().map(|t| t.inverse().to_matrix()).collect();

        debug!("Built skeleton with {} joints", count);
        Ok(Self {
            joints,
            order,
            reference: reference.iter().map(Transform::to_matrix).collect(),
            bind_world,
            inverse_chain,
        })
    }

    /// Number of joints
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the skeleton has no joints
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Joints in supplied order
    pub fn joints(&self) -> &[JointDesc] {
        &self.joints
    }

    /// Joint by index
    pub fn joint(&self, index: usize) -> Option<&JointDesc> {
        self.joints.get(index)
    }

    /// Index of the first joint with this name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Parent of a joint
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.joints[index].parent
    }

    /// Joint indices with every parent ahead of its children
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Bind-time transform relative to the parent
    pub fn reference(&self, index: usize) -> &Mat4 {
        &self.reference[index]
    }

    /// Bind-time transform relative to the skeleton root space
    pub fn bind_world(&self, index: usize) -> &Transform {
        &self.bind_world[index]
    }

    /// Inverse of the accumulated bind chain down to this joint
    pub fn inverse_chain(&self, index: usize) -> &Mat4 {
        &self.inverse_chain[index]
    }
}
