//! World-space view of a local-space OBB tree
//!
//! The tree itself never changes after construction; only the world
//! transform and the cached world root box are refreshed before queries.
//! Inner node boxes are moved into world space on demand while a query
//! descends, so refreshing stays O(1).

use std::sync::Arc;

use crate::foundation::math::Transform;

use super::obb::OrientedBox;
use super::obb_tree::{NodeId, ObbTree};
use super::primitives::Triangle;

/// A shared local-space tree placed in the world
#[derive(Debug, Clone)]
pub struct CollisionTree {
    tree: Arc<ObbTree>,
    world: Transform,
    world_bound: Option<OrientedBox>,
}

impl CollisionTree {
    /// Place `tree` with the given world transform
    pub fn new(tree: Arc<ObbTree>, world: &Transform) -> Self {
        let mut placed = Self {
            tree,
            world: *world,
            world_bound: None,
        };
        placed.refresh(world);
        placed
    }

    /// Recompute the world bounding volume for a new world transform
    pub fn refresh(&mut self, world: &Transform) {
        self.world = *world;
        self.world_bound = self
            .tree
            .root()
            .map(|root| self.tree.node(root).bounds.transformed(world));
    }

    /// The local-space hierarchy
    pub fn tree(&self) -> &ObbTree {
        &self.tree
    }

    /// Shared handle to the local-space hierarchy
    pub fn shared_tree(&self) -> Arc<ObbTree> {
        Arc::clone(&self.tree)
    }

    /// World transform the bounds were last refreshed with
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    /// World-space box around the whole mesh, `None` for an empty tree
    pub fn world_bound(&self) -> Option<&OrientedBox> {
        self.world_bound.as_ref()
    }

    /// World-space box of a node
    pub fn node_world_box(&self, id: NodeId) -> OrientedBox {
        match (self.tree.root(), self.world_bound) {
            (Some(root), Some(bound)) if root == id => bound,
            _ => self.tree.node(id).bounds.transformed(&self.world),
        }
    }

    /// World-space copy of a triangle by original triangle index
    pub fn world_triangle(&self, index: usize) -> Triangle {
        self.tree.triangle(index).transformed(&self.world)
    }
}
