//! Bounding volume hierarchy of oriented boxes over a triangle mesh
//!
//! Built top-down once from a geometry snapshot and immutable afterwards.
//! Nodes live in a flat arena; a node either owns a contiguous range of the
//! tree's triangle ordering (leaf) or exactly two children (internal).

use log::debug;

use crate::core::config::CollisionConfig;
use crate::foundation::math::Vec3;
use crate::scene::{validate_geometry, GeometryError, TriMesh};

use super::obb::OrientedBox;
use super::primitives::Triangle;

/// Index of a node in [`ObbTree::nodes`]
pub type NodeId = usize;

/// What a node holds besides its bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Triangles `order[start..end]` of the owning tree
    Leaf {
        /// First slot in the triangle ordering
        start: usize,
        /// One past the last slot
        end: usize,
    },
    /// Two children splitting this node's triangles
    Internal {
        /// Child holding the lower half along the split axis
        left: NodeId,
        /// Child holding the upper half along the split axis
        right: NodeId,
    },
}

/// One node of the hierarchy
#[derive(Debug, Clone)]
pub struct ObbNode {
    /// Box enclosing every triangle below this node
    pub bounds: OrientedBox,
    /// Leaf range or children
    pub kind: NodeKind,
    /// Distance from the root (root = 0)
    pub depth: usize,
}

impl ObbNode {
    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

/// Immutable OBB hierarchy for one mesh snapshot
#[derive(Debug, Clone)]
pub struct ObbTree {
    nodes: Vec<ObbNode>,
    /// Permutation of triangle indices; leaves reference sub-ranges of it
    order: Vec<u32>,
    /// Local-space triangles indexed by original triangle index
    triangles: Vec<Triangle>,
    source_version: u64,
}

impl ObbTree {
    /// Build a tree over a validated mesh
    pub fn build(mesh: &TriMesh, config: &CollisionConfig) -> Self {
        let triangles = (0..mesh.triangle_count()).map(|i| mesh.triangle(i)).collect();
        Self::from_triangles(triangles, config, mesh.version())
    }

    /// Build a tree from raw arrays, rejecting arrays that break the mesh
    /// invariants instead of producing a corrupt tree
    pub fn from_raw(vertices: &[Vec3], indices: &[u32], config: &CollisionConfig) -> Result<Self, GeometryError> {
        validate_geometry(vertices, &[], indices)?;
        let triangles = indices
            .chunks_exact(3)
            .map(|c| Triangle::new(vertices[c[0] as usize], vertices[c[1] as usize], vertices[c[2] as usize]))
            .collect();
        Ok(Self::from_triangles(triangles, config, 0))
    }

    fn from_triangles(triangles: Vec<Triangle>, config: &CollisionConfig, source_version: u64) -> Self {
        let count = triangles.len();
        let mut tree = Self {
            nodes: Vec::with_capacity(if count == 0 { 0 } else { 2 * count }),
            order: (0..count as u32).collect(),
            triangles,
            source_version,
        };

        if count > 0 {
            let centroids: Vec<Vec3> = tree.triangles.iter().map(Triangle::centroid).collect();
            let mut builder = Builder {
                tree: &mut tree,
                centroids: &centroids,
                max_leaf: config.max_leaf_triangles.max(1),
                max_depth: config.max_depth.max(1),
            };
            builder.build_node(0, count, 0);
        }

        debug!(
            "Built OBB tree: {} triangles, {} nodes, depth {}",
            count,
            tree.nodes.len(),
            tree.depth()
        );
        tree
    }

    /// Root node, `None` for a mesh without triangles
    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Whether the tree holds no triangles
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in arena order (root first)
    pub fn nodes(&self) -> &[ObbNode] {
        &self.nodes
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> &ObbNode {
        &self.nodes[id]
    }

    /// Triangle indices owned by a leaf (empty for internal nodes)
    pub fn leaf_triangles(&self, id: NodeId) -> &[u32] {
        match self.nodes[id].kind {
            NodeKind::Leaf { start, end } => &self.order[start..end],
            NodeKind::Internal { .. } => &[],
        }
    }

    /// Every triangle index below `id`
    pub fn subtree_triangles(&self, id: NodeId) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.nodes[current].kind {
                NodeKind::Leaf { start, end } => out.extend_from_slice(&self.order[start..end]),
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        out
    }

    /// Local-space triangle by original triangle index
    pub fn triangle(&self, index: usize) -> &Triangle {
        &self.triangles[index]
    }

    /// Number of triangles in the snapshot
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of leaf nodes
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Deepest node depth plus one (0 for an empty tree)
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth + 1).max().unwrap_or(0)
    }

    /// Geometry version of the mesh this tree was built from
    pub fn source_version(&self) -> u64 {
        self.source_version
    }
}

struct Builder<'a> {
    tree: &'a mut ObbTree,
    centroids: &'a [Vec3],
    max_leaf: usize,
    max_depth: usize,
}

impl Builder<'_> {
    fn build_node(&mut self, start: usize, end: usize, depth: usize) -> NodeId {
        let bounds = self.fit(start, end);
        let id = self.tree.nodes.len();
        self.tree.nodes.push(ObbNode {
            bounds,
            kind: NodeKind::Leaf { start, end },
            depth,
        });

        let count = end - start;
        if count <= self.max_leaf || depth + 1 >= self.max_depth {
            return id;
        }

        // Median split of centroids along the longest box axis. Sorting by
        // (projection, triangle index) keeps the split deterministic and always
        // halves the range, even when every centroid coincides.
        let axis = bounds.axes[bounds.longest_axis()];
        let centroids = self.centroids;
        self.tree.order[start..end].sort_by(|&a, &b| {
            let pa = centroids[a as usize].dot(&axis);
            let pb = centroids[b as usize].dot(&axis);
            pa.total_cmp(&pb).then(a.cmp(&b))
        });

        let mid = start + count / 2;
        let left = self.build_node(start, mid, depth + 1);
        let right = self.build_node(mid, end, depth + 1);
        self.tree.nodes[id].kind = NodeKind::Internal { left, right };
        id
    }

    fn fit(&self, start: usize, end: usize) -> OrientedBox {
        let points: Vec<Vec3> = self.tree.order[start..end]
            .iter()
            .flat_map(|&t| self.tree.triangles[t as usize].vertices())
            .collect();
        OrientedBox::from_points(&points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Strip of `n` quads along +x, two triangles each, gently curved in z
    fn strip_mesh(n: usize) -> TriMesh {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for i in 0..=n {
            let x = i as f32;
            let z = (x * 0.3).sin();
            vertices.push(Vec3::new(x, 0.0, z));
            vertices.push(Vec3::new(x, 1.0, z));
        }
        for i in 0..n as u32 {
            let a = 2 * i;
            indices.extend_from_slice(&[a, a + 2, a + 1, a + 1, a + 2, a + 3]);
        }
        TriMesh::new(vertices, Vec::new(), indices).unwrap()
    }

    #[test]
    fn test_every_node_encloses_its_subtree() {
        let mesh = strip_mesh(50);
        let tree = ObbTree::build(&mesh, &CollisionConfig::default());

        for (id, node) in tree.nodes().iter().enumerate() {
            for t in tree.subtree_triangles(id) {
                for v in tree.triangle(t as usize).vertices() {
                    assert!(node.bounds.contains_point(&v, 1e-4), "node {id} misses triangle {t}");
                }
            }
        }
    }

    #[test]
    fn test_leaves_partition_triangles() {
        let mesh = strip_mesh(37);
        let tree = ObbTree::build(&mesh, &CollisionConfig::default().with_max_leaf_triangles(3));

        let mut seen: Vec<u32> = tree
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .flat_map(|(id, _)| tree.leaf_triangles(id).to_vec())
            .collect();
        seen.sort_unstable();
        let expected: Vec<u32> = (0..mesh.triangle_count() as u32).collect();
        assert_eq!(seen, expected);

        for (id, node) in tree.nodes().iter().enumerate() {
            if node.is_leaf() {
                assert!(tree.leaf_triangles(id).len() <= 3);
            }
        }
    }

    #[test]
    fn test_depth_is_logarithmic() {
        let mesh = strip_mesh(256);
        let tree = ObbTree::build(&mesh, &CollisionConfig::default().with_max_leaf_triangles(1));
        // 512 triangles with exact halving gives depth log2(512) + 1
        assert_eq!(tree.depth(), 10);
    }

    #[test]
    fn test_empty_mesh_builds_empty_tree() {
        let mesh = TriMesh::new(Vec::new(), Vec::new(), Vec::new()).unwrap();
        let tree = ObbTree::build(&mesh, &CollisionConfig::default());
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_coincident_centroids_split_deterministically() {
        // Eight copies of the same triangle
        let vertices = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let indices: Vec<u32> = (0..8).flat_map(|_| [0, 1, 2]).collect();
        let config = CollisionConfig::default().with_max_leaf_triangles(1);

        let first = ObbTree::from_raw(&vertices, &indices, &config).unwrap();
        let second = ObbTree::from_raw(&vertices, &indices, &config).unwrap();

        assert_eq!(first.leaf_count(), 8);
        assert_eq!(first.depth(), 4);
        let leaves = |tree: &ObbTree| -> Vec<Vec<u32>> {
            (0..tree.nodes().len()).map(|id| tree.leaf_triangles(id).to_vec()).collect()
        };
        assert_eq!(leaves(&first), leaves(&second));
    }

    #[test]
    fn test_depth_cap_forces_leaves() {
        let mesh = strip_mesh(64);
        let tree = ObbTree::build(&mesh, &CollisionConfig::default().with_max_leaf_triangles(1).with_max_depth(3));
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn test_from_raw_rejects_bad_indices() {
        let vertices = vec![Vec3::zeros(); 3];
        let config = CollisionConfig::default();
        assert!(matches!(
            ObbTree::from_raw(&vertices, &[0, 1], &config),
            Err(GeometryError::IndexCountNotMultipleOfThree { .. })
        ));
        assert!(matches!(
            ObbTree::from_raw(&vertices, &[0, 1, 3], &config),
            Err(GeometryError::IndexOutOfRange { .. })
        ));
    }
}
