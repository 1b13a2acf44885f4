//! Tree-vs-tree and tree-vs-ray queries
//!
//! Queries descend both hierarchies together and prune every node pair whose
//! world boxes are disjoint. Leaf pairs are narrowed further with the world
//! AABBs of the individual triangles. The result is a conservative candidate
//! set: triangles that truly intersect are always reported, but reported
//! pairs are not guaranteed to intersect. Use [`find_colliding_triangles`] or
//! [`pick_closest`] for exact answers.
//!
//! Empty trees never intersect anything.

use std::ops::ControlFlow;

use log::trace;

use super::obb_tree::{NodeId, NodeKind};
use super::primitives::{Ray, RayHit, Triangle};
use super::tree::CollisionTree;

/// Whether any leaf triangle candidates of `a` and `b` overlap
pub fn intersects(a: &CollisionTree, b: &CollisionTree) -> bool {
    let mut found = false;
    visit_candidate_pairs(a, b, |_, _| {
        found = true;
        ControlFlow::Break(())
    });
    found
}

/// Every candidate triangle pair, returned as parallel index lists
/// (`first[i]` from `a` pairs with `second[i]` from `b`)
pub fn find_intersecting_triangles(a: &CollisionTree, b: &CollisionTree) -> (Vec<usize>, Vec<usize>) {
    let mut first = Vec::new();
    let mut second = Vec::new();
    visit_candidate_pairs(a, b, |ta, tb| {
        first.push(ta);
        second.push(tb);
        ControlFlow::Continue(())
    });
    trace!("Triangle candidates: {} pairs", first.len());
    (first, second)
}

/// Candidate pairs filtered by an exact triangle-triangle test
pub fn find_colliding_triangles(a: &CollisionTree, b: &CollisionTree) -> Vec<(usize, usize)> {
    let (first, second) = find_intersecting_triangles(a, b);
    first
        .into_iter()
        .zip(second)
        .filter(|&(ta, tb)| a.world_triangle(ta).intersects_triangle(&b.world_triangle(tb)))
        .collect()
}

/// Indices (ascending) of triangles whose leaf box and triangle bounds the
/// ray passes through
pub fn find_ray_hits(tree: &CollisionTree, ray: &Ray) -> Vec<usize> {
    let mut hits = Vec::new();
    if !ray.is_valid() {
        return hits;
    }
    let Some(root) = tree.tree().root() else {
        return hits;
    };

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if tree.node_world_box(id).intersect_ray(ray).is_none() {
            continue;
        }
        match tree.tree().node(id).kind {
            NodeKind::Leaf { .. } => {
                for &t in tree.tree().leaf_triangles(id) {
                    let world = tree.world_triangle(t as usize);
                    if world.bounds().intersect_ray(ray.origin, ray.direction).is_some() {
                        hits.push(t as usize);
                    }
                }
            }
            NodeKind::Internal { left, right } => {
                stack.push(right);
                stack.push(left);
            }
        }
    }

    hits.sort_unstable();
    hits
}

/// Closest exact ray-triangle hit in world space
pub fn pick_closest(tree: &CollisionTree, ray: &Ray) -> Option<RayHit> {
    if !ray.is_valid() {
        return None;
    }
    let root = tree.tree().root()?;

    let mut best: Option<RayHit> = None;
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(entry) = tree.node_world_box(id).intersect_ray(ray) else {
            continue;
        };
        if best.map_or(false, |hit| entry > hit.distance) {
            continue;
        }

        match tree.tree().node(id).kind {
            NodeKind::Leaf { .. } => {
                for &t in tree.tree().leaf_triangles(id) {
                    let world: Triangle = tree.world_triangle(t as usize);
                    if let Some((distance, _, _)) = world.intersect_ray(ray) {
                        if best.map_or(true, |hit| distance < hit.distance) {
                            best = Some(RayHit {
                                triangle: t as usize,
                                distance,
                                point: ray.point_at(distance),
                                normal: world.normal(),
                            });
                        }
                    }
                }
            }
            NodeKind::Internal { left, right } => {
                stack.push(right);
                stack.push(left);
            }
        }
    }

    best
}

/// Walk both trees, calling `visit` for each candidate triangle pair until it
/// breaks
fn visit_candidate_pairs<F>(a: &CollisionTree, b: &CollisionTree, mut visit: F)
where
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    let (Some(root_a), Some(root_b)) = (a.tree().root(), b.tree().root()) else {
        return;
    };

    let mut stack: Vec<(NodeId, NodeId)> = vec![(root_a, root_b)];
    while let Some((na, nb)) = stack.pop() {
        let box_a = a.node_world_box(na);
        let box_b = b.node_world_box(nb);
        if !box_a.intersects(&box_b) {
            continue;
        }

        match (a.tree().node(na).kind, b.tree().node(nb).kind) {
            (NodeKind::Leaf { .. }, NodeKind::Leaf { .. }) => {
                if visit_leaf_pair(a, na, b, nb, &mut visit).is_break() {
                    return;
                }
            }
            (NodeKind::Internal { left, right }, NodeKind::Leaf { .. }) => {
                stack.push((right, nb));
                stack.push((left, nb));
            }
            (NodeKind::Leaf { .. }, NodeKind::Internal { left, right }) => {
                stack.push((na, right));
                stack.push((na, left));
            }
            (
                NodeKind::Internal { left: la, right: ra },
                NodeKind::Internal { left: lb, right: rb },
            ) => {
                // Descend the bigger box; equal boxes split together so the
                // walk does not depend on argument order
                let (va, vb) = (box_a.volume(), box_b.volume());
                if va > vb {
                    stack.push((ra, nb));
                    stack.push((la, nb));
                } else if vb > va {
                    stack.push((na, rb));
                    stack.push((na, lb));
                } else {
                    stack.extend([(ra, rb), (ra, lb), (la, rb), (la, lb)]);
                }
            }
        }
    }
}

fn visit_leaf_pair<F>(a: &CollisionTree, na: NodeId, b: &CollisionTree, nb: NodeId, visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    let world_b: Vec<(usize, Triangle)> = b
        .tree()
        .leaf_triangles(nb)
        .iter()
        .map(|&t| (t as usize, b.world_triangle(t as usize)))
        .collect();

    for &ta in a.tree().leaf_triangles(na) {
        let bounds_a = a.world_triangle(ta as usize).bounds();
        for (tb, tri_b) in &world_b {
            if bounds_a.intersects(&tri_b.bounds()) {
                visit(ta as usize, *tb)?;
            }
        }
    }
    ControlFlow::Continue(())
}
