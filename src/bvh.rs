use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::aabb::Aabb;
use crate::geometry::{Fp, Ray};
use crate::shapes::Primitive;

/// Binary tree over primitive indices. Nodes live in a flat arena; leaves
/// store indices into the Scene's primitive list, so the tree is pure data
/// and the list is never reordered.
#[derive(Debug)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: usize,
}

#[derive(Debug)]
struct BvhNode {
    aabb: Aabb,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Leaf(usize),
    Internal { left: usize, right: usize },
}

impl Bvh {
    /// Build over all primitives. The split axis is drawn per node from a
    /// stream seeded by `seed`, which keeps construction reproducible.
    pub fn build(primitives: &[Primitive], seed: u64) -> Option<Bvh> {
        if primitives.is_empty() {
            return None;
        }
        let boxes: Vec<Aabb> = primitives
            .iter()
            .map(|p| p.shape.bounding_box())
            .collect();
        let mut order: Vec<usize> = (0..primitives.len()).collect();
        let mut nodes = Vec::with_capacity(2 * primitives.len());
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let root = build_node(&mut nodes, &boxes, &mut order, &mut rng);
        Some(Bvh { nodes, root })
    }

    /// Closest hit as (t, primitive index). Recurses into every child whose
    /// box the ray touches; no best-t pruning happens along the way.
    pub fn intersect(&self, ray: &Ray, primitives: &[Primitive]) -> Option<(Fp, usize)> {
        self.intersect_node(self.root, ray, primitives)
    }

    fn intersect_node(
        &self,
        index: usize,
        ray: &Ray,
        primitives: &[Primitive],
    ) -> Option<(Fp, usize)> {
        let node = match self.nodes.get(index) {
            Some(node) => node,
            None => {
                log::warn!("bvh: node index {} out of bounds, treating as miss", index);
                return None;
            }
        };
        if !node.aabb.intersect(ray) {
            return None;
        }
        match node.kind {
            NodeKind::Leaf(prim) => match primitives.get(prim) {
                Some(primitive) => primitive.shape.intersect(ray).map(|t| (t, prim)),
                None => {
                    log::warn!("bvh: leaf references missing primitive {}", prim);
                    None
                }
            },
            NodeKind::Internal { left, right } => {
                let hit_left = self.intersect_node(left, ray, primitives);
                let hit_right = self.intersect_node(right, ray, primitives);
                match (hit_left, hit_right) {
                    (Some(l), Some(r)) => Some(if l.0 < r.0 { l } else { r }),
                    (l, r) => l.or(r),
                }
            }
        }
    }

    /// Shadow query: true as soon as any primitive is hit closer than
    /// `max_dist`.
    pub fn occluded(&self, ray: &Ray, primitives: &[Primitive], max_dist: Fp) -> bool {
        self.occluded_node(self.root, ray, primitives, max_dist)
    }

    fn occluded_node(
        &self,
        index: usize,
        ray: &Ray,
        primitives: &[Primitive],
        max_dist: Fp,
    ) -> bool {
        let node = match self.nodes.get(index) {
            Some(node) => node,
            None => return false,
        };
        if !node.aabb.intersect(ray) {
            return false;
        }
        match node.kind {
            NodeKind::Leaf(prim) => primitives
                .get(prim)
                .and_then(|p| p.shape.intersect(ray))
                .is_some_and(|t| t < max_dist),
            NodeKind::Internal { left, right } => {
                self.occluded_node(left, ray, primitives, max_dist)
                    || self.occluded_node(right, ray, primitives, max_dist)
            }
        }
    }

    /// Sanity check: every internal box contains its children, every leaf box
    /// contains its primitive's box.
    pub fn validate(&self, primitives: &[Primitive]) -> bool {
        self.nodes.iter().all(|node| match node.kind {
            NodeKind::Leaf(prim) => primitives
                .get(prim)
                .is_some_and(|p| node.aabb.contains(&p.shape.bounding_box())),
            NodeKind::Internal { left, right } => {
                match (self.nodes.get(left), self.nodes.get(right)) {
                    (Some(l), Some(r)) => {
                        node.aabb.contains(&l.aabb) && node.aabb.contains(&r.aabb)
                    }
                    _ => false,
                }
            }
        })
    }
}

fn push_leaf(nodes: &mut Vec<BvhNode>, boxes: &[Aabb], prim: usize) -> usize {
    nodes.push(BvhNode {
        aabb: boxes[prim].clone(),
        kind: NodeKind::Leaf(prim),
    });
    nodes.len() - 1
}

fn push_internal(nodes: &mut Vec<BvhNode>, left: usize, right: usize) -> usize {
    let aabb = Aabb::surrounding_box(&nodes[left].aabb, &nodes[right].aabb);
    nodes.push(BvhNode {
        aabb,
        kind: NodeKind::Internal { left, right },
    });
    nodes.len() - 1
}

fn build_node(
    nodes: &mut Vec<BvhNode>,
    boxes: &[Aabb],
    span: &mut [usize],
    rng: &mut impl Rng,
) -> usize {
    let axis = rng.gen_range(0..3usize);
    match span.len() {
        1 => push_leaf(nodes, boxes, span[0]),
        2 => {
            let (a, b) = (span[0], span[1]);
            let (first, second) = if boxes[a].min[axis] < boxes[b].min[axis] {
                (a, b)
            } else {
                (b, a)
            };
            let left = push_leaf(nodes, boxes, first);
            let right = push_leaf(nodes, boxes, second);
            push_internal(nodes, left, right)
        }
        _ => {
            span.sort_by(|&a, &b| boxes[a].min[axis].total_cmp(&boxes[b].min[axis]));
            let mid = span.len() / 2;
            let (left_span, right_span) = span.split_at_mut(mid);
            let left = build_node(nodes, boxes, left_span, rng);
            let right = build_node(nodes, boxes, right_span, rng);
            push_internal(nodes, left, right)
        }
    }
}
