//! Bounding volume hierarchy over the scene's primitive arena.
//!
//! The tree is flattened into one contiguous node array: a node's left child
//! sits immediately after it at `i + 1`, its right child at
//! `i + right_offset`. Leaves reference a contiguous primitive range
//! `[start, start + prim_count)` — the build reorders the primitive array in
//! place so every leaf's primitives are adjacent.

use crate::math::{Aabb, Ray};
use crate::primitive::{Intersection, Primitive};

/// Primitive count below which a subtree becomes a leaf. Hardware-dependent
/// in principle; 2 is a solid default for analytic primitives.
pub const LEAF_SIZE: u32 = 2;

/// A node of the flattened tree. `prim_count > 0` marks a leaf; interior
/// nodes keep `prim_count == 0` and locate children through `right_offset`.
#[derive(Debug, Clone, Copy)]
struct FlatNode {
    bbox: Aabb,
    start: u32,
    prim_count: u32,
    right_offset: u32,
}

/* right_offset states during construction: an interior node is created
 * UNTOUCHED and decremented once per child placed; when the second child
 * lands the counter reads TOUCHED_TWICE and is replaced by the real offset. */
const UNTOUCHED: u32 = 0xFFFF_FFFF;
const TOUCHED_TWICE: u32 = 0xFFFF_FFFD;
const ROOT_PARENT: u32 = 0xFFFF_FFFC;

struct BuildEntry {
    start: u32,
    end: u32,
    parent: u32,
}

pub struct Bvh {
    nodes: Vec<FlatNode>,
    leaf_count: usize,
}

impl Bvh {
    /// Builds the hierarchy over `primitives`, reordering the slice in place
    /// so leaves index contiguous ranges of it.
    ///
    /// The build is iterative and work-list driven: split the range on the
    /// midpoint of the centroid bounds' longest axis, partition in place,
    /// and fall back to an equal-count split when all centroids land on one
    /// side. Children are pushed right-then-left so the left child is
    /// emitted immediately after its parent.
    pub fn build(primitives: &mut [Primitive], leaf_size: u32) -> Self {
        let mut nodes: Vec<FlatNode> = Vec::with_capacity(primitives.len().max(1) * 2);
        let mut leaf_count = 0usize;

        if primitives.is_empty() {
            return Self { nodes, leaf_count };
        }

        let mut todo = vec![BuildEntry {
            start: 0,
            end: primitives.len() as u32,
            parent: ROOT_PARENT,
        }];

        while let Some(BuildEntry { start, end, parent }) = todo.pop() {
            let count = end - start;

            /* Bounds of the range's geometry and of its centroids; the
             * latter steer the split so clustered primitives separate. */
            let mut bbox = primitives[start as usize].bounding_box();
            let mut centroid_bbox = Aabb::from_point(primitives[start as usize].centroid());
            for prim in &primitives[start as usize + 1..end as usize] {
                bbox.expand_box(&prim.bounding_box());
                centroid_bbox.expand_point(prim.centroid());
            }

            let index = nodes.len() as u32;
            let is_leaf = count <= leaf_size;
            nodes.push(FlatNode {
                bbox,
                start,
                prim_count: if is_leaf { count } else { 0 },
                right_offset: if is_leaf { 0 } else { UNTOUCHED },
            });
            if is_leaf {
                leaf_count += 1;
            }

            /* Lazy fix-up: the parent learns its right child's offset the
             * moment that child is placed. */
            if parent != ROOT_PARENT {
                let parent_node = &mut nodes[parent as usize];
                parent_node.right_offset -= 1;
                if parent_node.right_offset == TOUCHED_TWICE {
                    parent_node.right_offset = index - parent;
                }
            }

            if is_leaf {
                continue;
            }

            let axis = centroid_bbox.longest_axis();
            let split = 0.5 * (centroid_bbox.min[axis] + centroid_bbox.max[axis]);

            let mut mid = start;
            for i in start..end {
                if primitives[i as usize].centroid()[axis] < split {
                    primitives.swap(i as usize, mid as usize);
                    mid += 1;
                }
            }

            /* Degenerate partition (all centroids on one side): equal count. */
            if mid == start || mid == end {
                mid = start + count / 2;
            }

            todo.push(BuildEntry { start: mid, end, parent: index });
            todo.push(BuildEntry { start, end: mid, parent: index });
        }

        Self { nodes, leaf_count }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Finds the nearest primitive intersection along `ray`, or any
    /// intersection at all when `occlusion` is set (early exit on the first
    /// accepted hit).
    ///
    /// Traversal is iterative over an explicit stack of (node, t_near)
    /// pairs. Nodes whose slab window opens beyond the current best hit are
    /// skipped; at interior nodes both children are slab-tested and the
    /// farther one is pushed first so the nearer is visited next.
    pub fn intersect(
        &self,
        ray: &Ray,
        primitives: &[Primitive],
        occlusion: bool,
    ) -> Option<Intersection> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = Intersection {
            prim: usize::MAX,
            t: f32::INFINITY,
        };
        let mut found = false;

        let mut todo: Vec<(u32, f32)> = Vec::with_capacity(64);
        todo.push((0, f32::NEG_INFINITY));

        while let Some((index, t_near)) = todo.pop() {
            if t_near > best.t {
                continue;
            }
            let node = &self.nodes[index as usize];

            if node.prim_count > 0 {
                for i in node.start..node.start + node.prim_count {
                    let t = primitives[i as usize].intersect(ray);
                    // First visited wins ties through the strict inequality.
                    if t > 0.0 && t < best.t {
                        best = Intersection { prim: i as usize, t };
                        found = true;
                        if occlusion {
                            return Some(best);
                        }
                    }
                }
            } else {
                let left = index + 1;
                let right = index + node.right_offset;
                let hit_left = self.nodes[left as usize].bbox.intersect(ray);
                let hit_right = self.nodes[right as usize].bbox.intersect(ray);

                match (hit_left, hit_right) {
                    (Some((near_l, _)), Some((near_r, _))) => {
                        if near_l <= near_r {
                            todo.push((right, near_r));
                            todo.push((left, near_l));
                        } else {
                            todo.push((left, near_l));
                            todo.push((right, near_r));
                        }
                    }
                    (Some((near_l, _)), None) => todo.push((left, near_l)),
                    (None, Some((near_r, _))) => todo.push((right, near_r)),
                    (None, None) => {}
                }
            }
        }

        found.then_some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vec3};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_scene(rng: &mut SmallRng, count: usize) -> Vec<Primitive> {
        (0..count)
            .map(|i| {
                let p = Point3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                );
                if i % 2 == 0 {
                    Primitive::sphere(p, rng.gen_range(0.1..1.5), None, None)
                } else {
                    let q = p + Vec3::new(
                        rng.gen_range(0.2..2.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    );
                    let r = p + Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(0.2..2.0),
                        rng.gen_range(-1.0..1.0),
                    );
                    Primitive::triangle(p, q, r, None, None)
                }
            })
            .collect()
    }

    fn linear_scan(ray: &Ray, primitives: &[Primitive]) -> Option<Intersection> {
        let mut best: Option<Intersection> = None;
        for (i, prim) in primitives.iter().enumerate() {
            let t = prim.intersect(ray);
            if t > 0.0 && best.map_or(true, |b| t < b.t) {
                best = Some(Intersection { prim: i, t });
            }
        }
        best
    }

    #[test]
    fn traversal_matches_linear_scan() {
        let mut rng = SmallRng::seed_from_u64(0x530F_D819);
        let mut primitives = random_scene(&mut rng, 100);
        let bvh = Bvh::build(&mut primitives, LEAF_SIZE);

        for _ in 0..1000 {
            let origin = Point3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if direction.length_squared() < 1e-6 {
                continue;
            }
            let ray = Ray::new(origin, direction.normalized());

            let from_bvh = bvh.intersect(&ray, &primitives, false);
            let from_scan = linear_scan(&ray, &primitives);

            match (from_bvh, from_scan) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    // Identical nearest distance; index may differ only on
                    // exact ties.
                    assert_eq!(a.t, b.t, "BVH and linear scan disagree on t");
                }
                (a, b) => panic!("hit disagreement: bvh={a:?} scan={b:?}"),
            }
        }
    }

    #[test]
    fn occlusion_query_finds_blockers() {
        let mut primitives = vec![Primitive::sphere(Point3::new(0.0, 0.0, 5.0), 1.0, None, None)];
        let bvh = Bvh::build(&mut primitives, LEAF_SIZE);
        let blocked = Ray::new(Point3::zero(), Vec3::new(0.0, 0.0, 1.0));
        let clear = Ray::new(Point3::zero(), Vec3::new(0.0, 0.0, -1.0));
        assert!(bvh.intersect(&blocked, &primitives, true).is_some());
        assert!(bvh.intersect(&clear, &primitives, true).is_none());
    }

    #[test]
    fn empty_scene_never_intersects() {
        let mut primitives: Vec<Primitive> = Vec::new();
        let bvh = Bvh::build(&mut primitives, LEAF_SIZE);
        let ray = Ray::new(Point3::zero(), Vec3::new(0.0, 0.0, 1.0));
        assert!(bvh.intersect(&ray, &primitives, false).is_none());
        assert_eq!(bvh.node_count(), 0);
    }

    #[test]
    fn single_primitive_becomes_one_leaf() {
        let mut primitives = vec![Primitive::sphere(Point3::zero(), 1.0, None, None)];
        let bvh = Bvh::build(&mut primitives, LEAF_SIZE);
        assert_eq!(bvh.node_count(), 1);
        assert_eq!(bvh.leaf_count(), 1);
    }
}
