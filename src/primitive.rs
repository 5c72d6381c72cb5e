//! Geometric primitives: bounded shapes with analytic ray intersection,
//! surface normals, bounding boxes, and centroids — everything the BVH
//! needs to organize them and the integrator needs to shade them.

use crate::math::{Aabb, Point3, Ray, Vec3, EPSILON};

// ─── Intersection Record ────────────────────────────────────────────────────

/// A ray-scene intersection: the index of the primitive hit (in the scene's
/// primitive arena, post-BVH reordering) and the distance along the ray.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub prim: usize,
    pub t: f32,
}

// ─── Shapes ─────────────────────────────────────────────────────────────────

/// The closed set of supported shapes. Derived quantities (bounding boxes,
/// triangle edges and normals, squared radii) are computed once at
/// construction; shapes are immutable afterwards.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere {
        center: Point3,
        radius: f32,
        radius_squared: f32,
        bbox: Aabb,
    },
    Triangle {
        p1: Point3,
        edge1: Vec3,
        edge2: Vec3,
        normal: Vec3,
        bbox: Aabb,
        centroid: Point3,
    },
}

// ─── Primitive ──────────────────────────────────────────────────────────────

/// A scene primitive: a shape plus optional material and light attachments,
/// both referenced by index into the scene's arenas so the primitive array
/// can be reordered freely during BVH construction.
///
/// A primitive carrying a light index is an emitter: the integrator returns
/// its emittance on hit and does not bounce further.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub material: Option<usize>,
    pub light: Option<usize>,
    pub shape: Shape,
}

impl Primitive {
    pub fn sphere(
        center: Point3,
        radius: f32,
        material: Option<usize>,
        light: Option<usize>,
    ) -> Self {
        let r = Vec3::new(radius, radius, radius);
        Self {
            material,
            light,
            shape: Shape::Sphere {
                center,
                radius,
                radius_squared: radius * radius,
                bbox: Aabb::new(center - r, center + r),
            },
        }
    }

    pub fn triangle(
        p1: Point3,
        p2: Point3,
        p3: Point3,
        material: Option<usize>,
        light: Option<usize>,
    ) -> Self {
        let edge1 = p2 - p1;
        let edge2 = p3 - p1;
        let lo = p1.min_by_component(p2).min_by_component(p3);
        let hi = p1.max_by_component(p2).max_by_component(p3);
        Self {
            material,
            light,
            shape: Shape::Triangle {
                p1,
                edge1,
                edge2,
                normal: edge1.cross(edge2).normalized(),
                bbox: Aabb::new(lo, hi),
                centroid: (p1 + p2 + p3) / 3.0,
            },
        }
    }

    /// Returns the closest intersection distance of a ray with the
    /// primitive; a negative value means no intersection.
    pub fn intersect(&self, ray: &Ray) -> f32 {
        match &self.shape {
            Shape::Sphere {
                center,
                radius_squared,
                ..
            } => {
                let s = *center - ray.origin;
                let sd = s.dot(ray.direction);
                let ss = s.dot(s);

                let disc = sd * sd - ss + radius_squared;
                if disc < 0.0 {
                    return -1.0;
                }

                // The nearer root when outside, the farther when inside.
                let sqrt_disc = disc.sqrt();
                let p1 = sd - sqrt_disc;
                let p2 = sd + sqrt_disc;
                if p1 < 0.0 {
                    p2
                } else if p2 < 0.0 {
                    p1
                } else {
                    p1.min(p2)
                }
            }
            Shape::Triangle {
                p1, edge1, edge2, ..
            } => {
                /* Möller–Trumbore with epsilon-tolerant barycentric bounds. */
                let distance = ray.origin - *p1;
                let s = ray.direction.cross(*edge2);
                let d = 1.0 / s.dot(*edge1);

                let u = distance.dot(s) * d;
                if u <= -EPSILON || u >= 1.0 + EPSILON {
                    return -1.0;
                }

                let s = distance.cross(*edge1);
                let v = ray.direction.dot(s) * d;
                if v <= -EPSILON || u + v >= 1.0 + EPSILON {
                    return -1.0;
                }

                edge2.dot(s) * d
            }
        }
    }

    /// The surface normal at a point on the primitive's surface.
    pub fn normal(&self, point: Point3) -> Vec3 {
        match &self.shape {
            Shape::Sphere { center, radius, .. } => (point - *center) / *radius,
            Shape::Triangle { normal, .. } => *normal,
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        match &self.shape {
            Shape::Sphere { bbox, .. } | Shape::Triangle { bbox, .. } => *bbox,
        }
    }

    pub fn centroid(&self) -> Point3 {
        match &self.shape {
            Shape::Sphere { center, .. } => *center,
            Shape::Triangle { centroid, .. } => *centroid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_head_on_hit_distance() {
        let sphere = Primitive::sphere(Point3::new(0.0, 0.0, 0.0), 1.0, None, None);
        let origin = Point3::new(0.0, 0.0, -5.0);
        let ray = Ray::new(origin, Vec3::new(0.0, 0.0, 1.0));
        let t = sphere.intersect(&ray);
        // Distance from origin to center minus the radius.
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_tangent_ray_is_positive() {
        let sphere = Primitive::sphere(Point3::new(0.0, 0.0, 0.0), 1.0, None, None);
        let ray = Ray::new(Point3::new(-5.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(sphere.intersect(&ray) > 0.0);
    }

    #[test]
    fn sphere_clear_miss_is_negative() {
        let sphere = Primitive::sphere(Point3::new(0.0, 0.0, 0.0), 1.0, None, None);
        let ray = Ray::new(Point3::new(-5.0, 2.5, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(sphere.intersect(&ray) < 0.0);
    }

    #[test]
    fn sphere_interior_origin_hits_exit() {
        let sphere = Primitive::sphere(Point3::new(0.0, 0.0, 0.0), 2.0, None, None);
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(sphere.intersect(&ray), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_normal_is_radial_unit() {
        let sphere = Primitive::sphere(Point3::new(1.0, 0.0, 0.0), 2.0, None, None);
        let n = sphere.normal(Point3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(n.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(n.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn triangle_hits_satisfy_barycentric_bounds() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let p1 = Point3::new(-1.0, -1.0, 2.0);
        let p2 = Point3::new(1.0, -1.0, 2.0);
        let p3 = Point3::new(0.0, 1.5, 2.0);
        let tri = Primitive::triangle(p1, p2, p3, None, None);

        let mut rng = SmallRng::seed_from_u64(7);
        let mut hits = 0;
        for _ in 0..500 {
            let target = Point3::new(rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..2.0), 2.0);
            let origin = Point3::new(0.0, 0.0, -1.0);
            let ray = Ray::new(origin, (target - origin).normalized());
            let t = tri.intersect(&ray);
            if t > 0.0 {
                hits += 1;
                // Recover the barycentric coordinates of the hit point.
                let hit = ray.at(t);
                let edge1 = p2 - p1;
                let edge2 = p3 - p1;
                let n = edge1.cross(edge2);
                let denom = n.dot(n);
                let u = (hit - p1).cross(edge2).dot(n) / denom;
                let v = edge1.cross(hit - p1).dot(n) / denom;
                // (u, v) here are the weights of p2 and p3 respectively.
                assert!(u >= -1e-3 && v >= -1e-3 && u + v <= 1.0 + 1e-3);
            }
        }
        assert!(hits > 0, "sampling should produce at least one hit");
    }

    #[test]
    fn triangle_behind_ray_is_negative() {
        let tri = Primitive::triangle(
            Point3::new(-1.0, -1.0, -2.0),
            Point3::new(1.0, -1.0, -2.0),
            Point3::new(0.0, 1.0, -2.0),
            None,
            None,
        );
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(tri.intersect(&ray) < 0.0);
    }
}
