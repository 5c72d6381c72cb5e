use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, Mul, MulAssign, Neg, Sub, SubAssign};

/// Geometric epsilon for single-precision intersection math. Used both for
/// displacing ray origins off surfaces and for tolerant comparisons.
pub const EPSILON: f32 = 1e-5;

/// Tolerance for delta-function comparisons (e.g. testing whether an exitant
/// direction coincides with the mirror direction of a perfect reflector).
pub const DELTA: f32 = 1e-3;

/// Returns true when `x` is within the delta-function tolerance of zero.
#[inline(always)]
pub fn is_delta(x: f32) -> bool {
    x.abs() <= DELTA
}

/// A 3-component vector used for positions, directions, and XYZ/RGB triples
/// throughout the path tracer.
///
/// This type implements all standard arithmetic operations with operator
/// overloading, and provides the geometric utilities (dot product, cross
/// product, reflection, frame rotation) needed for spectral light transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

pub type Point3 = Vec3;

impl Vec3 {
    #[inline(always)]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// The conventional world-space upwards vector, used as the reference
    /// axis when constructing orthonormal sampling frames.
    #[inline(always)]
    pub const fn up() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    /// Squared Euclidean length — avoids the sqrt for culling paths.
    #[inline(always)]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    #[inline(always)]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Returns the unit vector. Panics on zero-length vectors in debug mode.
    #[inline(always)]
    pub fn normalized(self) -> Self {
        let len = self.length();
        debug_assert!(len > 1e-12, "Attempted to normalize a zero-length vector");
        self / len
    }

    /// The standard Euclidean inner product, fundamental to every geometric
    /// query in the tracer (projection, angle cosines, Fresnel terms).
    #[inline(always)]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product — used for orthonormal camera/sampling bases and the
    /// Möller–Trumbore triangle test.
    #[inline(always)]
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Specular reflection of `self` about the surface normal `n`:
    /// I - 2·dot(I, N)·N.
    #[inline(always)]
    pub fn reflect(self, normal: Self) -> Self {
        self - normal * 2.0 * self.dot(normal)
    }

    /// Component-wise (Hadamard) product.
    #[inline(always)]
    pub fn hadamard(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }

    /// Component-wise minimum.
    #[inline(always)]
    pub fn min_by_component(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    /// Component-wise maximum.
    #[inline(always)]
    pub fn max_by_component(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    /// Component-wise division.
    #[inline(always)]
    pub fn div_by_component(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }

    /// Component-wise linear interpolation: self·(1-t) + other·t.
    #[inline(always)]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

/// Builds a unit vector from spherical coordinates: `phi` is the azimuth
/// around the up axis, `theta` the inclination from it.
#[inline]
pub fn spherical(phi: f32, theta: f32) -> Vec3 {
    Vec3::new(
        phi.cos() * theta.sin(),
        theta.cos(),
        phi.sin() * theta.sin(),
    )
}

/// Rotates a unit vector sampled in the canonical +Y-up frame into the frame
/// whose up axis is the unit normal `n`.
///
/// When `n` is (anti)parallel to the world up vector the basis construction
/// degenerates, so the sample is simply flipped to the normal's side.
#[inline]
pub fn rotate_to_frame(v: Vec3, n: Vec3) -> Vec3 {
    if !is_delta(1.0 - n.dot(Vec3::up()).abs()) {
        let bx = n.cross(Vec3::up()).normalized();
        let bz = n.cross(bx).normalized();
        bx * v.x + n * v.y + bz * v.z
    } else {
        v * v.dot(n).signum()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, t: f32) -> Self {
        Self::new(self.x * t, self.y * t, self.z * t)
    }
}

impl Mul<Vec3> for f32 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, v: Vec3) -> Vec3 {
        v * self
    }
}

impl MulAssign<f32> for Vec3 {
    #[inline(always)]
    fn mul_assign(&mut self, t: f32) {
        self.x *= t;
        self.y *= t;
        self.z *= t;
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;
    #[inline(always)]
    fn div(self, t: f32) -> Self {
        let inv = 1.0 / t;
        Self::new(self.x * inv, self.y * inv, self.z * inv)
    }
}

impl DivAssign<f32> for Vec3 {
    #[inline(always)]
    fn div_assign(&mut self, t: f32) {
        let inv = 1.0 / t;
        self.x *= inv;
        self.y *= inv;
        self.z *= inv;
    }
}

impl Index<usize> for Vec3 {
    type Output = f32;
    fn index(&self, i: usize) -> &f32 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 index out of bounds: {i}"),
        }
    }
}

// ─── Ray ────────────────────────────────────────────────────────────────────

/// A parametric ray R(t) = origin + t · direction.
///
/// The componentwise reciprocal of the direction is cached at construction so
/// AABB slab tests avoid three divisions per node. Invariant: `direction` is
/// normalized by the time the ray reaches the BVH or a material.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3,
    pub direction: Vec3,
    pub inv_direction: Vec3,
}

impl Ray {
    #[inline(always)]
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(1.0, 1.0, 1.0).div_by_component(direction),
        }
    }

    /// Evaluates the ray at parameter t.
    #[inline(always)]
    pub fn at(self, t: f32) -> Point3 {
        self.origin + self.direction * t
    }
}

// ─── Axis-Aligned Bounding Box ──────────────────────────────────────────────

/// An axis-aligned bounding box, the bounding volume used by the BVH.
/// Intersection is tested via the slab method, which intersects the ray's
/// parameter intervals across all three axes.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// A degenerate box containing a single point.
    pub const fn from_point(p: Point3) -> Self {
        Self { min: p, max: p }
    }

    /// Slab-method ray-AABB test using the ray's cached inverse direction.
    /// Returns the `(t_near, t_far)` parameter window on a hit, `None` when
    /// the slabs do not overlap or the whole window lies behind the origin.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, f32)> {
        let tx1 = (self.min.x - ray.origin.x) * ray.inv_direction.x;
        let tx2 = (self.max.x - ray.origin.x) * ray.inv_direction.x;
        let ty1 = (self.min.y - ray.origin.y) * ray.inv_direction.y;
        let ty2 = (self.max.y - ray.origin.y) * ray.inv_direction.y;
        let tz1 = (self.min.z - ray.origin.z) * ray.inv_direction.z;
        let tz2 = (self.max.z - ray.origin.z) * ray.inv_direction.z;

        let t_near = tx1.min(tx2).max(ty1.min(ty2)).max(tz1.min(tz2));
        let t_far = tx1.max(tx2).min(ty1.max(ty2)).min(tz1.max(tz2));

        if t_far >= t_near.max(0.0) {
            Some((t_near, t_far))
        } else {
            None
        }
    }

    /// Grows the box to include a point.
    pub fn expand_point(&mut self, p: Point3) {
        self.min = self.min.min_by_component(p);
        self.max = self.max.max_by_component(p);
    }

    /// Grows the box to include another box.
    pub fn expand_box(&mut self, other: &Aabb) {
        self.min = self.min.min_by_component(other.min);
        self.max = self.max.max_by_component(other.max);
    }

    /// The union of two boxes.
    pub fn union(a: &Aabb, b: &Aabb) -> Aabb {
        Aabb::new(
            a.min.min_by_component(b.min),
            a.max.max_by_component(b.max),
        )
    }

    #[inline(always)]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index of the longest axis (0=x, 1=y, 2=z) — the split dimension for
    /// midpoint BVH construction.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    pub fn surface_area(&self) -> f32 {
        let e = self.extent();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }
}
