use crate::math::{Point3, Ray, Vec3};

/// The closed set of camera models.
///
/// The perspective camera precomputes its four focal-plane corner points at
/// construction: an orthonormal basis is built from the look-at parameters
/// (z towards the target, x to the right, y up), and the corners sit at unit
/// distance along the look direction, offset by ±tan(fov/2) along x and y.
/// Primary rays are then just bilinear interpolations over the corners —
/// no per-ray trigonometry.
#[derive(Debug, Clone)]
pub enum Camera {
    Perspective {
        position: Point3,
        focal_plane: [Point3; 4],
    },
}

impl Camera {
    /// Builds a perspective camera at `position` looking at `target` with
    /// the given vertical field of view in radians.
    pub fn perspective(position: Point3, target: Point3, fov: f32) -> Self {
        let z_axis = (target - position).normalized();
        let x_axis = Vec3::up().cross(z_axis).normalized();
        let y_axis = z_axis.cross(x_axis).normalized();

        let half = (fov * 0.5).tan();
        let corner =
            |sx: f32, sy: f32| position + x_axis * (sx * half) + y_axis * (sy * half) + z_axis;

        /* Corner order: bottom-left, bottom-right, top-right, top-left. */
        let focal_plane = [
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        ];

        Camera::Perspective {
            position,
            focal_plane,
        }
    }

    /// Maps normalized screen coordinates (u, v) ∈ [−1, 1]² to a world-space
    /// primary ray by bilinear interpolation over the focal-plane corners.
    pub fn trace(&self, u: f32, v: f32) -> Ray {
        match self {
            Camera::Perspective {
                position,
                focal_plane,
            } => {
                let s = (u + 1.0) * 0.5;
                let t = (1.0 - v) * 0.5;
                let bottom = focal_plane[0].lerp(focal_plane[1], s);
                let top = focal_plane[3].lerp(focal_plane[2], s);
                let point = bottom.lerp(top, t);
                Ray::new(*position, (point - *position).normalized())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn center_ray_points_at_the_target() {
        let position = Point3::new(0.0, 1.0, -5.0);
        let target = Point3::new(0.0, 1.0, 0.0);
        let camera = Camera::perspective(position, target, 1.0);
        let ray = camera.trace(0.0, 0.0);
        let look = (target - position).normalized();
        assert_relative_eq!(ray.direction.x, look.x, epsilon = 1e-5);
        assert_relative_eq!(ray.direction.y, look.y, epsilon = 1e-5);
        assert_relative_eq!(ray.direction.z, look.z, epsilon = 1e-5);
    }

    #[test]
    fn traced_rays_are_normalized() {
        let camera = Camera::perspective(
            Point3::new(2.0, 3.0, -4.0),
            Point3::new(0.0, 0.0, 0.0),
            std::f32::consts::FRAC_PI_2,
        );
        for &(u, v) in &[(-1.0, -1.0), (1.0, 1.0), (0.3, -0.7), (0.0, 0.0)] {
            let ray = camera.trace(u, v);
            assert_relative_eq!(ray.direction.length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn screen_v_grows_downward() {
        // v = −1 is the top scanline, so it must map to the upward corners.
        let camera = Camera::perspective(
            Point3::new(0.0, 0.0, -5.0),
            Point3::new(0.0, 0.0, 0.0),
            1.0,
        );
        let top_ray = camera.trace(0.0, -1.0);
        let bottom_ray = camera.trace(0.0, 1.0);
        assert!(top_ray.direction.y > 0.0);
        assert!(bottom_ray.direction.y < 0.0);
    }
}
