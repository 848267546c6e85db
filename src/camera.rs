use rand::Rng;
use rand_distr::{Distribution, UnitDisc};

use crate::geometry::{Fp, Ray, Vec3f};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraKind {
    Pinhole,
    ThinLens,
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub kind: CameraKind,
    pub width: u32,
    pub height: u32,
    pub position: Vec3f,
    pub fov: Fp,
    /// Parsed from the scene file and carried for compatibility; no pipeline
    /// consumes it.
    pub exposure: Fp,
    pub aperture: Fp,
    pub focal_distance: Fp,
    forward: Vec3f,
    right: Vec3f,
    up: Vec3f,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: CameraKind,
        width: u32,
        height: u32,
        position: Vec3f,
        look_at: Vec3f,
        up_vector: Vec3f,
        fov: Fp,
        exposure: Fp,
        aperture: Fp,
        focal_distance: Fp,
    ) -> Camera {
        let forward = (look_at - position).normalize();
        let right = forward.cross(&up_vector).normalize();
        let up = right.cross(&forward).normalize();
        Camera {
            kind,
            width,
            height,
            position,
            fov,
            exposure,
            aperture,
            focal_distance,
            forward,
            right,
            up,
        }
    }

    /// Primary ray through continuous pixel coordinates, origin at the
    /// top-left. The leading negation of px flips the image horizontally.
    pub fn ray<R: Rng>(&self, x: Fp, y: Fp, rng: &mut R) -> Ray {
        let aspect = self.width as Fp / self.height as Fp;
        let fov_scale = (self.fov.to_radians() * 0.5).tan();
        let px = -(2.0 * x / self.width as Fp - 1.0) * aspect * fov_scale;
        let py = (1.0 - 2.0 * y / self.height as Fp) * fov_scale;
        let direction = (self.forward + self.right * px + self.up * py).normalize();

        match self.kind {
            CameraKind::Pinhole => Ray::new(self.position, direction),
            CameraKind::ThinLens => {
                let focal_point = self.position + direction * self.focal_distance;
                let [dx, dy]: [Fp; 2] = UnitDisc.sample(rng);
                let lens_point =
                    self.position + (self.right * dx + self.up * dy) * self.aperture;
                Ray::new(lens_point, (focal_point - lens_point).normalize())
            }
        }
    }

    /// Ray through the center of an integer pixel.
    pub fn ray_through_pixel<R: Rng>(&self, x: u32, y: u32, rng: &mut R) -> Ray {
        self.ray(x as Fp + 0.5, y as Fp + 0.5, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn pinhole() -> Camera {
        Camera::new(
            CameraKind::Pinhole,
            64,
            64,
            Vec3f::zeros(),
            Vec3f::new(0.0, 0.0, -1.0),
            Vec3f::new(0.0, 1.0, 0.0),
            60.0,
            1.0,
            0.0,
            0.0,
        )
    }

    #[test]
    fn pinhole_rays_start_at_the_camera() {
        let camera = pinhole();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let ray = camera.ray_through_pixel(10, 50, &mut rng);
        assert_eq!(ray.origin, camera.position);
        assert!((ray.direction.norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn adjacent_pixels_diverge() {
        let camera = pinhole();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let a = camera.ray_through_pixel(31, 32, &mut rng);
        let b = camera.ray_through_pixel(32, 32, &mut rng);
        let cos = a.direction.dot(&b.direction);
        assert!(cos < 1.0 - 1e-7);
        assert!(cos > 0.99);
    }

    #[test]
    fn horizontal_axis_is_flipped() {
        let camera = pinhole();
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        // Looking down -z with up +y, right is +x. A pixel left of center has
        // px > 0, so the left half of the image shows the +x side of the
        // world.
        let left = camera.ray(16.0, 32.0, &mut rng);
        assert!(left.direction.x > 0.0);
        let right = camera.ray(48.0, 32.0, &mut rng);
        assert!(right.direction.x < 0.0);
    }

    #[test]
    fn thin_lens_focuses_on_the_focal_plane() {
        let camera = Camera::new(
            CameraKind::ThinLens,
            64,
            64,
            Vec3f::zeros(),
            Vec3f::new(0.0, 0.0, -1.0),
            Vec3f::new(0.0, 1.0, 0.0),
            60.0,
            1.0,
            0.1,
            5.0,
        );
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        // All lens rays for one pixel pass within lens-jitter distance of the
        // shared focal point.
        let mut rng2 = Xoshiro256StarStar::seed_from_u64(99);
        let pin = Camera::new(
            CameraKind::Pinhole,
            64,
            64,
            Vec3f::zeros(),
            Vec3f::new(0.0, 0.0, -1.0),
            Vec3f::new(0.0, 1.0, 0.0),
            60.0,
            1.0,
            0.0,
            0.0,
        );
        let focal_point = pin.ray_through_pixel(20, 20, &mut rng2).at(5.0);
        for _ in 0..16 {
            let ray = camera.ray_through_pixel(20, 20, &mut rng);
            assert!(ray.origin.z.abs() < 1e-6);
            assert!((ray.origin - camera.position).norm() <= 0.1 + 1e-5);
            let t = (focal_point.z - ray.origin.z) / ray.direction.z;
            let reached = ray.at(t);
            assert!((reached - focal_point).norm() < 1e-3);
        }
    }
}
