use nalgebra::Vector3;

pub type Fp = f32;
pub const FP_PI: Fp = std::f32::consts::PI;
pub const FP_INF: Fp = f32::INFINITY;
pub const FP_NEG_INF: Fp = f32::NEG_INFINITY;
pub type Vec3f = Vector3<Fp>;

// Below this a direction component counts as parallel and a quadratic as degenerate.
pub const EPS: Fp = 1e-6;
// Offset applied along the emerging direction when reseating secondary rays.
pub const RAY_BIAS: Fp = 1e-4;

#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: Vec3f,
    pub direction: Vec3f,
}

impl Ray {
    pub fn new(origin: Vec3f, direction: Vec3f) -> Ray {
        Ray { origin, direction }
    }

    pub fn at(&self, t: Fp) -> Vec3f {
        self.origin + self.direction * t
    }
}

pub fn reflect(direction: &Vec3f, normal: &Vec3f) -> Vec3f {
    direction - normal * (2.0 * normal.dot(direction))
}

/// Normalize, returning the input unchanged when its length is zero.
pub fn safe_normalize(v: Vec3f) -> Vec3f {
    let norm = v.norm();
    if norm > 0.0 {
        v / norm
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_flips_incident_component() {
        let d = Vec3f::new(1.0, -1.0, 0.0).normalize();
        let n = Vec3f::new(0.0, 1.0, 0.0);
        let r = reflect(&d, &n);
        assert!((r - Vec3f::new(1.0, 1.0, 0.0).normalize()).norm() < 1e-6);
    }

    #[test]
    fn safe_normalize_keeps_zero_vector() {
        let z = Vec3f::zeros();
        assert_eq!(safe_normalize(z), z);
        let v = Vec3f::new(3.0, 0.0, 4.0);
        assert!((safe_normalize(v).norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ray_at_walks_along_direction() {
        let ray = Ray::new(Vec3f::new(1.0, 2.0, 3.0), Vec3f::new(0.0, 0.0, -1.0));
        assert_eq!(ray.at(2.0), Vec3f::new(1.0, 2.0, 1.0));
    }
}
