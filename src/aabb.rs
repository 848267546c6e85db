use crate::geometry::{Fp, Ray, Vec3f, EPS, FP_INF, FP_NEG_INF};

#[derive(Clone, Debug)]
pub struct Aabb {
    pub min: Vec3f,
    pub max: Vec3f,
}

impl Aabb {
    pub fn new(min: Vec3f, max: Vec3f) -> Aabb {
        Aabb { min, max }
    }

    /// Slab test against all three axes. An axis the ray runs parallel to is a
    /// miss unless the origin lies between the slabs.
    pub fn intersect(&self, ray: &Ray) -> bool {
        let mut tmin = FP_NEG_INF;
        let mut tmax = FP_INF;

        for i in 0..3 {
            let origin = ray.origin[i];
            let dir = ray.direction[i];
            if dir.abs() < EPS {
                if origin < self.min[i] || origin > self.max[i] {
                    return false;
                }
                continue;
            }

            let inv_d = 1.0 / dir;
            let mut t0 = (self.min[i] - origin) * inv_d;
            let mut t1 = (self.max[i] - origin) * inv_d;
            if inv_d < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }

            tmin = Fp::max(tmin, t0);
            tmax = Fp::min(tmax, t1);
            if tmax <= tmin + EPS {
                return false;
            }
        }

        tmax >= 0.0
    }

    pub fn surrounding_box(a: &Aabb, b: &Aabb) -> Aabb {
        Aabb {
            min: a.min.inf(&b.min),
            max: a.max.sup(&b.max),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        for i in 0..3 {
            if other.min[i] < self.min[i] || other.max[i] > self.max[i] {
                return false;
            }
        }
        true
    }
}
