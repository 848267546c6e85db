use arrayvec::ArrayVec;

use crate::aabb::Aabb;
use crate::geometry::{safe_normalize, Fp, Ray, Vec3f, EPS, FP_PI};
use crate::material::Material;

#[derive(Clone, Debug)]
pub enum Shape {
    Sphere {
        center: Vec3f,
        radius: Fp,
    },
    /// Finite cylinder with end caps. `half_height` spans [-H, +H] along the
    /// unit `axis`.
    Cylinder {
        center: Vec3f,
        axis: Vec3f,
        radius: Fp,
        half_height: Fp,
    },
    Triangle {
        v0: Vec3f,
        v1: Vec3f,
        v2: Vec3f,
    },
}

#[derive(Clone, Debug)]
pub struct Primitive {
    pub shape: Shape,
    pub material: Material,
}

impl Primitive {
    pub fn new(shape: Shape, material: Material) -> Primitive {
        Primitive { shape, material }
    }
}

impl Shape {
    /// Nearest positive t along the ray, or None. Callers reseat secondary ray
    /// origins by RAY_BIAS, so no epsilon cutoff is applied here.
    pub fn intersect(&self, ray: &Ray) -> Option<Fp> {
        match self {
            Shape::Sphere { center, radius } => intersect_sphere(ray, center, *radius),
            Shape::Cylinder {
                center,
                axis,
                radius,
                half_height,
            } => intersect_cylinder(ray, center, axis, *radius, *half_height),
            Shape::Triangle { v0, v1, v2 } => intersect_triangle(ray, v0, v1, v2),
        }
    }

    /// Unit outward normal at a surface point. Two-sidedness is the shader's
    /// concern.
    pub fn normal(&self, point: &Vec3f) -> Vec3f {
        match self {
            Shape::Sphere { center, radius } => (point - center) / *radius,
            Shape::Cylinder {
                center,
                axis,
                half_height,
                ..
            } => {
                let height = (point - center).dot(axis);
                if (height - half_height).abs() < EPS {
                    *axis
                } else if (height + half_height).abs() < EPS {
                    -*axis
                } else {
                    let radial = (point - center) - axis * height;
                    safe_normalize(radial)
                }
            }
            Shape::Triangle { v0, v1, v2 } => safe_normalize((v1 - v0).cross(&(v2 - v0))),
        }
    }

    pub fn uv(&self, point: &Vec3f) -> (Fp, Fp) {
        match self {
            Shape::Sphere { center, radius } => {
                let d = (point - center) / *radius;
                let u = 0.5 + d.z.atan2(d.x) / (2.0 * FP_PI);
                let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / FP_PI;
                (u, v)
            }
            Shape::Cylinder {
                center,
                axis,
                half_height,
                ..
            } => {
                let d = point - center;
                let u = 0.5 + d.z.atan2(d.x) / (2.0 * FP_PI);
                let v = (d.dot(axis) + half_height) / (2.0 * half_height);
                (u, v)
            }
            Shape::Triangle { v0, v1, v2 } => barycentric_uv(point, v0, v1, v2),
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        match self {
            Shape::Sphere { center, radius } => {
                let r = Vec3f::new(*radius, *radius, *radius);
                Aabb::new(center - r, center + r)
            }
            Shape::Cylinder {
                center,
                axis,
                radius,
                half_height,
            } => {
                // Box enclosing both end-cap disks, inflated by the radius.
                let top = center + axis * *half_height;
                let bottom = center - axis * *half_height;
                let r = Vec3f::new(*radius, *radius, *radius);
                Aabb::new(top.inf(&bottom) - r, top.sup(&bottom) + r)
            }
            Shape::Triangle { v0, v1, v2 } => Aabb::new(v0.inf(v1).inf(v2), v0.sup(v1).sup(v2)),
        }
    }
}

fn intersect_sphere(ray: &Ray, center: &Vec3f, radius: Fp) -> Option<Fp> {
    let oc = ray.origin - center;
    let a = ray.direction.dot(&ray.direction);
    let b = 2.0 * oc.dot(&ray.direction);
    let c = oc.dot(&oc) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a < EPS {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let t0 = (-b - sqrt_d) / (2.0 * a);
    let t1 = (-b + sqrt_d) / (2.0 * a);
    if t0 > 0.0 {
        Some(t0)
    } else if t1 > 0.0 {
        Some(t1)
    } else {
        None
    }
}

fn intersect_cylinder(
    ray: &Ray,
    center: &Vec3f,
    axis: &Vec3f,
    radius: Fp,
    half_height: Fp,
) -> Option<Fp> {
    let mut candidates = ArrayVec::<Fp, 3>::new();

    // Lateral surface: quadratic on the direction projected perpendicular to
    // the axis, keeping the nearest root whose height lies within the caps.
    let oc = ray.origin - center;
    let d_proj = ray.direction - axis * ray.direction.dot(axis);
    let oc_proj = oc - axis * oc.dot(axis);
    let a = d_proj.dot(&d_proj);
    if a > EPS {
        let b = 2.0 * d_proj.dot(&oc_proj);
        let c = oc_proj.dot(&oc_proj) - radius * radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant >= 0.0 {
            let sqrt_d = discriminant.sqrt();
            for t in [(-b - sqrt_d) / (2.0 * a), (-b + sqrt_d) / (2.0 * a)] {
                if t > 0.0 {
                    let height = (ray.at(t) - center).dot(axis);
                    if height >= -half_height && height <= half_height {
                        candidates.push(t);
                        break;
                    }
                }
            }
        }
    }

    // End caps: plane intersection followed by a radial distance check.
    let denom = axis.dot(&ray.direction);
    if denom.abs() > EPS {
        for cap_center in [center + axis * half_height, center - axis * half_height] {
            let t = axis.dot(&(cap_center - ray.origin)) / denom;
            if t > 0.0 && (ray.at(t) - cap_center).norm() <= radius {
                candidates.push(t);
            }
        }
    }

    candidates.into_iter().min_by(Fp::total_cmp)
}

/// Moeller-Trumbore. Degenerate (zero-area) triangles never report a hit.
fn intersect_triangle(ray: &Ray, v0: &Vec3f, v1: &Vec3f, v2: &Vec3f) -> Option<Fp> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(&edge2);
    let det = edge1.dot(&h);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = ray.origin - v0;
    let u = inv_det * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = inv_det * ray.direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = inv_det * edge2.dot(&q);
    if t > 0.0 {
        Some(t)
    } else {
        None
    }
}

fn barycentric_uv(point: &Vec3f, v0: &Vec3f, v1: &Vec3f, v2: &Vec3f) -> (Fp, Fp) {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let p = point - v0;
    let d11 = edge1.dot(&edge1);
    let d12 = edge1.dot(&edge2);
    let d22 = edge2.dot(&edge2);
    let dp1 = p.dot(&edge1);
    let dp2 = p.dot(&edge2);
    let denom = d11 * d22 - d12 * d12;
    if denom.abs() < EPS {
        return (0.0, 0.0);
    }
    let beta = (d22 * dp1 - d12 * dp2) / denom;
    let gamma = (d11 * dp2 - d12 * dp1) / denom;
    (beta, gamma)
}
