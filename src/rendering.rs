use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::ParallelProgressIterator;
use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use rayon::iter::ParallelIterator;
use rayon::prelude::IntoParallelRefIterator;

use crate::camera::Camera;
use crate::geometry::{reflect, safe_normalize, Fp, Ray, Vec3f, EPS, FP_PI, RAY_BIAS};
use crate::material::Material;
use crate::scene::Scene;
use crate::shapes::Shape;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Binary,
    Phong,
    PathTracer,
}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub max_bounces: i32,
    pub mode: RenderMode,
    pub use_bvh: bool,
    pub use_aa: bool,
    /// Stratification grid edge for antialiasing.
    pub aa_grid: u32,
    /// Independent paths averaged per primary ray in path-tracing mode.
    pub path_samples: u32,
    pub tonemap: bool,
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            max_bounces: 0,
            mode: RenderMode::Binary,
            use_bvh: false,
            use_aa: false,
            aa_grid: 8,
            path_samples: 16,
            tonemap: false,
            seed: 0,
        }
    }
}

/// Closest intersection along a ray.
struct Hit {
    index: usize,
    point: Vec3f,
    normal: Vec3f,
}

// Russian roulette starts past this depth.
const ROULETTE_DEPTH: i32 = 3;
const CONTINUE_PROBABILITY: Fp = 0.9;
const WHITE_POINT: Fp = 0.8;

pub struct Renderer<'a> {
    scene: &'a Scene,
    camera: &'a Camera,
    config: RenderConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(scene: &'a Scene, camera: &'a Camera, config: RenderConfig) -> Renderer<'a> {
        Renderer {
            scene,
            camera,
            config,
        }
    }

    /// Render the full image to packed RGB bytes in scanline order. Rows are
    /// distributed over the rayon pool; each row owns an independent RNG
    /// stream derived from the render seed, so output is identical for a
    /// fixed seed no matter the thread count.
    pub fn render(&self) -> Vec<u8> {
        let width = self.camera.width;
        let height = self.camera.height;

        if self.config.use_bvh {
            // Force the lazy build before any parallel traversal starts.
            if let Some(bvh) = self.scene.bvh(self.config.seed) {
                debug_assert!(bvh.validate(&self.scene.primitives));
            }
        }

        let rows_done = AtomicUsize::new(0);
        let last_decile = AtomicUsize::new(0);
        let rows: Vec<u32> = (0..height).collect();
        rows.par_iter()
            .progress_count(height as u64)
            .flat_map_iter(|&y| {
                let mut rng =
                    Xoshiro256StarStar::seed_from_u64(self.config.seed.wrapping_add(y as u64));
                let row: Vec<u8> = (0..width)
                    .flat_map(|x| to_rgb8(self.render_pixel(x, y, &mut rng)))
                    .collect();

                let done = rows_done.fetch_add(1, Ordering::Relaxed) + 1;
                let decile = done * 10 / height as usize;
                if decile > last_decile.fetch_max(decile, Ordering::Relaxed) {
                    log::info!("rendering {}% complete", decile * 10);
                }
                row
            })
            .collect()
    }

    fn render_pixel<R: Rng>(&self, x: u32, y: u32, rng: &mut R) -> Vec3f {
        let color = if !self.config.use_aa {
            let ray = self.camera.ray_through_pixel(x, y, rng);
            self.shade(&ray, 0, rng)
        } else {
            let grid = self.config.aa_grid;
            let mut acc = Vec3f::zeros();
            for sy in 0..grid {
                for sx in 0..grid {
                    // Independent jitter per subpixel cell.
                    let dx = (sx as Fp + rng.gen::<Fp>()) / grid as Fp;
                    let dy = (sy as Fp + rng.gen::<Fp>()) / grid as Fp;
                    let ray = self.camera.ray(x as Fp + dx, y as Fp + dy, rng);
                    acc += self.shade(&ray, 0, rng);
                }
            }
            acc / (grid * grid) as Fp
        };

        if self.config.tonemap {
            tone_map(color)
        } else {
            color
        }
    }

    fn shade<R: Rng>(&self, ray: &Ray, bounce: i32, rng: &mut R) -> Vec3f {
        match self.config.mode {
            RenderMode::Binary => self.shade_binary(ray),
            RenderMode::Phong => self.shade_phong(ray, bounce, rng),
            RenderMode::PathTracer => self.shade_paths(ray, rng),
        }
    }

    fn shade_binary(&self, ray: &Ray) -> Vec3f {
        if self.closest_hit(ray).is_some() {
            Vec3f::new(255.0, 0.0, 0.0)
        } else {
            Vec3f::zeros()
        }
    }

    fn shade_phong<R: Rng>(&self, ray: &Ray, bounce: i32, rng: &mut R) -> Vec3f {
        let hit = match self.closest_hit(ray) {
            Some(hit) => hit,
            None => return self.scene.background * 255.0,
        };
        let primitive = &self.scene.primitives[hit.index];
        let material = &primitive.material;
        let normal = hit.normal;

        let base = base_color(material, &primitive.shape, &hit.point);
        let ambient = base * 0.5;
        let mut diffuse = Vec3f::zeros();
        let mut specular = Vec3f::zeros();
        let view = -ray.direction;

        for light in &self.scene.lights {
            let intensity = light.intensity();
            for sample in light.samples(rng) {
                let to_light = sample.point - hit.point;
                let dist = to_light.norm();
                if dist < EPS {
                    continue;
                }
                let light_dir = to_light / dist;
                let shadow_ray = Ray::new(hit.point + light_dir * RAY_BIAS, light_dir);
                if self.occluded(&shadow_ray, dist) {
                    continue;
                }

                let attenuation = if sample.attenuated {
                    1.0 / (dist * dist)
                } else {
                    1.0
                };
                let lambert = normal.dot(&light_dir).max(0.0);
                diffuse += (material.diffuse_color * 255.0).component_mul(&intensity)
                    * (material.kd * lambert * attenuation * sample.weight);

                let half = safe_normalize(view + light_dir);
                let highlight = normal
                    .dot(&half)
                    .max(0.0)
                    .powf(material.specular_exponent);
                specular += (material.specular_color * 255.0).component_mul(&intensity)
                    * (material.ks * highlight * attenuation * sample.weight);
            }
        }

        let mut color = ambient + diffuse + specular;

        if material.is_reflective && bounce < self.config.max_bounces {
            let reflect_dir = reflect(&ray.direction, &normal);
            let reflect_ray = Ray::new(hit.point + reflect_dir * RAY_BIAS, reflect_dir);
            let reflected = self.shade_phong(&reflect_ray, bounce + 1, rng);
            color = color * (1.0 - material.reflectivity) + reflected * material.reflectivity;
        }

        if material.is_refractive && bounce < self.config.max_bounces {
            let mut eta = 1.0;
            let mut eta_prime = material.refractive_index;
            let mut n = normal;
            let mut cos_i = -n.dot(&ray.direction);
            if cos_i < 0.0 {
                // Exiting the material: flip the normal, swap the indices.
                cos_i = -cos_i;
                n = -n;
                std::mem::swap(&mut eta, &mut eta_prime);
            }
            let ratio = eta / eta_prime;
            let cos_t2 = 1.0 - ratio * ratio * (1.0 - cos_i * cos_i);
            if cos_t2 > 0.0 {
                let refract_dir =
                    (ray.direction * ratio + n * (ratio * cos_i - cos_t2.sqrt())).normalize();
                let refract_ray = Ray::new(hit.point - n * RAY_BIAS, refract_dir);
                let refracted = self.shade_phong(&refract_ray, bounce + 1, rng);
                // `reflectivity` also weights the refracted contribution.
                color = color * (1.0 - material.reflectivity)
                    + refracted * material.reflectivity;
            }
        }

        color.map(|c| c.clamp(0.0, 255.0))
    }

    fn shade_paths<R: Rng>(&self, ray: &Ray, rng: &mut R) -> Vec3f {
        let samples = self.config.path_samples.max(1);
        let mut acc = Vec3f::zeros();
        for _ in 0..samples {
            acc += self.trace_path(ray, 0, rng);
        }
        acc / samples as Fp
    }

    fn trace_path<R: Rng>(&self, ray: &Ray, depth: i32, rng: &mut R) -> Vec3f {
        // The background acts as an environment emitter: both the depth cap
        // and a miss answer with it.
        if depth >= self.config.max_bounces {
            return self.scene.background * 255.0;
        }
        let hit = match self.closest_hit(ray) {
            Some(hit) => hit,
            None => return self.scene.background * 255.0,
        };
        let primitive = &self.scene.primitives[hit.index];
        let material = &primitive.material;
        let base = base_color(material, &primitive.shape, &hit.point);

        let mut roulette_weight = 1.0;
        if depth > ROULETTE_DEPTH {
            if rng.gen::<Fp>() > CONTINUE_PROBABILITY {
                return base * (1.0 - CONTINUE_PROBABILITY);
            }
            // Surviving paths compensate so the estimate stays unbiased.
            roulette_weight = 1.0 / CONTINUE_PROBABILITY;
        }

        let mut direct = Vec3f::zeros();
        for light in &self.scene.lights {
            let intensity = light.intensity();
            for sample in light.samples(rng) {
                let to_light = sample.point - hit.point;
                let dist = to_light.norm();
                if dist < EPS {
                    continue;
                }
                let light_dir = to_light / dist;
                let shadow_ray = Ray::new(hit.point + light_dir * RAY_BIAS, light_dir);
                if self.occluded(&shadow_ray, dist) {
                    continue;
                }
                let attenuation = if sample.attenuated {
                    1.0 / (dist * dist)
                } else {
                    1.0
                };
                let cos = hit.normal.dot(&light_dir).max(0.0);
                direct += intensity * (cos * attenuation * sample.weight * 255.0);
            }
        }

        let omega = cosine_hemisphere(&hit.normal, rng);
        let bounce_ray = Ray::new(hit.point + omega * RAY_BIAS, omega);
        let indirect = self.trace_path(&bounce_ray, depth + 1, rng);
        let cos_theta = hit.normal.dot(&omega).max(0.0);

        let base01 = base / 255.0;
        let mut color = base01.component_mul(&(direct + indirect * cos_theta));

        if material.is_reflective || material.is_refractive {
            let reflect_dir = reflect(&ray.direction, &hit.normal);
            let reflect_ray = Ray::new(hit.point + reflect_dir * RAY_BIAS, reflect_dir);
            let reflected = self.trace_path(&reflect_ray, depth + 1, rng);

            if material.is_refractive {
                let mut eta = 1.0;
                let mut eta_prime = material.refractive_index;
                let mut n = hit.normal;
                let mut cos_i = -n.dot(&ray.direction);
                if cos_i < 0.0 {
                    cos_i = -cos_i;
                    n = -n;
                    std::mem::swap(&mut eta, &mut eta_prime);
                }
                let ratio = eta / eta_prime;
                let cos_t2 = 1.0 - ratio * ratio * (1.0 - cos_i * cos_i);
                let f0 = ((eta - eta_prime) / (eta + eta_prime)).powi(2);
                let fresnel = f0 + (1.0 - f0) * (1.0 - cos_i).powi(5);
                if cos_t2 > 0.0 {
                    let refract_dir = (ray.direction * ratio
                        + n * (ratio * cos_i - cos_t2.sqrt()))
                    .normalize();
                    let refract_ray = Ray::new(hit.point - n * RAY_BIAS, refract_dir);
                    let refracted = self.trace_path(&refract_ray, depth + 1, rng);
                    color = reflected * fresnel + refracted * (1.0 - fresnel);
                } else {
                    // Total internal reflection.
                    color = reflected;
                }
            } else {
                let cos = hit.normal.dot(&ray.direction).abs();
                let fresnel = material.reflectivity
                    + (1.0 - material.reflectivity) * (1.0 - cos).powi(5);
                color = color * (1.0 - fresnel) + reflected * fresnel;
            }
        }

        color * roulette_weight
    }

    /// Unified closest-intersection query over the linear scan and the BVH.
    fn closest_hit(&self, ray: &Ray) -> Option<Hit> {
        let (t, index) = if self.config.use_bvh {
            self.scene
                .bvh(self.config.seed)
                .and_then(|bvh| bvh.intersect(ray, &self.scene.primitives))?
        } else {
            self.scene
                .primitives
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.shape.intersect(ray).map(|t| (t, i)))
                .min_by(|a, b| a.0.total_cmp(&b.0))?
        };
        let point = ray.at(t);
        let normal = self.scene.primitives[index].shape.normal(&point);
        Some(Hit {
            index,
            point,
            normal,
        })
    }

    fn occluded(&self, ray: &Ray, max_dist: Fp) -> bool {
        if self.config.use_bvh {
            self.scene
                .bvh(self.config.seed)
                .is_some_and(|bvh| bvh.occluded(ray, &self.scene.primitives, max_dist))
        } else {
            self.scene
                .primitives
                .iter()
                .any(|p| p.shape.intersect(ray).is_some_and(|t| t < max_dist))
        }
    }
}

/// Texture sample when the material carries one, diffuse color otherwise.
/// Answers in the 0..255 domain.
fn base_color(material: &Material, shape: &Shape, point: &Vec3f) -> Vec3f {
    match &material.texture {
        Some(texture) => {
            let (u, v) = shape.uv(point);
            texture.sample(u, v)
        }
        None => material.diffuse_color * 255.0,
    }
}

/// Unit direction on the hemisphere around `normal`, density proportional to
/// the cosine of the polar angle.
pub fn cosine_hemisphere<R: Rng>(normal: &Vec3f, rng: &mut R) -> Vec3f {
    let u1: Fp = rng.gen();
    let u2: Fp = rng.gen();
    let r = (1.0 - u1 * u1).sqrt();
    let phi = 2.0 * FP_PI * u2;

    let tangent = if normal.x.abs() > 0.9 {
        Vec3f::new(0.0, 1.0, 0.0)
    } else {
        Vec3f::new(1.0, 0.0, 0.0)
    };
    let bitangent = normal.cross(&tangent).normalize();
    let tangent = bitangent.cross(normal);

    (tangent * (r * phi.cos()) + bitangent * (r * phi.sin()) + normal * u1).normalize()
}

/// Luminance-preserving Reinhard with a white point, in the 0..255 domain.
pub fn tone_map(color: Vec3f) -> Vec3f {
    let c = color / 255.0;
    let luminance = 0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z;
    let scale = if luminance > 0.0 {
        let mapped =
            luminance * (1.0 + luminance / (WHITE_POINT * WHITE_POINT)) / (1.0 + luminance);
        mapped / luminance
    } else {
        1.0
    };
    (c * scale * 255.0).map(|v| v.clamp(0.0, 255.0))
}

pub fn to_rgb8(color: Vec3f) -> [u8; 3] {
    [
        color.x.clamp(0.0, 255.0) as u8,
        color.y.clamp(0.0, 255.0) as u8,
        color.z.clamp(0.0, 255.0) as u8,
    ]
}
