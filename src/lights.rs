use arrayvec::ArrayVec;
use rand::Rng;

use crate::geometry::{Fp, Vec3f};

/// Samples drawn from an area emitter per shading point.
pub const AREA_LIGHT_SAMPLES: usize = 16;

#[derive(Clone, Debug)]
pub enum Light {
    Point {
        position: Vec3f,
        intensity: Vec3f,
    },
    /// Rectangular emitter centered at `position`, spanned by `u_axis` and
    /// `v_axis`.
    Area {
        position: Vec3f,
        intensity: Vec3f,
        u_axis: Vec3f,
        v_axis: Vec3f,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    pub point: Vec3f,
    pub weight: Fp,
    /// Area-light samples attenuate by inverse square distance; point lights
    /// do not.
    pub attenuated: bool,
}

impl Light {
    pub fn intensity(&self) -> Vec3f {
        match self {
            Light::Point { intensity, .. } | Light::Area { intensity, .. } => *intensity,
        }
    }

    pub fn samples<R: Rng>(&self, rng: &mut R) -> ArrayVec<LightSample, AREA_LIGHT_SAMPLES> {
        let mut samples = ArrayVec::new();
        match self {
            Light::Point { position, .. } => {
                samples.push(LightSample {
                    point: *position,
                    weight: 1.0,
                    attenuated: false,
                });
            }
            Light::Area {
                position,
                u_axis,
                v_axis,
                ..
            } => {
                let weight = 1.0 / AREA_LIGHT_SAMPLES as Fp;
                for _ in 0..AREA_LIGHT_SAMPLES {
                    let alpha: Fp = rng.gen_range(-0.5..0.5);
                    let beta: Fp = rng.gen_range(-0.5..0.5);
                    samples.push(LightSample {
                        point: position + u_axis * alpha + v_axis * beta,
                        weight,
                        attenuated: true,
                    });
                }
            }
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn point_light_has_one_unattenuated_sample() {
        let light = Light::Point {
            position: Vec3f::new(0.0, 5.0, 0.0),
            intensity: Vec3f::new(1.0, 1.0, 1.0),
        };
        let mut rng = Xoshiro256StarStar::seed_from_u64(0);
        let samples = light.samples(&mut rng);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].weight, 1.0);
        assert!(!samples[0].attenuated);
        assert_eq!(samples[0].point, Vec3f::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn area_light_samples_stay_on_the_emitter() {
        let light = Light::Area {
            position: Vec3f::new(0.0, 4.0, 0.0),
            intensity: Vec3f::new(1.0, 1.0, 1.0),
            u_axis: Vec3f::new(2.0, 0.0, 0.0),
            v_axis: Vec3f::new(0.0, 0.0, 2.0),
        };
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let samples = light.samples(&mut rng);
        assert_eq!(samples.len(), AREA_LIGHT_SAMPLES);
        let total: Fp = samples.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-5);
        for sample in &samples {
            assert!(sample.attenuated);
            assert!(sample.point.x.abs() <= 1.0 + 1e-5);
            assert!(sample.point.z.abs() <= 1.0 + 1e-5);
            assert_eq!(sample.point.y, 4.0);
        }
    }
}
