use std::sync::Arc;

use crate::geometry::{Fp, Vec3f};
use crate::texture::Texture;

/// Surface parameters for both the Blinn-Phong and path-tracing pipelines.
/// Colors are stored in [0, 1] per channel.
#[derive(Clone, Debug)]
pub struct Material {
    pub ks: Fp,
    pub kd: Fp,
    pub specular_exponent: Fp,
    pub diffuse_color: Vec3f,
    pub specular_color: Vec3f,
    pub is_reflective: bool,
    pub reflectivity: Fp,
    pub is_refractive: bool,
    pub refractive_index: Fp,
    pub texture: Option<Arc<Texture>>,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            ks: 0.0,
            kd: 0.0,
            specular_exponent: 0.0,
            diffuse_color: Vec3f::zeros(),
            specular_color: Vec3f::zeros(),
            is_reflective: false,
            reflectivity: 0.0,
            is_refractive: false,
            refractive_index: 1.0,
            texture: None,
        }
    }
}

impl Material {
    /// Plain diffuse surface, handy for tests and fallback shapes.
    pub fn diffuse(color: Vec3f) -> Material {
        Material {
            kd: 0.9,
            diffuse_color: color,
            ..Material::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_inert() {
        let m = Material::default();
        assert_eq!(m.refractive_index, 1.0);
        assert!(!m.is_reflective);
        assert!(!m.is_refractive);
        assert!(m.texture.is_none());
    }
}
