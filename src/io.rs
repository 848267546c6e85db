use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::camera::{Camera, CameraKind};
use crate::geometry::{Fp, Vec3f};
use crate::lights::Light;
use crate::material::Material;
use crate::rendering::{RenderConfig, RenderMode};
use crate::scene::Scene;
use crate::shapes::{Primitive, Shape};
use crate::texture::Texture;

#[derive(Debug)]
pub enum SceneError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Io(e) => write!(f, "i/o error: {}", e),
            SceneError::Json(e) => write!(f, "scene file error: {}", e),
            SceneError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Io(e) => Some(e),
            SceneError::Json(e) => Some(e),
            SceneError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for SceneError {
    fn from(e: std::io::Error) -> Self {
        SceneError::Io(e)
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(e: serde_json::Error) -> Self {
        SceneError::Json(e)
    }
}

/// CLI-controlled knobs merged with the scene file into a RenderConfig.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderOptions {
    pub use_bvh: bool,
    pub use_aa: bool,
    pub seed: u64,
}

#[derive(Deserialize)]
struct SceneFile {
    #[serde(default)]
    nbounces: i32,
    rendermode: String,
    camera: CameraJson,
    scene: WorldJson,
    #[serde(default)]
    tonemap: bool,
}

#[derive(Deserialize)]
struct CameraJson {
    #[serde(rename = "type")]
    kind: String,
    width: u32,
    height: u32,
    position: [Fp; 3],
    #[serde(rename = "lookAt")]
    look_at: [Fp; 3],
    #[serde(rename = "upVector")]
    up_vector: [Fp; 3],
    fov: Fp,
    exposure: Fp,
    #[serde(default)]
    aperture: Fp,
    #[serde(rename = "focalDistance", default)]
    focal_distance: Fp,
}

#[derive(Deserialize)]
struct WorldJson {
    backgroundcolor: [Fp; 3],
    #[serde(default)]
    lightsources: Vec<LightJson>,
    shapes: Vec<ShapeJson>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum LightJson {
    #[serde(rename = "pointlight")]
    Point {
        position: [Fp; 3],
        intensity: [Fp; 3],
    },
    #[serde(rename = "arealight")]
    Area {
        position: [Fp; 3],
        intensity: [Fp; 3],
        u_axis: [Fp; 3],
        v_axis: [Fp; 3],
    },
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ShapeJson {
    #[serde(rename = "sphere")]
    Sphere {
        center: [Fp; 3],
        radius: Fp,
        material: Option<MaterialJson>,
    },
    #[serde(rename = "cylinder")]
    Cylinder {
        center: [Fp; 3],
        axis: [Fp; 3],
        radius: Fp,
        // Half-height: the cylinder spans [-height, +height] along its axis.
        height: Fp,
        material: Option<MaterialJson>,
    },
    #[serde(rename = "triangle")]
    Triangle {
        v0: [Fp; 3],
        v1: [Fp; 3],
        v2: [Fp; 3],
        material: Option<MaterialJson>,
    },
}

#[derive(Deserialize)]
struct MaterialJson {
    ks: Fp,
    kd: Fp,
    specularexponent: Fp,
    diffusecolor: [Fp; 3],
    specularcolor: [Fp; 3],
    isreflective: bool,
    reflectivity: Fp,
    isrefractive: bool,
    refractiveindex: Fp,
    #[serde(rename = "hasTexture", default)]
    has_texture: bool,
    #[serde(rename = "textureFilename", default)]
    texture_filename: String,
}

fn vec3(a: [Fp; 3]) -> Vec3f {
    Vec3f::new(a[0], a[1], a[2])
}

/// Load a scene file and assemble everything a render needs.
pub fn load_renderer(
    path: &Path,
    options: &RenderOptions,
) -> Result<(Scene, Camera, RenderConfig), SceneError> {
    let data = fs::read_to_string(path)?;
    let file: SceneFile = serde_json::from_str(&data)?;
    build_renderer(file, options)
}

fn build_renderer(
    file: SceneFile,
    options: &RenderOptions,
) -> Result<(Scene, Camera, RenderConfig), SceneError> {
    let mode = match file.rendermode.as_str() {
        "binary" => RenderMode::Binary,
        "phong" => RenderMode::Phong,
        "pathtracer" => RenderMode::PathTracer,
        other => {
            return Err(SceneError::Invalid(format!(
                "unknown render mode: {}",
                other
            )))
        }
    };

    let camera = build_camera(file.camera)?;

    let lights = file
        .scene
        .lightsources
        .into_iter()
        .map(|light| match light {
            LightJson::Point {
                position,
                intensity,
            } => Light::Point {
                position: vec3(position),
                intensity: vec3(intensity),
            },
            LightJson::Area {
                position,
                intensity,
                u_axis,
                v_axis,
            } => Light::Area {
                position: vec3(position),
                intensity: vec3(intensity),
                u_axis: vec3(u_axis),
                v_axis: vec3(v_axis),
            },
        })
        .collect();

    let mut primitives = Vec::with_capacity(file.scene.shapes.len());
    for shape in file.scene.shapes {
        primitives.push(build_primitive(shape)?);
    }

    let scene = Scene::new(vec3(file.scene.backgroundcolor), lights, primitives);
    let config = RenderConfig {
        max_bounces: file.nbounces,
        mode,
        use_bvh: options.use_bvh,
        use_aa: options.use_aa,
        tonemap: file.tonemap,
        seed: options.seed,
        ..RenderConfig::default()
    };
    Ok((scene, camera, config))
}

fn build_camera(json: CameraJson) -> Result<Camera, SceneError> {
    let kind = match json.kind.as_str() {
        "pinhole" => CameraKind::Pinhole,
        "thinlens" => CameraKind::ThinLens,
        other => {
            return Err(SceneError::Invalid(format!(
                "unknown camera type: {}",
                other
            )))
        }
    };
    if json.width == 0 || json.height == 0 {
        return Err(SceneError::Invalid(format!(
            "degenerate image size {}x{}",
            json.width, json.height
        )));
    }
    Ok(Camera::new(
        kind,
        json.width,
        json.height,
        vec3(json.position),
        vec3(json.look_at),
        vec3(json.up_vector),
        json.fov,
        json.exposure,
        json.aperture,
        json.focal_distance,
    ))
}

fn build_primitive(json: ShapeJson) -> Result<Primitive, SceneError> {
    let (shape, material) = match json {
        ShapeJson::Sphere {
            center,
            radius,
            material,
        } => (
            Shape::Sphere {
                center: vec3(center),
                radius,
            },
            material,
        ),
        ShapeJson::Cylinder {
            center,
            axis,
            radius,
            height,
            material,
        } => (
            Shape::Cylinder {
                center: vec3(center),
                axis: vec3(axis).normalize(),
                radius,
                half_height: height,
            },
            material,
        ),
        ShapeJson::Triangle {
            v0,
            v1,
            v2,
            material,
        } => (
            Shape::Triangle {
                v0: vec3(v0),
                v1: vec3(v1),
                v2: vec3(v2),
            },
            material,
        ),
    };
    Ok(Primitive::new(shape, build_material(material)?))
}

fn build_material(json: Option<MaterialJson>) -> Result<Material, SceneError> {
    let Some(json) = json else {
        return Ok(Material::default());
    };
    let texture = if json.has_texture && !json.texture_filename.is_empty() {
        let path = Path::new(&json.texture_filename);
        let texture = Texture::load_ppm(path)?;
        log::debug!(
            "loaded texture {} ({}x{})",
            path.display(),
            texture.width(),
            texture.height()
        );
        Some(Arc::new(texture))
    } else {
        None
    };
    Ok(Material {
        ks: json.ks,
        kd: json.kd,
        specular_exponent: json.specularexponent,
        diffuse_color: vec3(json.diffusecolor),
        specular_color: vec3(json.specularcolor),
        is_reflective: json.isreflective,
        reflectivity: json.reflectivity,
        is_refractive: json.isrefractive,
        refractive_index: json.refractiveindex,
        texture,
    })
}

/// `renders/<scene basename without .json>.ppm`
pub fn output_path(scene_path: &Path) -> PathBuf {
    let stem = scene_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string());
    Path::new("renders").join(format!("{}.ppm", stem))
}

/// ASCII PPM, one RGB triple per pixel, one scanline per text line.
pub fn ppm_encode(pixels: &[u8], width: u32, height: u32) -> String {
    let mut out = String::with_capacity(pixels.len() * 4 + 32);
    let _ = write!(out, "P3\n{} {}\n255\n", width, height);
    for row in pixels.chunks(width as usize * 3) {
        let mut sep = "";
        for channel in row {
            let _ = write!(out, "{}{}", sep, channel);
            sep = " ";
        }
        out.push('\n');
    }
    out
}

pub fn write_ppm(
    pixels: &[u8],
    width: u32,
    height: u32,
    scene_path: &Path,
) -> Result<PathBuf, SceneError> {
    let out = output_path(scene_path);
    if let Some(dir) = out.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&out, ppm_encode(pixels, width, height))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "nbounces": 4,
        "rendermode": "phong",
        "camera": {
            "type": "pinhole",
            "width": 64, "height": 48,
            "position": [0, 0, 0],
            "lookAt": [0, 0, -1],
            "upVector": [0, 1, 0],
            "fov": 60, "exposure": 0.1
        },
        "scene": {
            "backgroundcolor": [0.2, 0.3, 0.8],
            "lightsources": [
                { "type": "pointlight", "position": [0, 5, 0], "intensity": [1, 1, 1] },
                { "type": "arealight", "position": [0, 4, -2], "intensity": [1, 1, 1],
                  "u_axis": [1, 0, 0], "v_axis": [0, 0, 1] }
            ],
            "shapes": [
                { "type": "sphere", "center": [0, 0, -3], "radius": 1,
                  "material": {
                      "ks": 0.5, "kd": 0.8, "specularexponent": 32,
                      "diffusecolor": [1, 0, 0], "specularcolor": [1, 1, 1],
                      "isreflective": false, "reflectivity": 0,
                      "isrefractive": false, "refractiveindex": 1
                  } },
                { "type": "cylinder", "center": [2, 0, -4], "axis": [0, 1, 0],
                  "radius": 0.5, "height": 1.5 },
                { "type": "triangle", "v0": [-2, 0, -4], "v1": [0, 0, -4], "v2": [-1, 2, -4] }
            ]
        }
    }"#;

    fn load(json: &str) -> Result<(Scene, Camera, RenderConfig), SceneError> {
        let file: SceneFile = serde_json::from_str(json)?;
        build_renderer(file, &RenderOptions::default())
    }

    #[test]
    fn full_scene_parses() {
        let (scene, camera, config) = load(SCENE).unwrap();
        assert_eq!(config.max_bounces, 4);
        assert_eq!(config.mode, RenderMode::Phong);
        assert!(!config.tonemap);
        assert_eq!(camera.width, 64);
        assert_eq!(camera.height, 48);
        assert_eq!(scene.lights.len(), 2);
        assert_eq!(scene.primitives.len(), 3);
        assert_eq!(scene.background, Vec3f::new(0.2, 0.3, 0.8));

        match &scene.primitives[0].shape {
            Shape::Sphere { center, radius } => {
                assert_eq!(*center, Vec3f::new(0.0, 0.0, -3.0));
                assert_eq!(*radius, 1.0);
            }
            other => panic!("expected sphere, got {:?}", other),
        }
        assert_eq!(scene.primitives[0].material.kd, 0.8);

        match &scene.primitives[1].shape {
            Shape::Cylinder {
                axis, half_height, ..
            } => {
                assert!((axis.norm() - 1.0).abs() < 1e-6);
                assert_eq!(*half_height, 1.5);
            }
            other => panic!("expected cylinder, got {:?}", other),
        }
        // Shapes without a material block fall back to the inert default.
        assert_eq!(scene.primitives[1].material.kd, 0.0);
    }

    #[test]
    fn unknown_render_mode_is_rejected() {
        let json = SCENE.replace("\"phong\"", "\"wireframe\"");
        match load(&json) {
            Err(SceneError::Invalid(message)) => assert!(message.contains("wireframe")),
            other => panic!("expected invalid-mode error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_shape_type_is_rejected() {
        let json = SCENE.replace("\"triangle\"", "\"torus\"");
        assert!(matches!(load(&json), Err(SceneError::Json(_))));
    }

    #[test]
    fn missing_nbounces_defaults_to_zero() {
        let json = SCENE.replace("\"nbounces\": 4,", "");
        let (_, _, config) = load(&json).unwrap();
        assert_eq!(config.max_bounces, 0);
    }

    #[test]
    fn ppm_encoding_matches_the_plain_format() {
        let pixels = [255u8, 0, 0, 0, 255, 0, 0, 0, 255, 10, 20, 30];
        let encoded = ppm_encode(&pixels, 2, 2);
        assert_eq!(encoded, "P3\n2 2\n255\n255 0 0 0 255 0\n0 0 255 10 20 30\n");
    }

    #[test]
    fn output_path_strips_the_json_extension() {
        assert_eq!(
            output_path(Path::new("sceneJsons/cornell.json")),
            Path::new("renders").join("cornell.ppm")
        );
    }
}
