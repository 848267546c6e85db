mod aabb;
mod bvh;
mod camera;
mod geometry;
mod io;
mod lights;
mod material;
mod rendering;
mod scene;
mod shapes;
mod texture;

use std::path::PathBuf;
use std::time::Instant;

use crate::io::{RenderOptions, SceneError};
use crate::rendering::Renderer;

const USAGE: &str = "usage: render <scene.json> [--useBVH] [--useAA] [--png <path>] [--seed <n>]";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

struct CliArgs {
    scene: PathBuf,
    options: RenderOptions,
    png: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs, SceneError> {
    let mut args = std::env::args().skip(1);
    let mut scene = None;
    let mut options = RenderOptions::default();
    let mut png = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--useBVH" => options.use_bvh = true,
            "--useAA" => options.use_aa = true,
            "--png" => {
                let path = args
                    .next()
                    .ok_or_else(|| SceneError::Invalid("--png expects a path".to_string()))?;
                png = Some(PathBuf::from(path));
            }
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| SceneError::Invalid("--seed expects a number".to_string()))?;
                options.seed = value
                    .parse()
                    .map_err(|_| SceneError::Invalid(format!("bad seed: {}", value)))?;
            }
            other if scene.is_none() && !other.starts_with("--") => {
                scene = Some(PathBuf::from(other));
            }
            other => {
                return Err(SceneError::Invalid(format!(
                    "unexpected argument: {}\n{}",
                    other, USAGE
                )));
            }
        }
    }

    let scene = scene.ok_or_else(|| SceneError::Invalid(USAGE.to_string()))?;
    Ok(CliArgs {
        scene,
        options,
        png,
    })
}

fn run() -> Result<(), SceneError> {
    let args = parse_args()?;
    let (scene, camera, config) = io::load_renderer(&args.scene, &args.options)?;
    log::info!(
        "{}: {}x{}, {} shapes, {} lights, mode {:?}, bvh={}, aa={}",
        args.scene.display(),
        camera.width,
        camera.height,
        scene.primitives.len(),
        scene.lights.len(),
        config.mode,
        config.use_bvh,
        config.use_aa,
    );

    let start = Instant::now();
    let renderer = Renderer::new(&scene, &camera, config);
    let pixels = renderer.render();
    log::info!("render finished in {:?}", start.elapsed());

    let out = io::write_ppm(&pixels, camera.width, camera.height, &args.scene)?;
    log::info!("image written to {}", out.display());

    if let Some(png_path) = args.png {
        let img = image::RgbImage::from_raw(camera.width, camera.height, pixels)
            .ok_or_else(|| SceneError::Invalid("pixel buffer does not match image size".to_string()))?;
        img.save(&png_path)
            .map_err(|e| SceneError::Invalid(format!("failed to write {}: {}", png_path.display(), e)))?;
        log::info!("png written to {}", png_path.display());
    }

    Ok(())
}
