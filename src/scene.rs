use std::sync::OnceLock;

use crate::bvh::Bvh;
use crate::geometry::Vec3f;
use crate::lights::Light;
use crate::shapes::Primitive;

/// Everything the shaders walk: background, emitters, primitives and the
/// acceleration tree. Immutable once rendering starts; the BVH is built on
/// first access and cached.
#[derive(Debug)]
pub struct Scene {
    pub background: Vec3f,
    pub lights: Vec<Light>,
    pub primitives: Vec<Primitive>,
    bvh: OnceLock<Option<Bvh>>,
}

impl Scene {
    pub fn new(background: Vec3f, lights: Vec<Light>, primitives: Vec<Primitive>) -> Scene {
        Scene {
            background,
            lights,
            primitives,
            bvh: OnceLock::new(),
        }
    }

    /// The cached tree, building it on the first call. The render driver
    /// invokes this once before dispatching parallel pixel work. None for an
    /// empty scene.
    pub fn bvh(&self, seed: u64) -> Option<&Bvh> {
        self.bvh
            .get_or_init(|| Bvh::build(&self.primitives, seed))
            .as_ref()
    }
}
