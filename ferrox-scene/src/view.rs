//! Per-camera frustum culling (C9, §4.9).

use crate::components::Camera;
use crate::scene::Scene;

/// Visible object/light index lists for one camera, rebuilt each frame by [`SceneView::build`].
#[derive(Debug, Clone, Default)]
pub struct SceneView {
    pub object_indexes: Vec<usize>,
    pub light_indexes: Vec<usize>,
}

impl SceneView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.object_indexes.len()
    }

    pub fn light_count(&self) -> usize {
        self.light_indexes.len()
    }

    pub fn reset(&mut self) {
        self.object_indexes.clear();
        self.light_indexes.clear();
    }

    /// Tests `scene.aabb_objects`/`scene.aabb_lights` against `camera.frustum` in manager
    /// insertion order (§4.9). Directional lights are always admitted.
    pub fn build(&mut self, scene: &Scene, camera: &Camera) {
        self.reset();

        for (index, aabb) in scene.aabb_objects.iter().enumerate() {
            if aabb.intersects_frustum(&camera.frustum) {
                self.object_indexes.push(index);
            }
        }

        for (index, light) in scene.lights.components().iter().enumerate() {
            let visible = match light.kind {
                crate::components::LightType::Directional => true,
                crate::components::LightType::Point => scene.aabb_lights[index]
                    .intersects_frustum(&camera.frustum),
            };
            if visible {
                self.light_indexes.push(index);
            }
        }
    }
}
