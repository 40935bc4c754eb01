//! Headless run of the scene update graph and frame constants (C7/C8/C9/C10) against the
//! fixture from spec scenario S1/S2: one directional light, a line of cubes, frustum culling.
//! No window, no GPU device — only the parts of the engine that run on the CPU side.

use ferrox_core::JobSystem;
use ferrox_render::frame::update_per_frame_data;
use ferrox_scene::components::{Camera, Light};
use ferrox_scene::{Scene, SceneView};
use glam::Vec3;

fn main() {
    env_logger::init();

    let jobs = JobSystem::new(None);
    let mut scene = Scene::new();

    for i in 0..100 {
        scene.create_object_with_cube_mesh(Vec3::new(i as f32, 0.0, 0.0));
    }
    scene.spawn_light(Light::directional(Vec3::ONE, 1.0));

    let mut camera = Camera::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::Y);
    camera.fov_degrees = 60.0;
    camera.aspect = 16.0 / 9.0;

    scene.update(0.0, &jobs);
    camera.recompute();

    let mut view = SceneView::new();
    view.build(&scene, &camera);

    let frame = update_per_frame_data(&view, &scene, 0.0);

    println!("objects in scene:   {}", scene.objects.size());
    println!("objects visible:    {}", view.object_count());
    println!("lights visible:     {}", view.light_count());
    println!("frame.num_lights:   {}", frame.num_lights);
    println!("frame.point_lights_offset: {}", frame.point_lights_offset);
    println!("frame.most_important_light_index: {}", frame.most_important_light_index);
    println!("job system workers: {}", jobs.worker_count());
}
