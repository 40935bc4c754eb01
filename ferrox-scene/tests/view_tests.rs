//! Per-camera frustum culling (§8 S2).

use ferrox_scene::components::Camera;
use ferrox_scene::{Scene, SceneView};
use glam::Vec3;

#[test]
fn line_of_cubes_is_partially_culled() {
    let jobs = ferrox_core::JobSystem::new(Some(2));
    let mut scene = Scene::new();
    for i in 0..100 {
        let e = scene.create_object_with_cube_mesh(Vec3::new(i as f32, 0.0, 0.0));
        let _ = e;
    }
    scene.update(0.0, &jobs);

    let mut camera = Camera::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::Y);
    camera.fov_degrees = 60.0;
    camera.aspect = 1.0;
    camera.recompute();

    let mut view = SceneView::new();
    view.build(&scene, &camera);
    assert!(view.object_count() < 100);
}
