//! `Scene::update`'s hierarchy and idempotency guarantees (§8 S1, S3).

use ferrox_core::JobSystem;
use ferrox_scene::Scene;
use glam::Vec3;

fn jobs() -> JobSystem {
    JobSystem::new(Some(2))
}

#[test]
fn root_transform_decomposes_to_local_srt() {
    let mut scene = Scene::new();
    let e = scene.create_named_transform("root");
    scene.transforms.get_mut(e).unwrap().set_translation(Vec3::new(1.0, 2.0, 3.0));
    scene.update(0.0, &jobs());
    let world = scene.transforms.get(e).unwrap().world;
    let (_, _, translation) = world.to_scale_rotation_translation();
    assert!((translation - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
}

#[test]
fn hierarchy_composes_parent_and_child_world() {
    let mut scene = Scene::new();
    let parent = scene.create_named_transform("parent");
    let child = scene.create_named_transform("child");
    scene.transforms.get_mut(parent).unwrap().set_translation(Vec3::new(10.0, 0.0, 0.0));
    scene.transforms.get_mut(child).unwrap().set_translation(Vec3::new(0.0, 5.0, 0.0));
    scene.attach(child, parent).unwrap();

    scene.update(0.0, &jobs());

    let world = scene.transforms.get(child).unwrap().world;
    let (_, _, translation) = world.to_scale_rotation_translation();
    assert!((translation - Vec3::new(10.0, 5.0, 0.0)).length() < 1e-5);
}

#[test]
fn two_updates_at_dt_zero_are_idempotent() {
    let mut scene = Scene::new();
    let e = scene.create_object_with_cube_mesh(Vec3::new(1.0, 0.0, 0.0));
    let j = jobs();
    scene.update(0.0, &j);
    let first = scene.transforms.get(e).unwrap().world;
    scene.update(0.0, &j);
    let second = scene.transforms.get(e).unwrap().world;
    assert_eq!(first, second);
}
