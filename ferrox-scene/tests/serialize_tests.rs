//! Scene (de)serialization round trips (§6, §8 property 9).

use ferrox_scene::components::{Light, Material};
use ferrox_scene::serialize::{deserialize_scene, serialize_scene};
use ferrox_scene::Scene;
use glam::Vec3;

#[test]
fn round_trip_preserves_light_count_transforms_and_mesh_indices() {
    let mut scene = Scene::new();
    let cube = scene.create_object_with_cube_mesh(Vec3::new(1.0, 2.0, 3.0));
    let light = scene.spawn_light(Light::directional(Vec3::ONE, 1.0));
    let _ = scene.spawn_material(Material::default());
    let _ = light;

    let bytes = serialize_scene(&scene);
    let restored = deserialize_scene(&bytes).expect("round trip must decode");

    assert_eq!(restored.lights.size(), scene.lights.size());
    assert_eq!(restored.transforms.size(), scene.transforms.size());
    assert_eq!(restored.materials.size(), scene.materials.size());
    assert_eq!(restored.meshes.size(), scene.meshes.size());

    for (e, original) in scene.transforms.iter() {
        let restored_t = restored.transforms.get(e).expect("entity id is stable across round trip");
        assert!((restored_t.local_translation - original.local_translation).length() < 1e-6);
    }

    let mesh_entity = scene.objects.get(cube).unwrap().mesh;
    let original_mesh = scene.meshes.get(mesh_entity).expect("cube mesh exists in source scene");
    let restored_mesh = restored.meshes.get(mesh_entity).expect("mesh entity id is stable across round trip");
    assert_eq!(restored_mesh.indices, original_mesh.indices, "mesh indices must round-trip exactly");
    assert_eq!(restored_mesh.positions.len(), original_mesh.positions.len());
}

#[test]
fn round_trip_preserves_weather_component() {
    use ferrox_scene::components::Weather;

    let mut scene = Scene::new();
    let e = scene.create_entity();
    scene.weathers.create(e, Weather::default());

    let bytes = serialize_scene(&scene);
    let restored = deserialize_scene(&bytes).expect("round trip must decode");

    assert_eq!(restored.weathers.size(), 1);
}
