//! Owns every component manager and the per-scene culling AABB streams (§3).

use glam::Vec3;

use crate::aabb::AxisAlignedBox;
use crate::component_store::ComponentManager;
use crate::components::{
    Animation, Camera, Group, Hierarchy, Light, Material, Mesh, Name, Object, Transform, Weather,
};
use crate::entity::{Entity, EntityAllocator};
use crate::error::SceneError;

#[derive(Default)]
pub struct Scene {
    pub allocator: EntityAllocator,

    pub names: ComponentManager<Name>,
    pub transforms: ComponentManager<Transform>,
    pub groups: ComponentManager<Group>,
    pub hierarchies: ComponentManager<Hierarchy>,
    pub materials: ComponentManager<Material>,
    pub meshes: ComponentManager<Mesh>,
    pub objects: ComponentManager<Object>,
    pub lights: ComponentManager<Light>,
    pub cameras: ComponentManager<Camera>,
    pub animations: ComponentManager<Animation>,
    pub weathers: ComponentManager<Weather>,

    pub active_weather: Weather,

    /// Parallel to `objects`/`lights`; rebuilt each frame by the update graph (§3, §4.8).
    pub aabb_objects: Vec<AxisAlignedBox>,
    pub aabb_lights: Vec<AxisAlignedBox>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&mut self) -> Entity {
        self.allocator.allocate()
    }

    /// Creates an entity with a name and an identity transform — the common factory shape
    /// named in §3 ("scene factory methods that also create a matching name/transform").
    pub fn create_named_transform(&mut self, name: impl Into<String>) -> Entity {
        let entity = self.create_entity();
        self.names.create(entity, Name(name.into()));
        self.transforms.create(entity, Transform::identity());
        entity
    }

    /// Attaches `child` under `parent` in the hierarchy, rejecting the call if it would
    /// introduce a cycle (§3, §9).
    pub fn attach(&mut self, child: Entity, parent: Entity) -> Result<(), SceneError> {
        let mut walker = parent;
        loop {
            if walker == child {
                return Err(SceneError::WouldCreateCycle { child, parent });
            }
            match self.hierarchies.get(walker) {
                Some(h) if h.parent.is_valid() => walker = h.parent,
                _ => break,
            }
        }
        self.hierarchies.create(child, Hierarchy::new(parent));
        if let Some(t) = self.transforms.get_mut(child) {
            t.dirty = true;
        }
        Ok(())
    }

    /// Detaches `child` from its parent, leaving `world` as computed on the last update (§8
    /// property 10: attach-then-detach must not disturb `world`).
    pub fn detach(&mut self, child: Entity) {
        self.hierarchies.remove(child);
    }

    pub fn spawn_material(&mut self, material: Material) -> Entity {
        let entity = self.create_entity();
        self.materials.create(entity, material);
        entity
    }

    pub fn spawn_mesh(&mut self, mesh: Mesh) -> Entity {
        let entity = self.create_entity();
        self.meshes.create(entity, mesh);
        entity
    }

    /// Creates a renderable object + unit-cube mesh + default material at `position`, matching
    /// the cube/light/camera fixture used by the end-to-end scenarios (§8 S1, S2).
    pub fn create_object_with_cube_mesh(&mut self, position: Vec3) -> Entity {
        let material = self.spawn_material(Material::default());
        let mesh = self.spawn_mesh(Mesh::unit_cube(material));
        let entity = self.create_named_transform("cube");
        if let Some(t) = self.transforms.get_mut(entity) {
            t.set_translation(position);
        }
        self.objects.create(entity, Object::new(mesh));
        entity
    }

    pub fn spawn_light(&mut self, light: Light) -> Entity {
        let entity = self.create_entity();
        self.lights.create(entity, light);
        entity
    }

    pub fn spawn_camera(&mut self, camera: Camera) -> Entity {
        let entity = self.create_entity();
        self.cameras.create(entity, camera);
        entity
    }

    /// Removes only the components directly on `entity` (§3 lifecycle: shallow removal).
    pub fn remove_shallow(&mut self, entity: Entity) {
        self.names.remove(entity);
        self.transforms.remove(entity);
        self.groups.remove(entity);
        self.hierarchies.remove(entity);
        self.materials.remove(entity);
        self.meshes.remove(entity);
        self.objects.remove(entity);
        self.lights.remove(entity);
        self.cameras.remove(entity);
        self.animations.remove(entity);
    }

    /// Removes `entity` and every entity whose hierarchy chain leads back to it (§3 lifecycle:
    /// recursive removal).
    pub fn remove_recursive(&mut self, entity: Entity) {
        let children: Vec<Entity> = self
            .hierarchies
            .iter()
            .filter(|(_, h)| h.parent == entity)
            .map(|(e, _)| e)
            .collect();
        for child in children {
            self.remove_recursive(child);
        }
        self.remove_shallow(entity);
    }

    /// Recursive removal that additionally frees mesh/material entities that become
    /// unreferenced as a result (§3 lifecycle: recursive-with-linked).
    pub fn remove_recursive_with_linked(&mut self, entity: Entity) {
        self.remove_recursive(entity);
        self.sweep_unreferenced_mesh_material();
    }

    fn sweep_unreferenced_mesh_material(&mut self) {
        let mut used_meshes = std::collections::HashSet::new();
        let mut used_materials = std::collections::HashSet::new();
        for (_, object) in self.objects.iter() {
            used_meshes.insert(object.mesh);
            if let Some(mesh) = self.meshes.get(object.mesh) {
                for subset in &mesh.subsets {
                    used_materials.insert(subset.material);
                }
            }
        }
        let dead_meshes: Vec<Entity> = self
            .meshes
            .entities()
            .iter()
            .copied()
            .filter(|e| !used_meshes.contains(e))
            .collect();
        for e in dead_meshes {
            self.meshes.remove(e);
        }
        let dead_materials: Vec<Entity> = self
            .materials
            .entities()
            .iter()
            .copied()
            .filter(|e| !used_materials.contains(e))
            .collect();
        for e in dead_materials {
            self.materials.remove(e);
        }
    }

    /// Appends `other`'s entities/components into `self`, remapping every entity ID through a
    /// freshly allocated block so the two scenes' IDs never collide (§3 lifecycle: merge).
    pub fn merge(&mut self, other: Scene) {
        let mut remap_table = std::collections::HashMap::new();
        let remap = |e: Entity, table: &mut std::collections::HashMap<Entity, Entity>, alloc: &EntityAllocator| -> Entity {
            if !e.is_valid() {
                return Entity::INVALID;
            }
            *table.entry(e).or_insert_with(|| alloc.allocate())
        };

        // Pre-seed the remap for every entity the other scene's managers reference, so that
        // foreign-key fields (Hierarchy.parent, Object.mesh, MeshSubset.material) resolve to
        // the same destination entity as the owning component.
        for e in other.names.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.transforms.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.meshes.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.materials.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.objects.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.lights.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.cameras.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.hierarchies.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }
        for e in other.weathers.entities() {
            remap(*e, &mut remap_table, &self.allocator);
        }

        let rename = move |e: Entity| {
            if !e.is_valid() {
                return Entity::INVALID;
            }
            *remap_table.get(&e).unwrap_or(&e)
        };

        let mut other = other;
        // Foreign keys must be rewritten before the owning manager's own keys get merged away.
        for (_, mesh) in other.meshes.iter_mut() {
            for subset in &mut mesh.subsets {
                subset.material = rename(subset.material);
            }
        }
        for (_, object) in other.objects.iter_mut() {
            object.mesh = rename(object.mesh);
        }
        for (_, hierarchy) in other.hierarchies.iter_mut() {
            hierarchy.parent = rename(hierarchy.parent);
        }

        self.names.merge(other.names, &rename);
        self.transforms.merge(other.transforms, &rename);
        self.groups.merge(other.groups, &rename);
        self.hierarchies.merge(other.hierarchies, &rename);
        self.materials.merge(other.materials, &rename);
        self.meshes.merge(other.meshes, &rename);
        self.objects.merge(other.objects, &rename);
        self.lights.merge(other.lights, &rename);
        self.cameras.merge(other.cameras, &rename);
        self.animations.merge(other.animations, &rename);
        self.weathers.merge(other.weathers, &rename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_rejects_cycle() {
        let mut scene = Scene::new();
        let a = scene.create_named_transform("a");
        let b = scene.create_named_transform("b");
        scene.attach(b, a).unwrap();
        assert!(scene.attach(a, b).is_err());
    }

    #[test]
    fn remove_recursive_cascades_to_children() {
        let mut scene = Scene::new();
        let parent = scene.create_named_transform("parent");
        let child = scene.create_named_transform("child");
        scene.attach(child, parent).unwrap();
        scene.remove_recursive(parent);
        assert!(scene.transforms.get(parent).is_none());
        assert!(scene.transforms.get(child).is_none());
    }

    #[test]
    fn merge_rewrites_object_mesh_foreign_key() {
        let mut src = Scene::new();
        let object = src.create_object_with_cube_mesh(Vec3::ZERO);
        let mesh_entity = src.objects.get(object).unwrap().mesh;
        assert!(src.meshes.get(mesh_entity).is_some());

        let mut dst = Scene::new();
        // Force dst's allocator to already be ahead so remapped IDs provably differ from src's.
        for _ in 0..10 {
            dst.create_entity();
        }
        dst.merge(src);

        assert_eq!(dst.objects.size(), 1);
        let (_, merged_object) = dst.objects.iter().next().unwrap();
        assert!(dst.meshes.get(merged_object.mesh).is_some());
    }

    #[test]
    fn merge_carries_over_weather_component() {
        let mut src = Scene::new();
        let e = src.create_entity();
        src.weathers.create(e, Weather::default());

        let mut dst = Scene::new();
        dst.merge(src);

        assert_eq!(dst.weathers.size(), 1);
    }
}
