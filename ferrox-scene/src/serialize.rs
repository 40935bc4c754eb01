//! Versioned (v4) little-endian binary scene serialization (§6).
//!
//! Per component manager: `u64 count`, then `count` entity IDs (`u64`), then `count` component
//! records. `transformIndex`, `world`, and GPU buffers are transient and never serialized (§8
//! property 9): a round trip reproduces the source scene's component arrays byte-for-byte
//! modulo those derived fields.

use glam::{Quat, Vec3, Vec4};
use thiserror::Error;

use crate::components::{
    Animation, AnimationChannel, AnimationFlags, AnimationSampler, ChannelPath, Group, Hierarchy,
    InterpolationMode, Light, LightType, Material, MaterialFlags, MaterialShader, Mesh,
    MeshSubset, Name, Object, ObjectFlags, Transform, Weather,
};
use crate::entity::Entity;
use crate::scene::Scene;

pub const SCENE_FORMAT_VERSION: u64 = 4;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("unsupported scene format version {0} (expected {SCENE_FORMAT_VERSION})")]
    UnsupportedVersion(u64),
    #[error("unexpected end of stream while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("invalid enum discriminant {value} while reading {field}")]
    InvalidEnum { field: &'static str, value: u32 },
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn vec3(&mut self, v: Vec3) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    fn vec4(&mut self, v: Vec4) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
        self.f32(v.w);
    }

    fn quat(&mut self, q: Quat) {
        self.vec4(Vec4::new(q.x, q.y, q.z, q.w));
    }

    fn entity(&mut self, e: Entity) {
        self.u64(e.raw());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], SerializeError> {
        if self.cursor + n > self.bytes.len() {
            return Err(SerializeError::UnexpectedEof(what));
        }
        let slice = &self.bytes[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, SerializeError> {
        Ok(self.take(1, "u8")?[0])
    }

    fn bool(&mut self) -> Result<bool, SerializeError> {
        Ok(self.u8()? != 0)
    }

    fn u32(&mut self) -> Result<u32, SerializeError> {
        Ok(u32::from_le_bytes(self.take(4, "u32")?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, SerializeError> {
        Ok(u64::from_le_bytes(self.take(8, "u64")?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32, SerializeError> {
        Ok(f32::from_le_bytes(self.take(4, "f32")?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, SerializeError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len, "string bytes")?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn vec3(&mut self) -> Result<Vec3, SerializeError> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn vec4(&mut self) -> Result<Vec4, SerializeError> {
        Ok(Vec4::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    fn quat(&mut self) -> Result<Quat, SerializeError> {
        let v = self.vec4()?;
        Ok(Quat::from_xyzw(v.x, v.y, v.z, v.w))
    }

    fn entity(&mut self) -> Result<Entity, SerializeError> {
        Ok(Entity::from_raw(self.u64()?))
    }
}

pub fn serialize_scene(scene: &Scene) -> Vec<u8> {
    let mut w = Writer::new();
    w.u64(SCENE_FORMAT_VERSION);

    w.u64(scene.names.size() as u64);
    for (e, name) in scene.names.iter() {
        w.entity(e);
        w.string(&name.0);
    }

    w.u64(scene.transforms.size() as u64);
    for (e, t) in scene.transforms.iter() {
        w.entity(e);
        w.vec3(t.local_scale);
        w.quat(t.local_rotation);
        w.vec3(t.local_translation);
    }

    w.u64(scene.groups.size() as u64);
    for (e, _) in scene.groups.iter() {
        w.entity(e);
    }

    w.u64(scene.hierarchies.size() as u64);
    for (e, h) in scene.hierarchies.iter() {
        w.entity(e);
        w.entity(h.parent);
    }

    w.u64(scene.materials.size() as u64);
    for (e, m) in scene.materials.iter() {
        w.entity(e);
        w.u32(m.shader as u32);
        w.vec4(m.base_color);
        w.f32(m.roughness);
        w.f32(m.metalness);
        w.u32(m.flags.bits());
    }

    w.u64(scene.meshes.size() as u64);
    for (e, mesh) in scene.meshes.iter() {
        w.entity(e);
        w.u64(mesh.positions.len() as u64);
        for p in &mesh.positions {
            w.vec3(*p);
        }
        w.u64(mesh.normals.len() as u64);
        for n in &mesh.normals {
            w.vec3(*n);
        }
        w.u64(mesh.colors.len() as u64);
        for c in &mesh.colors {
            for &channel in c {
                w.u8(channel);
            }
        }
        w.u64(mesh.indices.len() as u64);
        for i in &mesh.indices {
            w.u32(*i);
        }
        w.u64(mesh.subsets.len() as u64);
        for s in &mesh.subsets {
            w.entity(s.material);
            w.u32(s.index_offset);
            w.u32(s.index_count);
        }
    }

    w.u64(scene.objects.size() as u64);
    for (e, o) in scene.objects.iter() {
        w.entity(e);
        w.u32(o.flags.bits());
        w.entity(o.mesh);
        w.u8(o.user_stencil_ref);
    }

    w.u64(scene.lights.size() as u64);
    for (e, light) in scene.lights.iter() {
        w.entity(e);
        w.u32(light.kind as u32);
        w.vec3(light.color);
        w.f32(light.energy);
        w.f32(light.range);
        w.bool(light.affects_scene);
        w.bool(light.cast_shadows);
    }

    w.u64(scene.cameras.size() as u64);
    for (e, cam) in scene.cameras.iter() {
        w.entity(e);
        w.f32(cam.aspect);
        w.f32(cam.z_near);
        w.f32(cam.z_far);
        w.f32(cam.fov_degrees);
        w.vec3(cam.position);
        w.vec3(cam.target);
        w.vec3(cam.up);
    }

    w.u64(scene.animations.size() as u64);
    for (e, anim) in scene.animations.iter() {
        w.entity(e);
        w.f32(anim.start);
        w.f32(anim.end);
        w.f32(anim.timer);
        w.f32(anim.speed);
        w.f32(anim.blend);
        w.u32(anim.flags.bits());
        w.u64(anim.channels.len() as u64);
        for c in &anim.channels {
            w.entity(c.target_entity);
            w.u64(c.sampler_index as u64);
            w.u32(channel_path_tag(c.path));
        }
        w.u64(anim.samplers.len() as u64);
        for s in &anim.samplers {
            w.u32(interpolation_mode_tag(s.mode));
            w.u64(s.keyframe_times.len() as u64);
            for t in &s.keyframe_times {
                w.f32(*t);
            }
            w.u64(s.keyframe_data.len() as u64);
            for d in &s.keyframe_data {
                w.f32(*d);
            }
        }
    }

    w.u64(scene.weathers.size() as u64);
    for (e, weather) in scene.weathers.iter() {
        w.entity(e);
        write_weather(&mut w, weather);
    }

    w.buf
}

pub fn deserialize_scene(bytes: &[u8]) -> Result<Scene, SerializeError> {
    let mut r = Reader::new(bytes);
    let version = r.u64()?;
    if version != SCENE_FORMAT_VERSION {
        return Err(SerializeError::UnsupportedVersion(version));
    }

    let mut scene = Scene::new();
    let mut highest = 0u64;
    let mut bump = |e: Entity, highest: &mut u64| {
        *highest = (*highest).max(e.raw());
    };

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let name = r.string()?;
        scene.names.create(e, Name(name));
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let local_scale = r.vec3()?;
        let local_rotation = r.quat()?;
        let local_translation = r.vec3()?;
        scene.transforms.create(
            e,
            Transform { local_scale, local_rotation, local_translation, dirty: true, world: glam::Mat4::IDENTITY },
        );
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        scene.groups.create(e, Group);
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let parent = r.entity()?;
        bump(parent, &mut highest);
        scene.hierarchies.create(e, Hierarchy::new(parent));
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let shader = material_shader_from_tag(r.u32()?)?;
        let base_color = r.vec4()?;
        let roughness = r.f32()?;
        let metalness = r.f32()?;
        let flags = MaterialFlags::from_bits_truncate(r.u32()?);
        scene.materials.create(e, Material { shader, base_color, roughness, metalness, flags });
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let position_count = r.u64()? as usize;
        let mut positions = Vec::with_capacity(position_count);
        for _ in 0..position_count {
            positions.push(r.vec3()?);
        }
        let normal_count = r.u64()? as usize;
        let mut normals = Vec::with_capacity(normal_count);
        for _ in 0..normal_count {
            normals.push(r.vec3()?);
        }
        let color_count = r.u64()? as usize;
        let mut colors = Vec::with_capacity(color_count);
        for _ in 0..color_count {
            colors.push([r.u8()?, r.u8()?, r.u8()?, r.u8()?]);
        }
        let index_count = r.u64()? as usize;
        let mut indices = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            indices.push(r.u32()?);
        }
        let subset_count = r.u64()? as usize;
        let mut subsets = Vec::with_capacity(subset_count);
        for _ in 0..subset_count {
            let material = r.entity()?;
            bump(material, &mut highest);
            let index_offset = r.u32()?;
            let index_count = r.u32()?;
            subsets.push(MeshSubset { material, index_offset, index_count });
        }
        scene.meshes.create(
            e,
            Mesh {
                positions,
                normals,
                colors,
                indices,
                subsets,
                local_aabb: crate::aabb::AxisAlignedBox::INVALID,
                gpu_positions: None,
                gpu_colors: None,
                gpu_indices: None,
            },
        );
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let flags = ObjectFlags::from_bits_truncate(r.u32()?);
        let mesh = r.entity()?;
        bump(mesh, &mut highest);
        let user_stencil_ref = r.u8()?;
        scene.objects.create(e, Object { flags, mesh, user_stencil_ref, transform_index: None });
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let kind = light_type_from_tag(r.u32()?)?;
        let color = r.vec3()?;
        let energy = r.f32()?;
        let range = r.f32()?;
        let affects_scene = r.bool()?;
        let cast_shadows = r.bool()?;
        scene.lights.create(
            e,
            Light { kind, color, energy, range, affects_scene, cast_shadows, world_position: Vec3::ZERO },
        );
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let aspect = r.f32()?;
        let z_near = r.f32()?;
        let z_far = r.f32()?;
        let fov_degrees = r.f32()?;
        let position = r.vec3()?;
        let target = r.vec3()?;
        let up = r.vec3()?;
        let mut camera = crate::components::Camera::new(position, target, up);
        camera.aspect = aspect;
        camera.z_near = z_near;
        camera.z_far = z_far;
        camera.fov_degrees = fov_degrees;
        camera.recompute();
        scene.cameras.create(e, camera);
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let start = r.f32()?;
        let end = r.f32()?;
        let timer = r.f32()?;
        let speed = r.f32()?;
        let blend = r.f32()?;
        let flags = AnimationFlags::from_bits_truncate(r.u32()?);
        let channel_count = r.u64()? as usize;
        let mut channels = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            let target_entity = r.entity()?;
            bump(target_entity, &mut highest);
            let sampler_index = r.u64()? as usize;
            let path = channel_path_from_tag(r.u32()?)?;
            channels.push(AnimationChannel { target_entity, sampler_index, path });
        }
        let sampler_count = r.u64()? as usize;
        let mut samplers = Vec::with_capacity(sampler_count);
        for _ in 0..sampler_count {
            let mode = interpolation_mode_from_tag(r.u32()?)?;
            let time_count = r.u64()? as usize;
            let mut keyframe_times = Vec::with_capacity(time_count);
            for _ in 0..time_count {
                keyframe_times.push(r.f32()?);
            }
            let data_count = r.u64()? as usize;
            let mut keyframe_data = Vec::with_capacity(data_count);
            for _ in 0..data_count {
                keyframe_data.push(r.f32()?);
            }
            samplers.push(AnimationSampler { mode, keyframe_times, keyframe_data });
        }
        scene.animations.create(
            e,
            Animation::from_serialized(start, end, timer, speed, blend, flags, channels, samplers),
        );
    }

    let count = r.u64()?;
    for _ in 0..count {
        let e = r.entity()?;
        bump(e, &mut highest);
        let weather = read_weather(&mut r)?;
        scene.weathers.create(e, weather);
    }

    scene.allocator.bump_past(Entity::from_raw(highest));
    Ok(scene)
}

fn write_weather(w: &mut Writer, weather: &Weather) {
    w.vec3(weather.horizon_color);
    w.vec3(weather.zenith_color);
    w.f32(weather.fog_start);
    w.f32(weather.fog_end);
    w.f32(weather.fog_height);
    w.bool(weather.draw_sun);
    w.f32(weather.cloudiness);
    w.f32(weather.cloud_turbulence);
    w.f32(weather.cloud_height);
    w.f32(weather.wind_speed);
    w.u32(weather.most_important_light_index.map(|i| i as u32).unwrap_or(u32::MAX));
}

fn read_weather(r: &mut Reader) -> Result<Weather, SerializeError> {
    let horizon_color = r.vec3()?;
    let zenith_color = r.vec3()?;
    let fog_start = r.f32()?;
    let fog_end = r.f32()?;
    let fog_height = r.f32()?;
    let draw_sun = r.bool()?;
    let cloudiness = r.f32()?;
    let cloud_turbulence = r.f32()?;
    let cloud_height = r.f32()?;
    let wind_speed = r.f32()?;
    let raw_index = r.u32()?;
    let most_important_light_index = if raw_index == u32::MAX { None } else { Some(raw_index as usize) };
    Ok(Weather {
        horizon_color,
        zenith_color,
        fog_start,
        fog_end,
        fog_height,
        draw_sun,
        cloudiness,
        cloud_turbulence,
        cloud_height,
        wind_speed,
        most_important_light_index,
    })
}

fn channel_path_tag(p: ChannelPath) -> u32 {
    match p {
        ChannelPath::Translation => 0,
        ChannelPath::Rotation => 1,
        ChannelPath::Scale => 2,
        ChannelPath::Weights => 3,
        ChannelPath::Unknown => 4,
    }
}

fn channel_path_from_tag(v: u32) -> Result<ChannelPath, SerializeError> {
    Ok(match v {
        0 => ChannelPath::Translation,
        1 => ChannelPath::Rotation,
        2 => ChannelPath::Scale,
        3 => ChannelPath::Weights,
        4 => ChannelPath::Unknown,
        _ => return Err(SerializeError::InvalidEnum { field: "ChannelPath", value: v }),
    })
}

fn interpolation_mode_tag(m: InterpolationMode) -> u32 {
    match m {
        InterpolationMode::Step => 0,
        InterpolationMode::Linear => 1,
        InterpolationMode::CubicSpline => 2,
    }
}

fn interpolation_mode_from_tag(v: u32) -> Result<InterpolationMode, SerializeError> {
    Ok(match v {
        0 => InterpolationMode::Step,
        1 => InterpolationMode::Linear,
        2 => InterpolationMode::CubicSpline,
        _ => return Err(SerializeError::InvalidEnum { field: "InterpolationMode", value: v }),
    })
}

fn material_shader_from_tag(v: u32) -> Result<MaterialShader, SerializeError> {
    Ok(match v {
        0 => MaterialShader::Brdf,
        1 => MaterialShader::DisneyBrdf,
        2 => MaterialShader::Unlit,
        3 => MaterialShader::Terrain,
        _ => return Err(SerializeError::InvalidEnum { field: "MaterialShader", value: v }),
    })
}

fn light_type_from_tag(v: u32) -> Result<LightType, SerializeError> {
    Ok(match v {
        0 => LightType::Directional,
        1 => LightType::Point,
        _ => return Err(SerializeError::InvalidEnum { field: "LightType", value: v }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_version() {
        let mut w = Writer::new();
        w.u64(999);
        assert!(matches!(deserialize_scene(&w.buf), Err(SerializeError::UnsupportedVersion(999))));
    }
}
