//! Core component payloads (§3). Each type here lives inside a
//! [`ComponentManager`](crate::component_store::ComponentManager) keyed by [`Entity`].

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3, Vec4};

use crate::aabb::{AxisAlignedBox, Frustum};
use crate::entity::Entity;

/// UTF-8 display name.
#[derive(Debug, Clone, Default)]
pub struct Name(pub String);

/// Local scale/rotation/translation plus a derived world matrix (§3, §4.8 phase 1-2).
#[derive(Debug, Clone)]
pub struct Transform {
    pub local_scale: Vec3,
    pub local_rotation: Quat,
    pub local_translation: Vec3,
    pub dirty: bool,
    pub world: Mat4,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            local_scale: Vec3::ONE,
            local_rotation: Quat::IDENTITY,
            local_translation: Vec3::ZERO,
            dirty: true,
            world: Mat4::IDENTITY,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.local_scale,
            self.local_rotation,
            self.local_translation,
        )
    }

    pub fn set_translation(&mut self, t: Vec3) {
        self.local_translation = t;
        self.dirty = true;
    }

    pub fn set_rotation(&mut self, r: Quat) {
        self.local_rotation = r;
        self.dirty = true;
    }

    pub fn set_scale(&mut self, s: Vec3) {
        self.local_scale = s;
        self.dirty = true;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Marker for hierarchy roots (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct Group;

/// Parent-entity link walked by the hierarchy pass (§4.8 phase 2).
#[derive(Debug, Clone, Copy)]
pub struct Hierarchy {
    pub parent: Entity,
}

impl Hierarchy {
    pub fn new(parent: Entity) -> Self {
        Self { parent }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialShader {
    Brdf = 0,
    DisneyBrdf = 1,
    Unlit = 2,
    Terrain = 3,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MaterialFlags: u32 {
        const USES_VERTEX_COLORS = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub shader: MaterialShader,
    pub base_color: Vec4,
    pub roughness: f32,
    pub metalness: f32,
    pub flags: MaterialFlags,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            shader: MaterialShader::Brdf,
            base_color: Vec4::ONE,
            roughness: 0.5,
            metalness: 0.0,
            flags: MaterialFlags::empty(),
        }
    }
}

/// A contiguous index range within a mesh's index buffer drawn with one material (§3).
#[derive(Debug, Clone, Copy)]
pub struct MeshSubset {
    pub material: Entity,
    pub index_offset: u32,
    pub index_count: u32,
}

/// CPU-side interleaved position + encoded-normal vertex (§4.8 phase 4).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PackedPositionNormal {
    pub position: [f32; 3],
    pub encoded_normal: u32,
}

/// Packs a unit normal into 32 bits (signed 10:10:10:2 style, two bits unused), matching how
/// the mesh pass feeds the GPU position stream (§4.8 phase 4).
pub fn encode_normal(n: Vec3) -> u32 {
    let qx = ((n.x.clamp(-1.0, 1.0) * 511.0).round() as i32) & 0x3ff;
    let qy = ((n.y.clamp(-1.0, 1.0) * 511.0).round() as i32) & 0x3ff;
    let qz = ((n.z.clamp(-1.0, 1.0) * 511.0).round() as i32) & 0x3ff;
    (qx as u32) | ((qy as u32) << 10) | ((qz as u32) << 20)
}

#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PackedColor(pub [u8; 4]);

/// Host-side mesh geometry plus derived GPU-ready streams (§3, §4.8 phase 4).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u32>,
    pub subsets: Vec<MeshSubset>,

    pub local_aabb: AxisAlignedBox,
    pub gpu_positions: Option<Vec<PackedPositionNormal>>,
    pub gpu_colors: Option<Vec<PackedColor>>,
    pub gpu_indices: Option<Vec<u32>>,
}

impl Mesh {
    /// A 24-vertex, 12-triangle unit cube centered on the origin with one subset spanning the
    /// whole index buffer. Used by tests and demo scenes that need geometry without a mesh
    /// importer.
    pub fn unit_cube(material: Entity) -> Mesh {
        const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]]),
            ([0.0, 0.0, -1.0], [[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]]),
            ([0.0, 1.0, 0.0], [[-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5], [-0.5, 0.5, -0.5]]),
            ([0.0, -1.0, 0.0], [[-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5], [-0.5, -0.5, 0.5]]),
            ([1.0, 0.0, 0.0], [[0.5, -0.5, 0.5], [0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5]]),
            ([-1.0, 0.0, 0.0], [[-0.5, -0.5, -0.5], [-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5]]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in FACES {
            let base = positions.len() as u32;
            for corner in corners {
                positions.push(Vec3::from(corner));
                normals.push(Vec3::from(normal));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let index_count = indices.len() as u32;
        Mesh {
            positions,
            normals,
            colors: Vec::new(),
            indices,
            subsets: vec![MeshSubset { material, index_offset: 0, index_count }],
            local_aabb: AxisAlignedBox::INVALID,
            gpu_positions: None,
            gpu_colors: None,
            gpu_indices: None,
        }
    }

    pub fn has_gpu_buffers(&self) -> bool {
        self.gpu_positions.is_some()
    }

    /// Builds the derived GPU-ready streams and the local AABB (§4.8 phase 4). Idempotent:
    /// callers check `has_gpu_buffers()` first, but calling twice just rebuilds the same data.
    pub fn build_gpu_buffers(&mut self) {
        let mut aabb = AxisAlignedBox::INVALID;
        let mut packed_positions = Vec::with_capacity(self.positions.len());
        for (i, &p) in self.positions.iter().enumerate() {
            aabb.encapsulate(p);
            let normal = self.normals.get(i).copied().unwrap_or(Vec3::Y);
            packed_positions.push(PackedPositionNormal {
                position: p.to_array(),
                encoded_normal: encode_normal(normal),
            });
        }
        self.gpu_positions = Some(packed_positions);

        if !self.colors.is_empty() {
            self.gpu_colors = Some(self.colors.iter().map(|&c| PackedColor(c)).collect());
        }

        self.gpu_indices = Some(self.indices.clone());
        self.local_aabb = aabb;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u32 {
        const RENDERABLE = 1 << 0;
        const CAST_SHADOW = 1 << 1;
    }
}

/// A drawable instance referencing a mesh (§3, §4.8 phase 5).
#[derive(Debug, Clone, Copy)]
pub struct Object {
    pub flags: ObjectFlags,
    pub mesh: Entity,
    pub user_stencil_ref: u8,
    /// Valid only within the frame that produced it (§3).
    pub transform_index: Option<usize>,
}

impl Object {
    pub fn new(mesh: Entity) -> Self {
        Self {
            flags: ObjectFlags::RENDERABLE | ObjectFlags::CAST_SHADOW,
            mesh,
            user_stencil_ref: 0,
            transform_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional = 0,
    Point = 1,
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub kind: LightType,
    pub color: Vec3,
    pub energy: f32,
    pub range: f32,
    pub affects_scene: bool,
    pub cast_shadows: bool,
    /// Derived by the light pass (§4.8 phase 6).
    pub world_position: Vec3,
}

impl Light {
    pub fn directional(color: Vec3, energy: f32) -> Self {
        Self {
            kind: LightType::Directional,
            color,
            energy,
            range: f32::INFINITY,
            affects_scene: true,
            cast_shadows: true,
            world_position: Vec3::ZERO,
        }
    }

    pub fn point(color: Vec3, energy: f32, range: f32) -> Self {
        Self {
            kind: LightType::Point,
            color,
            energy,
            range,
            affects_scene: true,
            cast_shadows: true,
            world_position: Vec3::ZERO,
        }
    }
}

/// A camera's derived matrices and frustum, recomputed each frame (§4.8 phase 7).
#[derive(Debug, Clone)]
pub struct Camera {
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub fov_degrees: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,

    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inv_view: Mat4,
    pub inv_projection: Mat4,
    pub inv_view_projection: Mat4,
    pub frustum: Frustum,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let mut camera = Self {
            aspect: 16.0 / 9.0,
            z_near: 0.1,
            z_far: 1000.0,
            fov_degrees: 60.0,
            position,
            target,
            up,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            inv_projection: Mat4::IDENTITY,
            inv_view_projection: Mat4::IDENTITY,
            frustum: Frustum::from_view_projection(&Mat4::IDENTITY),
        };
        camera.recompute();
        camera
    }

    /// Reversed-Z perspective: near plane maps to depth 1, far to depth 0, consistent with the
    /// `Greater`/`GreaterEqual` depth-compare convention used throughout the RHI layer (§4.8
    /// phase 7, §9 frustum chirality).
    pub fn recompute(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.target, self.up);
        self.projection = reversed_z_perspective(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.z_near,
            self.z_far,
        );
        self.view_projection = self.projection * self.view;
        self.inv_view = self.view.inverse();
        self.inv_projection = self.projection.inverse();
        self.inv_view_projection = self.view_projection.inverse();
        self.frustum = Frustum::from_view_projection(&self.view_projection);
    }
}

/// A standard right-handed perspective matrix with reversed depth (near -> 1, far -> 0).
pub fn reversed_z_perspective(fov_y_radians: f32, aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    Mat4::from_cols(
        Vec4::new(f / aspect, 0.0, 0.0, 0.0),
        Vec4::new(0.0, f, 0.0, 0.0),
        Vec4::new(0.0, 0.0, z_near / (z_far - z_near), -1.0),
        Vec4::new(0.0, 0.0, (z_near * z_far) / (z_far - z_near), 0.0),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Step,
    Linear,
    CubicSpline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPath {
    Translation,
    Rotation,
    Scale,
    Weights,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct AnimationSampler {
    pub mode: InterpolationMode,
    pub keyframe_times: Vec<f32>,
    /// Flattened component data; per-component stride depends on `ChannelPath` (3 for vec3
    /// paths, 4 for quaternion rotation). For `Step`/`Linear` each keyframe contributes one
    /// `stride`-sized block (the value). For `CubicSpline` each keyframe contributes three
    /// `stride`-sized blocks in glTF order: `(in_tangent, value, out_tangent)` (§4.8 phase 3,
    /// confirmed against the glTF animation sampler layout).
    pub keyframe_data: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct AnimationChannel {
    pub target_entity: Entity,
    pub sampler_index: usize,
    pub path: ChannelPath,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnimationFlags: u32 {
        const PLAYING = 1 << 0;
        const LOOPED = 1 << 1;
        const PING_PONG = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub start: f32,
    pub end: f32,
    pub timer: f32,
    pub speed: f32,
    pub blend: f32,
    pub flags: AnimationFlags,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
    /// `-1` once a non-looped, non-ping-pong animation has reached `end` and stopped; direction
    /// of travel otherwise (`+1` or `-1`) used by ping-pong.
    direction: f32,
}

impl Animation {
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start,
            end,
            timer: start,
            speed: 1.0,
            blend: 1.0,
            flags: AnimationFlags::PLAYING | AnimationFlags::LOOPED,
            channels: Vec::new(),
            samplers: Vec::new(),
            direction: 1.0,
        }
    }

    /// Rebuilds an `Animation` from its serialized fields (§6). `direction` is not part of the
    /// wire format since it is always recoverable as `+1` at load time (no in-flight ping-pong
    /// state to preserve across a save/load boundary).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_serialized(
        start: f32,
        end: f32,
        timer: f32,
        speed: f32,
        blend: f32,
        flags: AnimationFlags,
        channels: Vec<AnimationChannel>,
        samplers: Vec<AnimationSampler>,
    ) -> Self {
        Self { start, end, timer, speed, blend, flags, channels, samplers, direction: 1.0 }
    }

    /// Advances `timer` by `dt * speed` and applies loop/ping-pong/stop edge behavior (§4.8
    /// phase 3). Returns whether the animation is still playing after the advance.
    pub fn advance(&mut self, dt: f32) -> bool {
        if !self.flags.contains(AnimationFlags::PLAYING) {
            return false;
        }
        let span = (self.end - self.start).max(1e-6);
        self.timer += dt * self.speed * self.direction;

        if self.direction > 0.0 && self.timer > self.end {
            if self.flags.contains(AnimationFlags::PING_PONG) {
                self.direction = -1.0;
                self.timer = self.end - (self.timer - self.end);
            } else if self.flags.contains(AnimationFlags::LOOPED) {
                self.timer = self.start + (self.timer - self.end) % span;
            } else {
                self.timer = self.end;
                self.flags.remove(AnimationFlags::PLAYING);
            }
        } else if self.direction < 0.0 && self.timer < self.start {
            if self.flags.contains(AnimationFlags::PING_PONG) {
                self.direction = 1.0;
                self.timer = self.start + (self.start - self.timer);
            } else {
                self.timer = self.start;
                self.flags.remove(AnimationFlags::PLAYING);
            }
        }
        self.flags.contains(AnimationFlags::PLAYING)
    }
}

impl AnimationSampler {
    /// Binary-searches the active keyframe segment and interpolates per `mode` (§4.8 phase 3).
    /// `stride` is the component count per keyframe (3 for vec3 paths, 4 for rotation).
    pub fn sample(&self, t: f32, stride: usize) -> Vec<f32> {
        let times = &self.keyframe_times;
        if times.is_empty() {
            return vec![0.0; stride];
        }
        // CubicSpline keyframes carry (in_tangent, value, out_tangent); other modes carry just
        // the value, so the per-keyframe block size differs.
        let keyframe_stride = match self.mode {
            InterpolationMode::CubicSpline => stride * 3,
            InterpolationMode::Step | InterpolationMode::Linear => stride,
        };
        let value_at = |index: usize| -> &[f32] {
            let base = index * keyframe_stride;
            match self.mode {
                InterpolationMode::CubicSpline => &self.keyframe_data[base + stride..base + 2 * stride],
                InterpolationMode::Step | InterpolationMode::Linear => &self.keyframe_data[base..base + stride],
            }
        };

        if t <= times[0] {
            return value_at(0).to_vec();
        }
        let last = times.len() - 1;
        if t >= times[last] {
            return value_at(last).to_vec();
        }

        let segment = match times.binary_search_by(|probe| probe.partial_cmp(&t).unwrap()) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let t0 = times[segment];
        let t1 = times[segment + 1];
        let alpha = ((t - t0) / (t1 - t0).max(1e-9)).clamp(0.0, 1.0);
        let dt = (t1 - t0).max(1e-9);

        match self.mode {
            InterpolationMode::Step => value_at(segment).to_vec(),
            InterpolationMode::Linear => {
                let a = value_at(segment);
                let b = value_at(segment + 1);
                a.iter().zip(b.iter()).map(|(&x, &y)| x + (y - x) * alpha).collect()
            }
            InterpolationMode::CubicSpline => {
                // Hermite basis (glTF animation sampler convention): p(t) = h00*p0 + h10*dt*m0
                // + h01*p1 + h11*dt*m1, where m0 is keyframe0's out-tangent and m1 is
                // keyframe1's in-tangent.
                let h00 = 2.0 * alpha.powi(3) - 3.0 * alpha.powi(2) + 1.0;
                let h10 = alpha.powi(3) - 2.0 * alpha.powi(2) + alpha;
                let h01 = -2.0 * alpha.powi(3) + 3.0 * alpha.powi(2);
                let h11 = alpha.powi(3) - alpha.powi(2);

                let base0 = segment * keyframe_stride;
                let base1 = (segment + 1) * keyframe_stride;
                let p0 = &self.keyframe_data[base0 + stride..base0 + 2 * stride];
                let out_tangent0 = &self.keyframe_data[base0 + 2 * stride..base0 + 3 * stride];
                let p1 = &self.keyframe_data[base1 + stride..base1 + 2 * stride];
                let in_tangent1 = &self.keyframe_data[base1..base1 + stride];

                (0..stride)
                    .map(|i| h00 * p0[i] + h10 * dt * out_tangent0[i] + h01 * p1[i] + h11 * dt * in_tangent1[i])
                    .collect()
            }
        }
    }
}

/// Sky/fog/wind parameters, one active instance per scene (§3, §4.8 phase 8).
#[derive(Debug, Clone)]
pub struct Weather {
    pub horizon_color: Vec3,
    pub zenith_color: Vec3,
    pub fog_start: f32,
    pub fog_end: f32,
    pub fog_height: f32,
    pub draw_sun: bool,
    pub cloudiness: f32,
    pub cloud_turbulence: f32,
    pub cloud_height: f32,
    pub wind_speed: f32,
    pub most_important_light_index: Option<usize>,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            horizon_color: Vec3::new(0.8, 0.85, 0.9),
            zenith_color: Vec3::new(0.2, 0.4, 0.8),
            fog_start: 100.0,
            fog_end: 1000.0,
            fog_height: 0.0,
            draw_sun: true,
            cloudiness: 0.0,
            cloud_turbulence: 0.0,
            cloud_height: 1000.0,
            wind_speed: 0.0,
            most_important_light_index: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_build_gpu_buffers_computes_local_aabb() {
        let mut mesh = Mesh {
            positions: vec![Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)],
            normals: vec![Vec3::Y, Vec3::Y],
            ..Default::default()
        };
        mesh.build_gpu_buffers();
        assert!(mesh.has_gpu_buffers());
        assert_eq!(mesh.local_aabb.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(mesh.local_aabb.max, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn animation_loops_past_end() {
        let mut anim = Animation::new(0.0, 1.0);
        assert!(anim.advance(1.5));
        assert!(anim.timer >= 0.0 && anim.timer < 1.0);
    }

    #[test]
    fn animation_stops_when_not_looped() {
        let mut anim = Animation::new(0.0, 1.0);
        anim.flags.remove(AnimationFlags::LOOPED);
        assert!(!anim.advance(2.0));
        assert_eq!(anim.timer, 1.0);
    }

    #[test]
    fn linear_sampler_interpolates_at_midpoint() {
        let sampler = AnimationSampler {
            mode: InterpolationMode::Linear,
            keyframe_times: vec![0.0, 1.0],
            keyframe_data: vec![0.0, 0.0, 0.0, 10.0, 0.0, 0.0],
        };
        let v = sampler.sample(0.5, 3);
        assert!((v[0] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn cubic_spline_sampler_honors_tangents() {
        // Two flat-valued keyframes (0.0 -> 0.0) but a nonzero out-tangent on the first
        // keyframe: a tangent-less implementation would sample 0.0 at every t, so this proves
        // the tangent terms are actually applied.
        let sampler = AnimationSampler {
            mode: InterpolationMode::CubicSpline,
            keyframe_times: vec![0.0, 1.0],
            // (in_tangent, value, out_tangent) per keyframe, stride 1.
            keyframe_data: vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        };
        let v = sampler.sample(0.5, 1);
        // h10(0.5) * dt * out_tangent0 = 0.125 * 1.0 * 1.0
        assert!((v[0] - 0.125).abs() < 1e-5);
    }

    #[test]
    fn cubic_spline_sampler_clamps_to_endpoint_values() {
        let sampler = AnimationSampler {
            mode: InterpolationMode::CubicSpline,
            keyframe_times: vec![0.0, 1.0],
            keyframe_data: vec![0.0, 2.0, 0.0, 0.0, 5.0, 0.0],
        };
        assert_eq!(sampler.sample(-1.0, 1), vec![2.0]);
        assert_eq!(sampler.sample(2.0, 1), vec![5.0]);
    }
}
