//! `std140` constant-buffer layouts shared with shaders (§6). Every struct here is the Rust
//! mirror of a block in the donor's `shader_interop.h`; field order and padding are pinned to
//! that layout, not chosen for Rust ergonomics. `mat4` fields are stored row-major on the CPU
//! (matching the rest of this crate's math) and transposed on write so the GPU receives them
//! column-major.

use ferrox_scene::components::LightType;
use glam::{Mat4, Vec3, Vec4};

/// `LightSource`, 64 bytes (§6 "Light-source wire format").
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LightSource {
    pub position: [f32; 4],
    pub direction: [f32; 4],
    pub color: [f32; 4],
    pub kind: i32,
    pub energy: f32,
    pub range: f32,
    pub pad: f32,
}

impl Default for LightSource {
    fn default() -> Self {
        Self { position: [0.0; 4], direction: [0.0; 4], color: [0.0; 4], kind: 0, energy: 0.0, range: 0.0, pad: 0.0 }
    }
}

pub fn light_wire(kind: LightType, position: Vec3, direction: Vec3, color: Vec3, energy: f32, range: f32) -> LightSource {
    LightSource {
        position: position.extend(1.0).to_array(),
        direction: direction.extend(0.0).to_array(),
        color: color.extend(1.0).to_array(),
        kind: match kind {
            LightType::Directional => 0,
            LightType::Point => 1,
        },
        energy,
        range,
        pad: 0.0,
    }
}

/// `FrameConstants`, CBV slot 0 (§4.10, §6).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FrameConstants {
    pub horizon: [f32; 3],
    pub time: f32,
    pub zenith: [f32; 3],
    pub gamma: f32,
    /// `(start, end, height, 1/(end - start))`.
    pub fog: [f32; 4],
    pub cloudiness: f32,
    pub cloud_turbulence: f32,
    pub cloud_height: f32,
    pub wind_speed: f32,
    pub num_lights: i32,
    pub point_lights_offset: i32,
    pub most_important_light_index: i32,
    pub draw_sun: i32,
    pub lights: [LightSource; ferrox_rhi::SHADER_MAX_LIGHTSOURCES],
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self {
            horizon: [0.0; 3],
            time: 0.0,
            zenith: [0.0; 3],
            gamma: 2.2,
            fog: [0.0; 4],
            cloudiness: 0.0,
            cloud_turbulence: 0.0,
            cloud_height: 0.0,
            wind_speed: 0.0,
            num_lights: 0,
            point_lights_offset: 0,
            most_important_light_index: -1,
            draw_sun: 0,
            lights: [LightSource::default(); ferrox_rhi::SHADER_MAX_LIGHTSOURCES],
        }
    }
}

/// `CameraConstants`, CBV slot 2 (§4.10, §6).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CameraConstants {
    pub proj: [f32; 16],
    pub view: [f32; 16],
    pub view_proj: [f32; 16],
    pub inv_proj: [f32; 16],
    pub inv_view: [f32; 16],
    pub inv_view_proj: [f32; 16],
    pub position: [f32; 4],
}

/// `MiscCB`, CBV slot 3 (§4.10, §6).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct MiscConstants {
    pub model: [f32; 16],
    pub model_view_proj: [f32; 16],
}

/// `MaterialCB`, CBV slot 4 (§4.10, §6).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct MaterialConstants {
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub pad: [f32; 2],
}

/// `ImageConstants`, CBV slot 5 — carried over from the donor header for fullscreen-image
/// passes (sky, outline input) even though spec.md's §4.10 only names the outline push
/// constant (§6: "both coexist, matching the donor header").
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ImageConstants {
    pub flags: i32,
    pub pad: [f32; 3],
    pub corners: [[f32; 4]; 4],
}

/// Outline push constants: two `vec4`s — `(thickness, threshold, time, _)` and `color` (§4.10).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct OutlinePushConstants {
    pub params: [f32; 4],
    pub color: [f32; 4],
}

/// Transposes `m` before writing, so a CPU-side row-major matrix lands column-major for the
/// shader (§6 shader-interop convention).
pub fn write_mat4(m: Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

pub fn write_vec3_pad(v: Vec3) -> [f32; 3] {
    v.to_array()
}

pub fn write_vec4(v: Vec4) -> [f32; 4] {
    v.to_array()
}
