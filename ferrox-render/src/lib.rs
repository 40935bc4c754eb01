//! Frustum-culled scene renderer (C10, §4.10): opaque draws, sky, debug overlays, and an
//! outline postprocess, driven by the scene update graph's (C8) visibility results.
//!
//! Control flow per frame, matching the donor's `Device::beginCommandList` → `drawScene` →
//! `drawSky` → `drawDebug` → `submit` loop: call [`Renderer::begin_frame`], then
//! [`Renderer::update_per_frame`], then inside one render pass call [`Renderer::draw_scene`],
//! [`Renderer::draw_sky`] and [`Renderer::draw_debug_scene`] as needed, and finally
//! [`Renderer::postprocess_outline`] against the resolved color target in a second pass.

pub mod cb_ring;
pub mod constants;
pub mod debug;
pub mod debug_geometry;
pub mod draw;
pub mod frame;
pub mod mesh_cache;
pub mod outline;
pub mod pipelines;
pub mod sky;

use ferrox_rhi::device::Device;
use ferrox_rhi::{RhiError, BUFFER_COUNT};
use ferrox_scene::components::Camera;
use ferrox_scene::{Scene, SceneView};
use glam::Mat4;

use cb_ring::DynamicCbRing;
use constants::{CameraConstants, FrameConstants};
use debug_geometry::{UnitIconQuad, UnitWireCube};
use mesh_cache::MeshGpuCache;
use pipelines::{PipelineTable, RendererShaders, SamplerTable};

/// Element counts for the per-frame dynamic constant-buffer rings. `Frame`/`Camera` are written
/// once per frame; `Misc`/`Material` are written once per object and once per subset,
/// respectively, so they need room for many draws' worth per frame before the ring wraps
/// (§4.10, [`cb_ring`]).
const MISC_CB_SLOTS: u64 = 4096;
const MATERIAL_CB_SLOTS: u64 = 4096;

/// Owns the process-wide pipeline/sampler tables, the per-mesh GPU upload cache, the shared
/// debug-draw geometry, and the dynamic constant-buffer rings backing every CBV slot this
/// crate's passes bind (§4.10).
pub struct Renderer {
    pipelines: PipelineTable,
    samplers: SamplerTable,
    mesh_cache: MeshGpuCache,
    wire_cube: UnitWireCube,
    icon_quad: UnitIconQuad,

    frame_cb: DynamicCbRing,
    camera_cb: DynamicCbRing,
    misc_cb: DynamicCbRing,
    material_cb: DynamicCbRing,

    frame_cb_offset: u64,
    camera_cb_offset: u64,
    active_camera_view_proj: Mat4,
    active_camera_inv_view: Mat4,
}

impl Renderer {
    pub fn new(device: &Device, shaders: &RendererShaders) -> Result<Self, RhiError> {
        let pipelines = PipelineTable::new(device, shaders)?;
        let samplers = SamplerTable::new(device)?;
        let wire_cube = UnitWireCube::new(device)?;
        let icon_quad = UnitIconQuad::new(device)?;

        let frame_cb = DynamicCbRing::new(device, std::mem::size_of::<FrameConstants>() as u64, 1, "frame_cb")?;
        let camera_cb = DynamicCbRing::new(device, std::mem::size_of::<CameraConstants>() as u64, 1, "camera_cb")?;
        let misc_cb = DynamicCbRing::new(device, std::mem::size_of::<constants::MiscConstants>() as u64, MISC_CB_SLOTS, "misc_cb")?;
        let material_cb =
            DynamicCbRing::new(device, std::mem::size_of::<constants::MaterialConstants>() as u64, MATERIAL_CB_SLOTS, "material_cb")?;

        Ok(Self {
            pipelines,
            samplers,
            mesh_cache: MeshGpuCache::new(),
            wire_cube,
            icon_quad,
            frame_cb,
            camera_cb,
            misc_cb,
            material_cb,
            frame_cb_offset: 0,
            camera_cb_offset: 0,
            active_camera_view_proj: Mat4::IDENTITY,
            active_camera_inv_view: Mat4::IDENTITY,
        })
    }

    fn frame_slot(&self, device: &Device) -> usize {
        (device.frame_count() % BUFFER_COUNT as u64) as usize
    }

    /// Resets every constant-buffer ring's write cursor for the frame about to be recorded.
    /// Call once per frame, before [`Renderer::update_per_frame`].
    pub fn begin_frame(&mut self) {
        self.frame_cb.begin_frame();
        self.camera_cb.begin_frame();
        self.misc_cb.begin_frame();
        self.material_cb.begin_frame();
    }

    /// `updatePerFrameData(view, time, &frame)` (§4.10): writes the Frame and Camera constant
    /// buffers for this frame and records the camera's view-projection/inverse-view for the
    /// debug and draw passes' per-object Misc CB writes.
    pub fn update_per_frame(&mut self, device: &Device, scene: &Scene, view: &SceneView, camera: &Camera, time: f32) {
        let slot = self.frame_slot(device);

        let frame_constants = frame::update_per_frame_data(view, scene, time);
        self.frame_cb_offset = self.frame_cb.write(slot, bytemuck::bytes_of(&frame_constants));

        let camera_constants = frame::camera_constants(camera);
        self.camera_cb_offset = self.camera_cb.write(slot, bytemuck::bytes_of(&camera_constants));

        self.active_camera_view_proj = camera.view_projection;
        self.active_camera_inv_view = camera.inv_view;
    }

    /// Drops every cached dynamic `VkPipeline`, forcing the next `validatePSO` call on each
    /// pipeline to rebuild against freshly reloaded shader modules (§4.10).
    pub fn invalidate_pipelines(&self) {
        self.pipelines.invalidate_all();
    }

    /// Evicts a mesh's uploaded GPU buffers, forcing a re-upload the next time it is drawn.
    /// Callers use this after editing a mesh's CPU-side geometry in place.
    pub fn invalidate_mesh(&mut self, mesh_entity: ferrox_scene::Entity) {
        self.mesh_cache.invalidate(mesh_entity);
    }
}
