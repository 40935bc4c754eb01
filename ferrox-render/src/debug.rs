//! `drawDebugScene` (§4.10): wire-cube AABB overlays for visible objects and point lights, plus
//! billboarded icon sprites at every visible light's position.

use ferrox_rhi::device::{CommandList, Device};
use ferrox_rhi::render_pass::RenderPass;
use ferrox_rhi::types::CBV_SLOT_MISC;
use ferrox_rhi::RhiError;
use ferrox_scene::components::LightType;
use ferrox_scene::Scene;
use ferrox_scene::SceneView;
use glam::{Mat3, Mat4, Vec3};

use crate::constants::{write_mat4, MiscConstants};
use crate::Renderer;

const LIGHT_ICON_SCALE: f32 = 0.25;

impl Renderer {
    /// `drawDebugScene(view, cmd)` (§4.10): (a) wire-cube AABBs around every visible object,
    /// (b) billboarded sprite icons at light positions, (c) wire-cubes for point-light AABBs.
    pub fn draw_debug_scene(
        &mut self,
        device: &Device,
        cmd: &mut CommandList,
        render_pass: &RenderPass,
        scene: &Scene,
        view: &SceneView,
    ) -> Result<(), RhiError> {
        let slot = self.frame_slot(device);

        for &object_index in &view.object_indexes {
            let aabb = scene.aabb_objects[object_index];
            if !aabb.is_valid() {
                continue;
            }
            let model = Mat4::from_scale_rotation_translation(aabb.half_extent() * 2.0, glam::Quat::IDENTITY, aabb.center());
            self.draw_wire_cube(device, cmd, render_pass, slot, model)?;
        }

        for &light_index in &view.light_indexes {
            let light = scene.lights.component_at(light_index);
            let model = billboard_model(self.active_camera_inv_view, light.world_position, LIGHT_ICON_SCALE);
            self.draw_icon_quad(device, cmd, render_pass, slot, model)?;

            if light.kind == LightType::Point {
                let aabb = scene.aabb_lights[light_index];
                if aabb.is_valid() {
                    let model = Mat4::from_scale_rotation_translation(aabb.half_extent() * 2.0, glam::Quat::IDENTITY, aabb.center());
                    self.draw_wire_cube(device, cmd, render_pass, slot, model)?;
                }
            }
        }
        Ok(())
    }

    fn draw_wire_cube(
        &mut self,
        device: &Device,
        cmd: &mut CommandList,
        render_pass: &RenderPass,
        slot: usize,
        model: Mat4,
    ) -> Result<(), RhiError> {
        self.write_debug_misc_cb(cmd, slot, model);
        let pso = &self.pipelines.debug_wire;
        let pipeline_vk = pso.validate(render_pass, &cmd.vertex_strides)?;
        cmd.binder.flush(&device.device, cmd.raw, pso, pipeline_vk)?;
        cmd.set_vertex_stride(0, 12);
        unsafe {
            device.device.cmd_bind_vertex_buffers(cmd.raw, 0, &[self.wire_cube.vertex_buffer.raw], &[0]);
            device.device.cmd_bind_index_buffer(cmd.raw, self.wire_cube.index_buffer.raw, 0, ash::vk::IndexType::UINT32);
            device.device.cmd_draw_indexed(cmd.raw, self.wire_cube.index_count, 1, 0, 0, 0);
        }
        Ok(())
    }

    fn draw_icon_quad(
        &mut self,
        device: &Device,
        cmd: &mut CommandList,
        render_pass: &RenderPass,
        slot: usize,
        model: Mat4,
    ) -> Result<(), RhiError> {
        self.write_debug_misc_cb(cmd, slot, model);
        let pso = &self.pipelines.debug_icon;
        let pipeline_vk = pso.validate(render_pass, &cmd.vertex_strides)?;
        cmd.binder.flush(&device.device, cmd.raw, pso, pipeline_vk)?;
        cmd.set_vertex_stride(0, 12);
        unsafe {
            device.device.cmd_bind_vertex_buffers(cmd.raw, 0, &[self.icon_quad.vertex_buffer.raw], &[0]);
            device.device.cmd_draw(cmd.raw, self.icon_quad.vertex_count, 1, 0, 0);
        }
        Ok(())
    }

    fn write_debug_misc_cb(&mut self, cmd: &mut CommandList, slot: usize, model: Mat4) {
        let misc = MiscConstants { model: write_mat4(model), model_view_proj: write_mat4(self.active_camera_view_proj * model) };
        let offset = self.misc_cb.write(slot, bytemuck::bytes_of(&misc));
        cmd.binder.bind_constant_buffer(CBV_SLOT_MISC as usize, self.misc_cb.buffer(slot), offset);
    }
}

/// A quad rotation that cancels the camera's view rotation, so the icon always faces the
/// camera regardless of the camera's own orientation (§4.10 "billboard via an inverse-rotation
/// matrix"). `camera_inv_view`'s rotation block already carries the camera's world orientation.
fn billboard_model(camera_inv_view: Mat4, position: Vec3, scale: f32) -> Mat4 {
    let rotation = Mat4::from_mat3(Mat3::from_mat4(camera_inv_view));
    Mat4::from_translation(position) * rotation * Mat4::from_scale(Vec3::splat(scale))
}
