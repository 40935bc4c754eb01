//! `drawScene` (§4.10): the opaque pass. Binds Frame/Camera once, then per visible object binds
//! its mesh's vertex/index buffers, writes Misc and Material CBs, and draws each subset with
//! the pipeline its material selects.

use ash::vk;
use ferrox_rhi::device::{CommandList, Device};
use ferrox_rhi::render_pass::RenderPass;
use ferrox_rhi::types::{CBV_SLOT_CAMERA, CBV_SLOT_FRAME, CBV_SLOT_MATERIAL, CBV_SLOT_MISC};
use ferrox_rhi::RhiError;
use ferrox_scene::components::MaterialFlags;
use ferrox_scene::{Scene, SceneView};

use crate::constants::{write_mat4, MaterialConstants, MiscConstants};
use crate::Renderer;

impl Renderer {
    /// `drawScene(view, cmd)` (§4.10).
    pub fn draw_scene(
        &mut self,
        device: &Device,
        cmd: &mut CommandList,
        render_pass: &RenderPass,
        scene: &Scene,
        view: &SceneView,
    ) -> Result<(), RhiError> {
        let slot = self.frame_slot(device);
        cmd.binder.bind_constant_buffer(CBV_SLOT_FRAME as usize, self.frame_cb.buffer(slot), self.frame_cb_offset);
        cmd.binder.bind_constant_buffer(CBV_SLOT_CAMERA as usize, self.camera_cb.buffer(slot), self.camera_cb_offset);

        let mut current_stencil_ref: Option<u8> = None;

        for &object_index in &view.object_indexes {
            let object = *scene.objects.component_at(object_index);
            if !object.flags.contains(ferrox_scene::components::ObjectFlags::RENDERABLE) {
                continue;
            }
            let Some(mesh) = scene.meshes.get(object.mesh) else { continue };
            if !mesh.has_gpu_buffers() {
                continue;
            }
            let Some(world) = object
                .transform_index
                .map(|i| *scene.transforms.component_at(i))
                .map(|t| t.world)
            else {
                continue;
            };

            if current_stencil_ref != Some(object.user_stencil_ref) {
                unsafe { device.device.cmd_set_stencil_reference(cmd.raw, vk::StencilFaceFlags::FRONT_AND_BACK, object.user_stencil_ref as u32) };
                current_stencil_ref = Some(object.user_stencil_ref);
            }

            let gpu_mesh = self.mesh_cache.get_or_upload(device, object.mesh, mesh)?;
            let mut buffers = vec![gpu_mesh.position_buffer.raw];
            let mut offsets = vec![0u64];
            cmd.set_vertex_stride(0, std::mem::size_of::<ferrox_scene::components::PackedPositionNormal>() as u32);
            if let Some(color_buffer) = &gpu_mesh.color_buffer {
                buffers.push(color_buffer.raw);
                offsets.push(0);
                cmd.set_vertex_stride(1, 4);
            }
            unsafe {
                device.device.cmd_bind_vertex_buffers(cmd.raw, 0, &buffers, &offsets);
                device.device.cmd_bind_index_buffer(cmd.raw, gpu_mesh.index_buffer.raw, 0, vk::IndexType::UINT32);
            }

            let misc = MiscConstants {
                model: write_mat4(world),
                model_view_proj: write_mat4(self.active_camera_view_proj * world),
            };
            let misc_offset = self.misc_cb.write(slot, bytemuck::bytes_of(&misc));
            cmd.binder.bind_constant_buffer(CBV_SLOT_MISC as usize, self.misc_cb.buffer(slot), misc_offset);

            for subset in &mesh.subsets {
                let Some(material) = scene.materials.get(subset.material) else { continue };
                let material_cb = MaterialConstants {
                    base_color: material.base_color.to_array(),
                    roughness: material.roughness,
                    metalness: material.metalness,
                    pad: [0.0; 2],
                };
                let material_offset = self.material_cb.write(slot, bytemuck::bytes_of(&material_cb));
                cmd.binder.bind_constant_buffer(CBV_SLOT_MATERIAL as usize, self.material_cb.buffer(slot), material_offset);

                let with_vertex_colors = material.flags.contains(MaterialFlags::USES_VERTEX_COLORS) && gpu_mesh.color_buffer.is_some();
                let pso = self.pipelines.opaque(material.shader, with_vertex_colors);
                draw_subset(device, cmd, render_pass, pso, subset)?;
            }
        }
        Ok(())
    }
}

fn draw_subset(
    device: &Device,
    cmd: &mut CommandList,
    render_pass: &RenderPass,
    pso: &ferrox_rhi::PipelineState,
    subset: &ferrox_scene::components::MeshSubset,
) -> Result<(), RhiError> {
    let pipeline_vk = pso.validate(render_pass, &cmd.vertex_strides)?;
    cmd.binder.flush(&device.device, cmd.raw, pso, pipeline_vk)?;
    unsafe {
        device.device.cmd_draw_indexed(cmd.raw, subset.index_count, 1, subset.index_offset, 0, 0);
    }
    Ok(())
}
