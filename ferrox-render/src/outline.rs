//! `postprocessOutline` (§4.10): a fullscreen edge-detection pass reading a previously rendered
//! color target through a point-clamp sampler, parameterized entirely by push constants.

use ash::vk;
use ferrox_rhi::device::{CommandList, Device};
use ferrox_rhi::render_pass::RenderPass;
use ferrox_rhi::resources::texture::Texture;
use ferrox_rhi::types::SRV_SLOT_IMAGE;
use ferrox_rhi::RhiError;
use glam::Vec4;

use crate::constants::OutlinePushConstants;
use crate::Renderer;

const OUTLINE_SAMPLER_SLOT: usize = 0;

impl Renderer {
    /// Binds the outline pso (depth disabled, double-sided), the point-clamp sampler and
    /// `input` at `SRV_SLOT_IMAGE`, pushes `(thickness, threshold, time, _)` and `color`, and
    /// draws 3 vertices (§4.10).
    pub fn postprocess_outline(
        &mut self,
        device: &Device,
        cmd: &mut CommandList,
        render_pass: &RenderPass,
        input: &Texture,
        thickness: f32,
        threshold: f32,
        time: f32,
        color: Vec4,
    ) -> Result<(), RhiError> {
        cmd.binder.bind_resource(SRV_SLOT_IMAGE as usize, input);
        cmd.binder.bind_sampler(OUTLINE_SAMPLER_SLOT, &self.samplers.point_clamp);

        let pso = &self.pipelines.outline;
        let pipeline_vk = pso.validate(render_pass, &cmd.vertex_strides)?;
        cmd.binder.flush(&device.device, cmd.raw, pso, pipeline_vk)?;

        let push = OutlinePushConstants { params: [thickness, threshold, time, 0.0], color: color.to_array() };
        unsafe {
            device.device.cmd_push_constants(
                cmd.raw,
                pso.pipeline_layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push),
            );
            device.device.cmd_draw(cmd.raw, 3, 1, 0, 0);
        }
        Ok(())
    }
}
