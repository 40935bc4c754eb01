//! `drawSky` (§4.10): a fullscreen-triangle sky pass. Frame/Camera CBs are already bound by the
//! preceding `drawScene` call within the same command list — the descriptor binder only
//! rewrites a descriptor set when a binding actually changes (§4.5), so nothing here rebinds
//! them.

use ash::vk;
use ferrox_rhi::device::{CommandList, Device};
use ferrox_rhi::render_pass::RenderPass;
use ferrox_rhi::RhiError;

use crate::Renderer;

const SKY_STENCIL_REF: u32 = 255;

impl Renderer {
    /// `drawSky(camera, cmd)` (§4.10): depth `GreaterEqual`, write disabled, clockwise front
    /// face, stencil ref 255, 3 vertices with no bound vertex buffer (the fullscreen triangle
    /// is generated from `gl_VertexIndex` in the vertex shader).
    pub fn draw_sky(&mut self, device: &Device, cmd: &mut CommandList, render_pass: &RenderPass) -> Result<(), RhiError> {
        unsafe { device.device.cmd_set_stencil_reference(cmd.raw, vk::StencilFaceFlags::FRONT_AND_BACK, SKY_STENCIL_REF) };
        let pso = &self.pipelines.sky;
        let pipeline_vk = pso.validate(render_pass, &cmd.vertex_strides)?;
        cmd.binder.flush(&device.device, cmd.raw, pso, pipeline_vk)?;
        unsafe { device.device.cmd_draw(cmd.raw, 3, 1, 0, 0) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Property 7: `drawSky` always sets the stencil reference to 255 on both faces, regardless
    /// of camera or prior pass state — `draw_sky` has no other path to `cmd_set_stencil_reference`.
    #[test]
    fn sky_stencil_reference_matches_spec() {
        assert_eq!(SKY_STENCIL_REF, 255);
    }
}
