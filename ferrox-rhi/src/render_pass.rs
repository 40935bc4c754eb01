use std::sync::Arc;

use ash::vk;

use crate::handle::{AllocationTracker, FreeItem};
use crate::resources::texture::Texture;
use crate::types::{Format, ResourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    RenderTarget,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachmentDesc {
    pub kind: AttachmentKind,
    pub format: Format,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_layout: ResourceState,
    pub subpass_layout: ResourceState,
    pub final_layout: ResourceState,
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassDesc {
    pub attachments: Vec<AttachmentDesc>,
}

fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

/// Computes a stable hash over the attachment list so pipeline states can key their dynamic
/// pipeline cache on `(pso_hash, vertex_strides_hash, render_pass_hash)` (§4.5 `validatePSO`).
pub fn hash_attachments(desc: &RenderPassDesc) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for a in &desc.attachments {
        (a.kind, a.format, a.load_op, a.store_op).hash(&mut hasher);
    }
    hasher.finish()
}

/// One subpass, graphics bind point, with precomputed `begin_info` clear values. Framebuffer
/// is built from the attachment textures' views at the pass's extent.
pub struct RenderPass {
    pub(crate) tracker: Arc<AllocationTracker>,
    pub raw: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub desc: RenderPassDesc,
    pub hash: u64,
    pub extent: (u32, u32),
    pub clear_values: Vec<vk::ClearValue>,
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass").field("attachments", &self.desc.attachments.len()).finish()
    }
}

impl RenderPass {
    pub fn begin_info(&self) -> vk::RenderPassBeginInfo<'_> {
        vk::RenderPassBeginInfo::default()
            .render_pass(self.raw)
            .framebuffer(self.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: self.extent.0, height: self.extent.1 },
            })
            .clear_values(&self.clear_values)
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        self.tracker.retire(FreeItem::Framebuffer(self.framebuffer));
        self.tracker.retire(FreeItem::RenderPass(self.raw));
    }
}

/// Builds the `VkRenderPass` + framebuffer described by `desc` against `textures` (one per
/// attachment, color attachments first then optional depth/stencil).
pub fn create_render_pass(
    tracker: Arc<AllocationTracker>,
    desc: RenderPassDesc,
    textures: &[&Texture],
    extent: (u32, u32),
) -> Result<RenderPass, crate::error::RhiError> {
    use crate::vulkan::{format_to_vk, resource_state_to_layout};

    let mut vk_attachments = Vec::with_capacity(desc.attachments.len());
    let mut color_refs = Vec::new();
    let mut depth_ref = None;
    let mut clear_values = Vec::with_capacity(desc.attachments.len());

    for (i, a) in desc.attachments.iter().enumerate() {
        vk_attachments.push(
            vk::AttachmentDescription::default()
                .format(format_to_vk(a.format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op_to_vk(a.load_op))
                .store_op(store_op_to_vk(a.store_op))
                .stencil_load_op(load_op_to_vk(a.load_op))
                .stencil_store_op(store_op_to_vk(a.store_op))
                .initial_layout(resource_state_to_layout(a.initial_layout))
                .final_layout(resource_state_to_layout(a.final_layout)),
        );
        let subpass_layout = resource_state_to_layout(a.subpass_layout);
        match a.kind {
            AttachmentKind::RenderTarget => {
                color_refs.push(vk::AttachmentReference { attachment: i as u32, layout: subpass_layout });
                clear_values.push(vk::ClearValue { color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] } });
            }
            AttachmentKind::DepthStencil => {
                depth_ref = Some(vk::AttachmentReference { attachment: i as u32, layout: subpass_layout });
                // Reversed-Z: clear depth to 0.0, the "far" value under Greater/GreaterEqual.
                clear_values.push(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 },
                });
            }
        }
    }

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth) = depth_ref.as_ref() {
        subpass = subpass.depth_stencil_attachment(depth);
    }

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&vk_attachments)
        .subpasses(std::slice::from_ref(&subpass));

    let raw = unsafe { tracker.device.create_render_pass(&create_info, None) }
        .map_err(|e| crate::error::RhiError::ResourceCreation(e.to_string()))?;

    let views: Vec<vk::ImageView> = textures
        .iter()
        .zip(desc.attachments.iter())
        .map(|(t, a)| match a.kind {
            AttachmentKind::RenderTarget => t.rtv.expect("render target attachment requires an RTV"),
            AttachmentKind::DepthStencil => t.dsv.expect("depth attachment requires a DSV"),
        })
        .collect();

    let fb_info = vk::FramebufferCreateInfo::default()
        .render_pass(raw)
        .attachments(&views)
        .width(extent.0)
        .height(extent.1)
        .layers(1);
    let framebuffer = unsafe { tracker.device.create_framebuffer(&fb_info, None) }.map_err(|e| {
        unsafe { tracker.device.destroy_render_pass(raw, None) };
        crate::error::RhiError::ResourceCreation(e.to_string())
    })?;

    let hash = hash_attachments(&desc);
    Ok(RenderPass { tracker, raw, framebuffer, desc, hash, extent, clear_values })
}
