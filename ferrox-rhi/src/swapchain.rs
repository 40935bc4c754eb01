//! Swap chain creation (§4.4): surface format/present-mode selection, image acquisition, and
//! the embedded default render pass every swap-chain image is framebuffer-compatible with.

use std::sync::Arc;

use ash::khr::{surface as khr_surface, swapchain as khr_swapchain};
use ash::vk;

use crate::error::RhiError;
use crate::handle::{AllocationTracker, FreeItem};
use crate::render_pass::{AttachmentDesc, AttachmentKind, LoadOp, RenderPass, RenderPassDesc, StoreOp};
use crate::types::Format;

#[derive(Debug, Clone, Copy)]
pub struct SwapChainDesc {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub buffer_count: u32,
    pub vsync: bool,
}

impl Default for SwapChainDesc {
    fn default() -> Self {
        Self { width: 1280, height: 720, format: Format::Bgra8Unorm, buffer_count: 2, vsync: true }
    }
}

/// One swap-chain image: its view and the framebuffer built against the swap chain's embedded
/// render pass (§4.4 "Creates a default single-color render pass with Clear -> Store").
struct SwapImage {
    view: vk::ImageView,
    framebuffer: vk::Framebuffer,
}

pub struct SwapChain {
    tracker: Arc<AllocationTracker>,
    surface_loader: khr_surface::Instance,
    swapchain_loader: khr_swapchain::Device,
    surface: vk::SurfaceKHR,
    raw: vk::SwapchainKHR,
    images: Vec<SwapImage>,
    pub render_pass: vk::RenderPass,
    pub extent: (u32, u32),
    pub format: Format,
    pub acquire_semaphore: vk::Semaphore,
    pub release_semaphore: vk::Semaphore,
    queue: vk::Queue,
}

impl std::fmt::Debug for SwapChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapChain")
            .field("extent", &self.extent)
            .field("format", &self.format)
            .field("image_count", &self.images.len())
            .finish()
    }
}

impl SwapChain {
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.images[index].framebuffer
    }

    /// Waits on `acquire_semaphore`; the caller's first graphics submit for the frame should
    /// wait on it before writing the acquired image (§4.4, §5 ordering guarantees).
    pub fn acquire_next_image(&self) -> Result<u32, RhiError> {
        let (index, _suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.raw, u64::MAX, self.acquire_semaphore, vk::Fence::null())
                .map_err(|e| RhiError::ResourceCreation(e.to_string()))?
        };
        Ok(index)
    }

    /// Presents `index`, gated on `release_semaphore` (signaled by the frame's graphics submit).
    pub fn present(&self, index: u32) -> Result<(), RhiError> {
        let wait = [self.release_semaphore];
        let swapchains = [self.raw];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::default().wait_semaphores(&wait).swapchains(&swapchains).image_indices(&indices);
        unsafe { self.swapchain_loader.queue_present(self.queue, &present_info) }
            .map(|_| ())
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))
    }
}

impl Drop for SwapChain {
    fn drop(&mut self) {
        for img in &self.images {
            self.tracker.retire(FreeItem::Framebuffer(img.framebuffer));
            self.tracker.retire(FreeItem::ImageView(img.view));
        }
        self.tracker.retire(FreeItem::RenderPass(self.render_pass));
        self.tracker.retire(FreeItem::SwapChain(self.raw));
        self.tracker.retire(FreeItem::Surface(self.surface));
        self.tracker.retire(FreeItem::Semaphore(self.acquire_semaphore));
        self.tracker.retire(FreeItem::Semaphore(self.release_semaphore));
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.raw, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Picks the surface format matching `requested` with sRGB-nonlinear color space, falling back
/// to BGRA8 (§4.4).
fn pick_surface_format(formats: &[vk::SurfaceFormatKHR], requested: Format) -> vk::SurfaceFormatKHR {
    let requested_vk = crate::vulkan::format_to_vk(requested);
    formats
        .iter()
        .find(|f| f.format == requested_vk && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.iter().find(|f| f.format == vk::Format::B8G8R8A8_UNORM))
        .copied()
        .unwrap_or(formats[0])
}

fn pick_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync {
        if available.contains(&vk::PresentModeKHR::MAILBOX) {
            return vk::PresentModeKHR::MAILBOX;
        }
        if available.contains(&vk::PresentModeKHR::IMMEDIATE) {
            return vk::PresentModeKHR::IMMEDIATE;
        }
    }
    vk::PresentModeKHR::FIFO
}

fn pick_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: requested.0.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: requested.1.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn create_swap_chain(
    entry: &ash::Entry,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    tracker: Arc<AllocationTracker>,
    surface: vk::SurfaceKHR,
    queue: vk::Queue,
    desc: SwapChainDesc,
) -> Result<SwapChain, RhiError> {
    let surface_loader = khr_surface::Instance::new(entry, instance);
    let swapchain_loader = khr_swapchain::Device::new(instance, &tracker.device);

    let formats = unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
        .map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;
    let present_modes = unsafe { surface_loader.get_physical_device_surface_present_modes(physical_device, surface) }
        .map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;
    let caps = unsafe { surface_loader.get_physical_device_surface_capabilities(physical_device, surface) }
        .map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;

    let surface_format = pick_surface_format(&formats, desc.format);
    let present_mode = pick_present_mode(&present_modes, desc.vsync);
    let extent = pick_extent(&caps, (desc.width, desc.height));

    let mut image_count = desc.buffer_count.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        image_count = image_count.min(caps.max_image_count);
    }

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(caps.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true);

    let raw = unsafe { swapchain_loader.create_swapchain(&create_info, None) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;

    let resolved_format = vk_format_to_format(surface_format.format);
    let render_pass_desc = RenderPassDesc {
        attachments: vec![AttachmentDesc {
            kind: AttachmentKind::RenderTarget,
            format: resolved_format,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            initial_state: crate::types::ResourceState::Undefined,
            subpass_layout: crate::types::ResourceState::RenderTarget,
            final_layout: crate::types::ResourceState::Present,
        }],
    };
    let render_pass = create_bare_render_pass(&tracker.device, &render_pass_desc)?;

    let vk_images = unsafe { swapchain_loader.get_swapchain_images(raw) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;
    let mut images = Vec::with_capacity(vk_images.len());
    for image in vk_images {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(surface_format.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { tracker.device.create_image_view(&view_info, None) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;
        let attachments = [view];
        let fb_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe { tracker.device.create_framebuffer(&fb_info, None) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;
        images.push(SwapImage { view, framebuffer });
    }

    let sem_info = vk::SemaphoreCreateInfo::default();
    let acquire_semaphore = unsafe { tracker.device.create_semaphore(&sem_info, None) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;
    let release_semaphore = unsafe { tracker.device.create_semaphore(&sem_info, None) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))?;

    log::info!(
        "swap chain created: {}x{} format={:?} images={} present_mode={:?}",
        extent.width,
        extent.height,
        resolved_format,
        images.len(),
        present_mode
    );

    Ok(SwapChain {
        tracker,
        surface_loader,
        swapchain_loader,
        surface,
        raw,
        images,
        render_pass,
        extent: (extent.width, extent.height),
        format: resolved_format,
        acquire_semaphore,
        release_semaphore,
        queue,
    })
}

fn vk_format_to_format(fmt: vk::Format) -> Format {
    match fmt {
        vk::Format::B8G8R8A8_UNORM => Format::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => Format::Bgra8Srgb,
        vk::Format::R8G8B8A8_SRGB => Format::Rgba8Srgb,
        _ => Format::Rgba8Unorm,
    }
}

fn create_bare_render_pass(device: &ash::Device, desc: &RenderPassDesc) -> Result<vk::RenderPass, RhiError> {
    let a = &desc.attachments[0];
    let attachment = vk::AttachmentDescription::default()
        .format(crate::vulkan::format_to_vk(a.format))
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
    let color_ref = vk::AttachmentReference { attachment: 0, layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL };
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref));
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(std::slice::from_ref(&attachment))
        .subpasses(std::slice::from_ref(&subpass));
    unsafe { device.create_render_pass(&create_info, None) }.map_err(|e| RhiError::SwapChainCreation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_mode_prefers_mailbox_when_vsync_off() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(pick_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_immediate() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(pick_present_mode(&modes, false), vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn present_mode_is_fifo_when_vsync_on() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(pick_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_clamped_to_capabilities_when_surface_has_no_fixed_extent() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 1024, height: 1024 },
            ..Default::default()
        };
        let extent = pick_extent(&caps, (4000, 16));
        assert_eq!(extent, vk::Extent2D { width: 1024, height: 64 });
    }
}
