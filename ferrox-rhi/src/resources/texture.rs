use std::sync::Arc;

use ash::vk;

use crate::handle::{AllocationTracker, FreeItem};
use crate::types::{BindFlags, Format, ResourceState, TextureKind};

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub array_size: u32,
    pub mip_levels: u32,
    pub bind_flags: BindFlags,
    pub initial_state: ResourceState,
    pub label: Option<&'static str>,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            kind: TextureKind::Tex2D,
            width: 1,
            height: 1,
            format: Format::Rgba8Unorm,
            array_size: 1,
            mip_levels: 1,
            bind_flags: BindFlags::empty(),
            initial_state: ResourceState::ShaderResource,
            label: None,
        }
    }
}

/// A GPU texture plus its sub-views. `srv`/`rtv`/`dsv` are created to match `bind_flags`, each
/// with the aspect mask appropriate to the view kind.
pub struct Texture {
    pub(crate) tracker: Arc<AllocationTracker>,
    pub raw: vk::Image,
    pub(crate) memory: vk::DeviceMemory,
    pub desc: TextureDesc,
    pub srv: Option<vk::ImageView>,
    pub rtv: Option<vk::ImageView>,
    pub dsv: Option<vk::ImageView>,
    pub current_layout: std::sync::atomic::AtomicU32,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.desc.width)
            .field("height", &self.desc.height)
            .field("format", &self.desc.format)
            .finish()
    }
}

impl Texture {
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        if self.desc.format.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        for view in [self.srv, self.rtv, self.dsv].into_iter().flatten() {
            self.tracker.retire(FreeItem::ImageView(view));
        }
        self.tracker.retire(FreeItem::Image(self.raw));
        self.tracker.retire(FreeItem::Memory(self.memory));
    }
}

fn usage_from_bind_flags(bind_flags: BindFlags, format: Format) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    if bind_flags.contains(BindFlags::SHADER_RESOURCE) {
        usage |= vk::ImageUsageFlags::SAMPLED;
    }
    if bind_flags.contains(BindFlags::RENDER_TARGET) {
        usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if bind_flags.contains(BindFlags::DEPTH_STENCIL) || format.is_depth() {
        usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    usage
}

fn image_type_of(kind: TextureKind) -> vk::ImageType {
    match kind {
        TextureKind::Tex1D => vk::ImageType::TYPE_1D,
        TextureKind::Tex2D => vk::ImageType::TYPE_2D,
        TextureKind::Tex3D => vk::ImageType::TYPE_3D,
    }
}

fn view_type_of(kind: TextureKind, array_size: u32) -> vk::ImageViewType {
    match (kind, array_size > 1) {
        (TextureKind::Tex1D, false) => vk::ImageViewType::TYPE_1D,
        (TextureKind::Tex1D, true) => vk::ImageViewType::TYPE_1D_ARRAY,
        (TextureKind::Tex2D, false) => vk::ImageViewType::TYPE_2D,
        (TextureKind::Tex2D, true) => vk::ImageViewType::TYPE_2D_ARRAY,
        (TextureKind::Tex3D, _) => vk::ImageViewType::TYPE_3D,
    }
}

/// Creates a texture per §4.4. If `initial_data` is given it is staged, then the image
/// transitions `Undefined -> TransferDst -> requested_layout`; otherwise it transitions
/// directly `Undefined -> requested_layout` on `init_cmd`. Sub-views are created matching
/// `bind_flags` with the aspect mask appropriate to each view kind.
#[allow(clippy::too_many_arguments)]
pub fn create_texture(
    tracker: Arc<AllocationTracker>,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    init_cmd: vk::CommandBuffer,
    copy_allocator: Option<&crate::copy_allocator::CopyAllocator>,
    desc: TextureDesc,
    initial_data: Option<&[u8]>,
) -> Result<Texture, crate::error::RhiError> {
    use crate::error::RhiError;
    use crate::vulkan::{format_to_vk, resource_state_to_layout};

    let vk_format = format_to_vk(desc.format);
    let aspect = if desc.format.is_depth() { vk::ImageAspectFlags::DEPTH } else { vk::ImageAspectFlags::COLOR };

    let image_info = vk::ImageCreateInfo::default()
        .image_type(image_type_of(desc.kind))
        .format(vk_format)
        .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
        .mip_levels(desc.mip_levels.max(1))
        .array_layers(desc.array_size.max(1))
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage_from_bind_flags(desc.bind_flags, desc.format))
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);
    let raw = unsafe { tracker.device.create_image(&image_info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;

    let reqs = unsafe { tracker.device.get_image_memory_requirements(raw) };
    let memory_type = crate::vulkan::find_memory_type(instance, physical_device, reqs.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .ok_or(RhiError::NoSuitableDevice)?;
    let alloc_info = vk::MemoryAllocateInfo::default().allocation_size(reqs.size).memory_type_index(memory_type);
    let memory = unsafe { tracker.device.allocate_memory(&alloc_info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
    unsafe { tracker.device.bind_image_memory(raw, memory, 0) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;

    let subresource = vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: desc.mip_levels.max(1),
        base_array_layer: 0,
        layer_count: desc.array_size.max(1),
    };

    let requested_layout = resource_state_to_layout(desc.initial_state);
    if let (Some(data), Some(copy)) = (initial_data, copy_allocator) {
        transition(&tracker.device, init_cmd, raw, aspect, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        let cmd = copy.allocate(data.len() as u64)?;
        copy.write_staging(cmd, 0, data);
        let staging = copy.staging_buffer(cmd).ok_or(RhiError::ResourceCreation("staging buffer missing after allocate".into()))?;
        unsafe {
            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: aspect,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: desc.array_size.max(1),
                },
                image_offset: vk::Offset3D::default(),
                image_extent: vk::Extent3D { width: desc.width, height: desc.height, depth: 1 },
            };
            tracker.device.cmd_copy_buffer_to_image(cmd, staging, raw, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
        }
        copy.submit(cmd);
        transition(&tracker.device, init_cmd, raw, aspect, vk::ImageLayout::TRANSFER_DST_OPTIMAL, requested_layout);
    } else {
        transition(&tracker.device, init_cmd, raw, aspect, vk::ImageLayout::UNDEFINED, requested_layout);
    }

    let view_type = view_type_of(desc.kind, desc.array_size);
    let make_view = |view_aspect: vk::ImageAspectFlags| -> Result<vk::ImageView, RhiError> {
        let mut range = subresource;
        range.aspect_mask = view_aspect;
        let info = vk::ImageViewCreateInfo::default().image(raw).view_type(view_type).format(vk_format).subresource_range(range);
        unsafe { tracker.device.create_image_view(&info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))
    };

    let srv = if desc.bind_flags.contains(BindFlags::SHADER_RESOURCE) { Some(make_view(aspect)?) } else { None };
    let rtv = if desc.bind_flags.contains(BindFlags::RENDER_TARGET) { Some(make_view(vk::ImageAspectFlags::COLOR)?) } else { None };
    let dsv = if desc.bind_flags.contains(BindFlags::DEPTH_STENCIL) { Some(make_view(aspect)?) } else { None };

    Ok(Texture {
        tracker,
        raw,
        memory,
        desc,
        srv,
        rtv,
        dsv,
        current_layout: std::sync::atomic::AtomicU32::new(requested_layout.as_raw() as u32),
    })
}

fn transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 })
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}
