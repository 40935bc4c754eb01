use std::sync::Arc;

use ash::vk;

use crate::handle::{AllocationTracker, FreeItem};
use crate::types::{BindFlags, BufferUsage, MiscFlags};

#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
    pub bind_flags: BindFlags,
    pub misc_flags: MiscFlags,
    /// Structured-buffer element stride; zero for raw/vertex/index/constant buffers.
    pub stride: u32,
    pub label: Option<&'static str>,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            size: 0,
            usage: BufferUsage::Default,
            bind_flags: BindFlags::empty(),
            misc_flags: MiscFlags::empty(),
            stride: 0,
            label: None,
        }
    }
}

/// A GPU buffer. `mapped_ptr`/`row_pitch` are populated only for `Upload`/`Readback` buffers,
/// whose backing memory stays persistently mapped for the buffer's lifetime.
pub struct Buffer {
    pub(crate) tracker: Arc<AllocationTracker>,
    pub raw: vk::Buffer,
    pub(crate) memory: vk::DeviceMemory,
    pub desc: BufferDesc,
    pub mapped_ptr: Option<*mut u8>,
}

// The mapped pointer is only ever touched through `&self` accessors that copy host-visible
// memory; Vulkan itself requires no external synchronization for a single writer, which is
// how this type is used (per-frame CB writes from one thread at a time).
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer").field("size", &self.desc.size).field("usage", &self.desc.usage).finish()
    }
}

impl Buffer {
    pub fn size(&self) -> u64 {
        self.desc.size
    }

    /// Writes `data` at `offset` into a mapped (`Upload`/`Readback`) buffer. No-op (and
    /// `false`) for `Default` buffers, which must be staged through the copy allocator.
    pub fn write(&self, offset: u64, data: &[u8]) -> bool {
        let Some(ptr) = self.mapped_ptr else { return false };
        if offset + data.len() as u64 > self.desc.size {
            return false;
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }
        true
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.mapped_ptr.is_some() {
            unsafe { self.tracker.device.unmap_memory(self.memory) };
        }
        self.tracker.retire(FreeItem::Buffer(self.raw));
        self.tracker.retire(FreeItem::Memory(self.memory));
    }
}

/// Target access flags once a staged `Default` buffer's transfer-write completes, matching the
/// bind flags that were requested (§4.4: "post-barrier restoring bind-appropriate access").
fn post_stage_access(bind_flags: BindFlags) -> vk::AccessFlags {
    let mut access = vk::AccessFlags::empty();
    if bind_flags.contains(BindFlags::VERTEX) {
        access |= vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if bind_flags.contains(BindFlags::INDEX) {
        access |= vk::AccessFlags::INDEX_READ;
    }
    if bind_flags.contains(BindFlags::CONSTANT) {
        access |= vk::AccessFlags::UNIFORM_READ;
    }
    if bind_flags.contains(BindFlags::SHADER_RESOURCE) {
        access |= vk::AccessFlags::SHADER_READ;
    }
    access
}

/// Creates a buffer per §4.4: usage maps to VMA-style memory-property hints, bind flags union
/// into Vulkan buffer-usage bits (transfer src/dst always set), and `initial_data`, if given, is
/// staged through the copy allocator with a pre-barrier (transfer-write) and a post-barrier
/// restoring bind-appropriate access.
pub fn create_buffer(
    tracker: Arc<AllocationTracker>,
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    copy_allocator: Option<&crate::copy_allocator::CopyAllocator>,
    desc: BufferDesc,
    initial_data: Option<&[u8]>,
) -> Result<Buffer, crate::error::RhiError> {
    use crate::error::RhiError;
    use crate::vulkan::{bind_flags_to_buffer_usage, memory_properties_for_usage};

    let buffer_info = vk::BufferCreateInfo::default()
        .size(desc.size.max(1))
        .usage(bind_flags_to_buffer_usage(desc.bind_flags))
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let raw = unsafe { tracker.device.create_buffer(&buffer_info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
    let reqs = unsafe { tracker.device.get_buffer_memory_requirements(raw) };

    let required_props = memory_properties_for_usage(desc.usage);
    let memory_type = crate::vulkan::find_memory_type(instance, physical_device, reqs.memory_type_bits, required_props)
        .ok_or(RhiError::NoSuitableDevice)?;
    let alloc_info = vk::MemoryAllocateInfo::default().allocation_size(reqs.size).memory_type_index(memory_type);
    let memory = unsafe { tracker.device.allocate_memory(&alloc_info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
    unsafe { tracker.device.bind_buffer_memory(raw, memory, 0) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;

    let mapped_ptr = if matches!(desc.usage, BufferUsage::Upload | BufferUsage::Readback) {
        let ptr = unsafe { tracker.device.map_memory(memory, 0, desc.size.max(1), vk::MemoryMapFlags::empty()) }
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
        Some(ptr as *mut u8)
    } else {
        None
    };

    if let (Some(data), Some(copy)) = (initial_data, copy_allocator) {
        let cmd = copy.allocate(data.len() as u64)?;
        copy.write_staging(cmd, 0, data);
        let staging = copy.staging_buffer(cmd).ok_or(RhiError::ResourceCreation("staging buffer missing after allocate".into()))?;
        unsafe {
            let pre_barrier = vk::BufferMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .buffer(raw)
                .size(vk::WHOLE_SIZE);
            tracker.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[pre_barrier],
                &[],
            );
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size: data.len() as u64 };
            tracker.device.cmd_copy_buffer(cmd, staging, raw, &[region]);
            let post_barrier = vk::BufferMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(post_stage_access(desc.bind_flags))
                .buffer(raw)
                .size(vk::WHOLE_SIZE);
            tracker.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[post_barrier],
                &[],
            );
        }
        copy.submit(cmd);
    }

    Ok(Buffer { tracker, raw, memory, desc, mapped_ptr })
}
