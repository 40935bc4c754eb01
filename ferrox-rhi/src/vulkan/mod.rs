//! Low-level Vulkan plumbing: instance/device bring-up, queue family selection, and the
//! VMA-style memory-type lookup used by every resource creation path. Everything above this
//! module (device.rs, resources/*) only ever calls into these free functions; none of them
//! hold state themselves.

use std::ffi::{c_char, CStr, CString};

use ash::vk;

use crate::error::RhiError;

pub struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub transfer: u32,
    /// True when `transfer` names a queue family distinct from `graphics` (a dedicated
    /// transfer-only queue, preferred for the copy allocator).
    pub dedicated_transfer: bool,
}

pub struct Queues {
    pub graphics: vk::Queue,
    pub compute: vk::Queue,
    pub transfer: vk::Queue,
}

/// Returns validation layer names to enable if validation is requested (feature or
/// `FERROX_VALIDATION=1`).
#[cfg(feature = "validation")]
fn validation_layer_names(entry: &ash::Entry) -> Vec<CString> {
    let disable = std::env::var("FERROX_VALIDATION").is_ok_and(|v| v == "0" || v.eq_ignore_ascii_case("false"));
    if disable {
        return vec![];
    }
    let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(l) => l,
        Err(_) => return vec![],
    };
    const KHRONOS: &str = "VK_LAYER_KHRONOS_validation";
    for prop in &layers {
        let name = unsafe { CStr::from_ptr(prop.layer_name.as_ptr()).to_string_lossy() };
        if name == KHRONOS {
            return vec![CString::new(KHRONOS).unwrap()];
        }
    }
    log::warn!("validation requested but {KHRONOS} is not available on this system");
    vec![]
}

#[cfg(not(feature = "validation"))]
fn validation_layer_names(_entry: &ash::Entry) -> Vec<CString> {
    if std::env::var("FERROX_VALIDATION").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
        log::warn!("FERROX_VALIDATION=1 set but ferrox-rhi built without the 'validation' feature; validation layers not available");
    }
    vec![]
}

/// Creates a Vulkan instance, optionally requesting the validation layer. `extra_extensions`
/// lets the swap chain path add `VK_KHR_surface` + a platform surface extension.
pub fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    validation: bool,
    extra_extensions: &[*const c_char],
) -> Result<ash::Instance, RhiError> {
    let app_name_c = CString::new(app_name).unwrap();
    let engine_name_c = CString::new("ferrox").unwrap();
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name_c)
        .engine_name(&engine_name_c)
        .api_version(vk::API_VERSION_1_2);

    let layers = if validation { validation_layer_names(entry) } else { vec![] };
    let layer_ptrs: Vec<*const c_char> = layers.iter().map(|c| c.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layer_ptrs)
        .enabled_extension_names(extra_extensions);

    unsafe { entry.create_instance(&create_info, None) }.map_err(|e| RhiError::InstanceCreation(e.to_string()))
}

/// Prefers a discrete GPU; requires graphics + transfer + compute queue support (transfer and
/// compute may be satisfied by the graphics family). Falls back to any suitable device.
pub fn pick_physical_device(
    instance: &ash::Instance,
) -> Result<(vk::PhysicalDevice, QueueFamilies), RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|_| RhiError::NoSuitableDevice)?;

    let mut best: Option<(vk::PhysicalDevice, QueueFamilies, bool)> = None;
    for pd in devices {
        let props = unsafe { instance.get_physical_device_properties(pd) };
        let is_discrete = props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
        let Some(families) = find_queue_families(instance, pd) else { continue };

        let better = match &best {
            None => true,
            Some((_, _, best_discrete)) => is_discrete && !best_discrete,
        };
        if better {
            best = Some((pd, families, is_discrete));
        }
    }
    best.map(|(pd, f, _)| (pd, f)).ok_or(RhiError::NoSuitableDevice)
}

fn find_queue_families(instance: &ash::Instance, pd: vk::PhysicalDevice) -> Option<QueueFamilies> {
    let props = unsafe { instance.get_physical_device_queue_family_properties(pd) };
    let graphics = props
        .iter()
        .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;

    let dedicated_transfer = props.iter().position(|p| {
        p.queue_flags.contains(vk::QueueFlags::TRANSFER)
            && !p.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && !p.queue_flags.contains(vk::QueueFlags::COMPUTE)
    });
    let transfer = dedicated_transfer.map(|i| i as u32).unwrap_or(graphics);

    let compute = props
        .iter()
        .position(|p| p.queue_flags.contains(vk::QueueFlags::COMPUTE))
        .map(|i| i as u32)
        .unwrap_or(graphics);

    Some(QueueFamilies {
        graphics,
        compute,
        transfer,
        dedicated_transfer: dedicated_transfer.is_some(),
    })
}

pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: &QueueFamilies,
    extra_extensions: &[*const c_char],
) -> Result<(ash::Device, Queues), RhiError> {
    let mut unique: Vec<u32> = vec![families.graphics, families.compute, families.transfer];
    unique.sort_unstable();
    unique.dedup();

    let priority = [1.0f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&priority)
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures::default();
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(extra_extensions)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &create_info, None) }
        .map_err(|e| RhiError::DeviceCreation(e.to_string()))?;

    let queues = Queues {
        graphics: unsafe { device.get_device_queue(families.graphics, 0) },
        compute: unsafe { device.get_device_queue(families.compute, 0) },
        transfer: unsafe { device.get_device_queue(families.transfer, 0) },
    };

    Ok((device, queues))
}

/// VMA-style memory type lookup: usage hints map to a set of required property flags, and the
/// first memory type whose bits match both the resource's `type_bits` mask and those
/// properties is selected.
pub fn find_memory_type(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let mem_props = unsafe { instance.get_physical_device_memory_properties(physical_device) };
    (0..mem_props.memory_type_count).find(|&i| {
        let supported = (type_bits & (1 << i)) != 0;
        let has_flags = mem_props.memory_types[i as usize].property_flags.contains(required);
        supported && has_flags
    })
}

/// Maps a [`crate::types::BufferUsage`] to the VMA-style memory property hints from §4.4:
/// Default = device-local; Upload = host-visible sequential-write + mapped; Readback =
/// host-visible random-read + mapped.
pub fn memory_properties_for_usage(usage: crate::types::BufferUsage) -> vk::MemoryPropertyFlags {
    use crate::types::BufferUsage;
    match usage {
        BufferUsage::Default => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        BufferUsage::Upload => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        BufferUsage::Readback => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
    }
}

pub fn bind_flags_to_buffer_usage(bind_flags: crate::types::BindFlags) -> vk::BufferUsageFlags {
    use crate::types::BindFlags;
    let mut flags = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if bind_flags.contains(BindFlags::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if bind_flags.contains(BindFlags::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if bind_flags.contains(BindFlags::CONSTANT) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if bind_flags.contains(BindFlags::SHADER_RESOURCE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

pub fn format_to_vk(format: crate::types::Format) -> vk::Format {
    use crate::types::Format;
    match format {
        Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        Format::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        Format::R32Float => vk::Format::R32_SFLOAT,
        Format::R16Float => vk::Format::R16_SFLOAT,
        Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        Format::D32Float => vk::Format::D32_SFLOAT,
        Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub fn resource_state_to_layout(state: crate::types::ResourceState) -> vk::ImageLayout {
    use crate::types::ResourceState;
    match state {
        ResourceState::Undefined => vk::ImageLayout::UNDEFINED,
        ResourceState::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ResourceState::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ResourceState::ShaderResource => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ResourceState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ResourceState::DepthStencilWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ResourceState::DepthStencilRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ResourceState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        ResourceState::General => vk::ImageLayout::GENERAL,
    }
}
