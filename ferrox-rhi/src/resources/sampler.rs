use std::sync::Arc;

use ash::vk;

use crate::handle::{AllocationTracker, FreeItem};
use crate::types::{AddressMode, FilterMode};

#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub lod_bias: f32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub max_anisotropy: Option<f32>,
    pub border_color: [f32; 4],
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: FilterMode::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            lod_bias: 0.0,
            min_lod: 0.0,
            max_lod: vk::LOD_CLAMP_NONE,
            max_anisotropy: None,
            border_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl SamplerDesc {
    pub fn point_clamp() -> Self {
        Self {
            filter: FilterMode::Nearest,
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
            address_w: AddressMode::Clamp,
            ..Default::default()
        }
    }
}

pub struct Sampler {
    pub(crate) tracker: Arc<AllocationTracker>,
    pub raw: vk::Sampler,
    pub desc: SamplerDesc,
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler").finish_non_exhaustive()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.tracker.retire(FreeItem::Sampler(self.raw));
    }
}

fn filter_to_vk(f: FilterMode) -> vk::Filter {
    match f {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

fn mipmap_mode_of(f: FilterMode) -> vk::SamplerMipmapMode {
    match f {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

fn address_mode_to_vk(a: AddressMode) -> vk::SamplerAddressMode {
    match a {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

/// Vulkan only offers a handful of named border colors without the custom-border-color
/// extension; picks the closest one to the requested RGBA (§3 `Sampler`).
fn nearest_standard_border_color(rgba: [f32; 4]) -> vk::BorderColor {
    let opaque = rgba[3] > 0.5;
    let white = rgba[0] > 0.5 && rgba[1] > 0.5 && rgba[2] > 0.5;
    match (opaque, white) {
        (false, _) => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        (true, false) => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        (true, true) => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub fn create_sampler(tracker: Arc<AllocationTracker>, desc: SamplerDesc) -> Result<Sampler, crate::error::RhiError> {
    let filter = filter_to_vk(desc.filter);
    let info = vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap_mode_of(desc.filter))
        .address_mode_u(address_mode_to_vk(desc.address_u))
        .address_mode_v(address_mode_to_vk(desc.address_v))
        .address_mode_w(address_mode_to_vk(desc.address_w))
        .mip_lod_bias(desc.lod_bias)
        .min_lod(desc.min_lod)
        .max_lod(desc.max_lod)
        .anisotropy_enable(desc.max_anisotropy.is_some())
        .max_anisotropy(desc.max_anisotropy.unwrap_or(1.0))
        .border_color(nearest_standard_border_color(desc.border_color));
    let raw = unsafe { tracker.device.create_sampler(&info, None) }.map_err(|e| crate::error::RhiError::ResourceCreation(e.to_string()))?;
    Ok(Sampler { tracker, raw, desc })
}
