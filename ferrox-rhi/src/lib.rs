//! Handle-based, reference-counted render hardware interface over a Vulkan-class device.
//!
//! Every creatable resource (buffer, texture, shader, sampler, pipeline state, render pass,
//! swap chain) is a thin handle wrapping an `Arc<AllocationTracker>`: when the last clone of a
//! resource drops, its raw Vulkan objects are enqueued on the device's deferred-free allocator
//! and destroyed `BUFFER_COUNT` frames later, once no in-flight command list can still be
//! reading them. See [`handle`] for the mechanism and [`device::Device`] for the frame loop
//! that drains it.

#[cfg(feature = "vulkan")]
pub mod copy_allocator;
#[cfg(feature = "vulkan")]
pub mod descriptor_binder;
#[cfg(feature = "vulkan")]
pub mod device;
pub mod error;
#[cfg(feature = "vulkan")]
pub mod handle;
#[cfg(feature = "vulkan")]
pub mod pipeline;
#[cfg(feature = "vulkan")]
pub mod render_pass;
#[cfg(feature = "vulkan")]
pub mod resources;
#[cfg(feature = "vulkan")]
pub mod swapchain;
pub mod types;
#[cfg(feature = "window")]
pub mod window;

/// Backend-agnostic trait seam (§2): `Device`/`Buffer`/`Texture`/etc. as object-safe traits,
/// implemented additively on the concrete Vulkan types below. A second backend would implement
/// these same traits behind its own feature flag instead of widening any `match` on a backend
/// enum.
#[cfg(feature = "vulkan")]
pub mod backend;

#[cfg(feature = "vulkan")]
mod vulkan;

#[cfg(feature = "vulkan")]
pub use copy_allocator::CopyAllocator;
#[cfg(feature = "vulkan")]
pub use descriptor_binder::DescriptorBinder;
#[cfg(feature = "vulkan")]
pub use device::{CommandList, Device, DeviceDesc};
pub use error::RhiError;
#[cfg(feature = "vulkan")]
pub use handle::{AllocationTracker, DeferredFreeAllocator, FreeItem};
#[cfg(feature = "vulkan")]
pub use pipeline::{PipelineLayoutCache, PipelineState, PipelineStateDesc};
#[cfg(feature = "vulkan")]
pub use render_pass::{AttachmentDesc, RenderPass, RenderPassDesc};
#[cfg(feature = "vulkan")]
pub use resources::buffer::{Buffer, BufferDesc};
#[cfg(feature = "vulkan")]
pub use resources::sampler::{Sampler, SamplerDesc};
#[cfg(feature = "vulkan")]
pub use resources::shader::{Shader, ShaderReflection, ShaderStage};
#[cfg(feature = "vulkan")]
pub use resources::texture::{Texture, TextureDesc};
#[cfg(feature = "vulkan")]
pub use swapchain::{SwapChain, SwapChainDesc};
pub use types::*;
