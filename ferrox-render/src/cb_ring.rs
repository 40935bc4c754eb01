//! A per-frame-in-flight ring of host-visible constant buffers.
//!
//! `Misc` and `Material` (§4.10) are written many times per frame — once per object and once
//! per subset, respectively — so each is backed by one large `Upload` buffer per slot of the
//! `BUFFER_COUNT` frame ring (rather than one buffer per draw), with draws addressing their
//! slice of it via the dynamic-uniform-buffer offset the descriptor binder already threads
//! through (§4.5). `Frame` and `Camera` are written once per frame and use the same ring for
//! the same reason: without per-in-flight-frame copies, writing this frame's values could
//! race the GPU still reading last frame's from the same buffer.

use ferrox_rhi::device::Device;
use ferrox_rhi::resources::buffer::{Buffer, BufferDesc};
use ferrox_rhi::{BindFlags, BufferUsage, RhiError, BUFFER_COUNT};

/// Conservative upper bound for `minUniformBufferOffsetAlignment` on desktop and mobile
/// Vulkan implementations alike; real engines query the device limit, but nothing in this
/// crate's description exposes that limit as a port surface, so a safe constant stands in.
pub const DYNAMIC_CB_ALIGNMENT: u64 = 256;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

/// One constant buffer per frame-in-flight slot, each large enough for `slots` draws' worth of
/// `element_size` bytes, rounded up to `DYNAMIC_CB_ALIGNMENT`.
pub struct DynamicCbRing {
    buffers: Vec<Buffer>,
    element_stride: u64,
    cursor: u64,
    capacity: u64,
}

impl DynamicCbRing {
    pub fn new(device: &Device, element_size: u64, slots: u64, label: &'static str) -> Result<Self, RhiError> {
        let element_stride = align_up(element_size, DYNAMIC_CB_ALIGNMENT);
        let capacity = element_stride * slots;
        let mut buffers = Vec::with_capacity(BUFFER_COUNT as usize);
        for _ in 0..BUFFER_COUNT {
            buffers.push(device.create_buffer(
                BufferDesc {
                    size: capacity,
                    usage: BufferUsage::Upload,
                    bind_flags: BindFlags::CONSTANT,
                    stride: element_stride as u32,
                    label: Some(label),
                    ..Default::default()
                },
                None,
            )?);
        }
        Ok(Self { buffers, element_stride, cursor: 0, capacity })
    }

    /// Resets the write cursor at the start of a frame; call once before the first `write`.
    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    pub fn buffer(&self, frame_slot: usize) -> &Buffer {
        &self.buffers[frame_slot]
    }

    /// Writes `data` at the next aligned slot in this frame's buffer and returns its byte
    /// offset for use as the descriptor binder's dynamic offset.
    pub fn write(&mut self, frame_slot: usize, data: &[u8]) -> u64 {
        debug_assert!(data.len() as u64 <= self.element_stride, "constant buffer element too large for ring stride");
        if self.cursor + self.element_stride > self.capacity {
            // Wrapping rather than growing keeps this a fixed-size allocation; a frame that
            // overruns the configured slot count silently recycles the oldest writes, which is
            // only safe because nothing reads a dynamic-offset slot across frame boundaries.
            self.cursor = 0;
        }
        let offset = self.cursor;
        self.buffers[frame_slot].write(offset, data);
        self.cursor += self.element_stride;
        offset
    }
}
