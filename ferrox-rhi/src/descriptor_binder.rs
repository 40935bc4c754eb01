//! Per-command-list descriptor-set cache and write batching (C5).

use ash::vk;

use crate::error::RhiError;
use crate::resources::buffer::Buffer;
use crate::resources::sampler::Sampler;
use crate::resources::shader::DescriptorKind;
use crate::resources::texture::Texture;
use crate::types::{MAX_CBV_SLOTS, MAX_SAMPLER_SLOTS, MAX_SRV_SLOTS};

#[derive(Clone, Copy, Default)]
struct CbvSlot {
    buffer: vk::Buffer,
    range: vk::DeviceSize,
    offset: u64,
}

/// Tracks bound resources for one command list and lazily allocates/writes descriptor sets.
/// Single-threaded: tied to the recording thread, requires no lock (§5 concurrency model).
pub struct DescriptorBinder {
    cbv: [CbvSlot; MAX_CBV_SLOTS],
    srv: [vk::ImageView; MAX_SRV_SLOTS],
    sampler: [vk::Sampler; MAX_SAMPLER_SLOTS],
    dirty: bool,
    current_set: Option<vk::DescriptorSet>,
    pool: vk::DescriptorPool,
    pool_capacity: u32,
    pool_used: u32,
    pool_growth_attempts: u32,
}

impl DescriptorBinder {
    pub fn new(device: &ash::Device, initial_capacity: u32) -> Result<Self, RhiError> {
        let pool = create_pool(device, initial_capacity)?;
        Ok(Self {
            cbv: [CbvSlot::default(); MAX_CBV_SLOTS],
            srv: [vk::ImageView::null(); MAX_SRV_SLOTS],
            sampler: [vk::Sampler::null(); MAX_SAMPLER_SLOTS],
            dirty: true,
            current_set: None,
            pool,
            pool_capacity: initial_capacity,
            pool_used: 0,
            pool_growth_attempts: 0,
        })
    }

    /// Called at the start of every `beginCommandList` (§4.3): frees the previous frame's sets
    /// in bulk and clears binding state.
    pub fn reset(&mut self, device: &ash::Device) {
        unsafe {
            let _ = device.reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty());
        }
        self.pool_used = 0;
        self.current_set = None;
        self.dirty = true;
    }

    pub fn bind_constant_buffer(&mut self, slot: usize, buffer: &Buffer, offset: u64) {
        let new = CbvSlot { buffer: buffer.raw, range: buffer.size(), offset };
        if self.cbv[slot].buffer != new.buffer || self.cbv[slot].offset != new.offset {
            self.dirty = true;
        }
        self.cbv[slot] = new;
    }

    pub fn bind_resource(&mut self, slot: usize, texture: &Texture) {
        let view = texture.srv.unwrap_or(vk::ImageView::null());
        if self.srv[slot] != view {
            self.dirty = true;
        }
        self.srv[slot] = view;
    }

    pub fn bind_sampler(&mut self, slot: usize, sampler: &Sampler) {
        if self.sampler[slot] != sampler.raw {
            self.dirty = true;
        }
        self.sampler[slot] = sampler.raw;
    }

    /// Called before every draw. Rebinds with current dynamic offsets when nothing changed;
    /// otherwise allocates a fresh descriptor set (growing the pool on `ErrorOutOfPoolMemory`)
    /// and writes one `VkWriteDescriptorSet` per pipeline binding.
    pub fn flush(
        &mut self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        pipeline: &crate::pipeline::PipelineState,
        pipeline_vk: vk::Pipeline,
    ) -> Result<(), RhiError> {
        if self.dirty || self.current_set.is_none() {
            let set = self.allocate_set(device, pipeline.descriptor_set_layout)?;
            self.write_set(device, set, pipeline);
            self.current_set = Some(set);
            self.dirty = false;
        }
        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline_vk);
        }
        let dynamic_offsets: Vec<u32> = pipeline
            .bindings
            .iter()
            .filter(|b| b.kind == DescriptorKind::DynamicUniformBuffer)
            .map(|b| self.cbv[b.binding as usize].offset as u32)
            .collect();
        unsafe {
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline_layout,
                0,
                &[self.current_set.unwrap()],
                &dynamic_offsets,
            );
        }
        Ok(())
    }

    fn allocate_set(&mut self, device: &ash::Device, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet, RhiError> {
        let layouts = [layout];
        let mut attempts = 0;
        loop {
            let alloc_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(self.pool).set_layouts(&layouts);
            match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
                Ok(sets) => {
                    self.pool_used += 1;
                    return Ok(sets[0]);
                }
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    attempts += 1;
                    self.pool_growth_attempts += 1;
                    match next_attempt(attempts) {
                        AllocAttempt::Exhausted { attempts } => return Err(RhiError::DescriptorPoolExhausted { attempts }),
                        AllocAttempt::Retry => self.grow_pool(device)?,
                    }
                }
                Err(e) => return Err(RhiError::ResourceCreation(e.to_string())),
            }
        }
    }

    fn grow_pool(&mut self, device: &ash::Device) -> Result<(), RhiError> {
        let new_capacity = next_capacity(self.pool_capacity);
        let new_pool = create_pool(device, new_capacity)?;
        let old_pool = std::mem::replace(&mut self.pool, new_pool);
        unsafe { device.destroy_descriptor_pool(old_pool, None) };
        self.pool_capacity = new_capacity;
        self.pool_used = 0;
        Ok(())
    }

    fn write_set(&self, device: &ash::Device, set: vk::DescriptorSet, pipeline: &crate::pipeline::PipelineState) {
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for b in &pipeline.bindings {
            match b.kind {
                DescriptorKind::UniformBuffer | DescriptorKind::DynamicUniformBuffer => {
                    let slot = self.cbv[b.binding as usize];
                    let range = b.block_size.map(|s| s as u64).unwrap_or(vk::WHOLE_SIZE);
                    buffer_infos.push((b.binding, b.kind, vk::DescriptorBufferInfo {
                        buffer: slot.buffer,
                        offset: 0,
                        range,
                    }));
                }
                DescriptorKind::CombinedImageSampler => {
                    image_infos.push((b.binding, vk::DescriptorImageInfo {
                        sampler: self.sampler[b.binding as usize],
                        image_view: self.srv[b.binding as usize],
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    }));
                }
            }
        }

        let mut writes = Vec::with_capacity(buffer_infos.len() + image_infos.len());
        for (binding, kind, info) in &buffer_infos {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(match kind {
                        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
                        _ => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                    })
                    .buffer_info(std::slice::from_ref(info)),
            );
        }
        for (binding, info) in &image_infos {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info)),
            );
        }
        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }
}

/// Retry/backoff decision for [`DescriptorBinder::allocate_set`]'s growth loop (property 6: pool
/// growth hides `ERROR_OUT_OF_POOL_MEMORY` from callers, up to a cap). Pulled out as a pure
/// function so the policy is testable without a real `ash::Device`.
enum AllocAttempt {
    Retry,
    Exhausted { attempts: u32 },
}

fn next_attempt(attempts: u32) -> AllocAttempt {
    if attempts > 8 {
        AllocAttempt::Exhausted { attempts }
    } else {
        AllocAttempt::Retry
    }
}

fn next_capacity(current: u32) -> u32 {
    current * 2
}

fn create_pool(device: &ash::Device, capacity: u32) -> Result<vk::DescriptorPool, RhiError> {
    let sizes = [
        vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, descriptor_count: capacity * MAX_CBV_SLOTS as u32 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: capacity * MAX_CBV_SLOTS as u32 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER, descriptor_count: capacity * MAX_SRV_SLOTS as u32 },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(capacity)
        .pool_sizes(&sizes)
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);
    unsafe { device.create_descriptor_pool(&info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_sizing_matches_spec() {
        assert_eq!(MAX_CBV_SLOTS, 14);
        assert_eq!(MAX_SRV_SLOTS, 14);
        assert_eq!(MAX_SAMPLER_SLOTS, 14);
    }

    /// Property 6: repeated `ERROR_OUT_OF_POOL_MEMORY` is absorbed by growing the pool, not
    /// surfaced to the caller, until the retry cap is hit.
    #[test]
    fn pool_growth_retries_eight_times_before_exhausting() {
        for attempts in 1..=8 {
            assert!(matches!(next_attempt(attempts), AllocAttempt::Retry));
        }
        match next_attempt(9) {
            AllocAttempt::Exhausted { attempts } => assert_eq!(attempts, 9),
            AllocAttempt::Retry => panic!("expected exhaustion on the 9th attempt"),
        }
    }

    #[test]
    fn pool_capacity_doubles_on_each_growth() {
        assert_eq!(next_capacity(16), 32);
        assert_eq!(next_capacity(32), 64);
    }
}
