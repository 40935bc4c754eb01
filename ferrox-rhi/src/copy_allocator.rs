//! Asynchronous staging + transfer queue with timeline-semaphore sync (C6).

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;

use crate::error::RhiError;

struct StagingBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    capacity: u64,
}

unsafe impl Send for StagingBuffer {}

/// One command buffer plus its upload staging buffer, identified by capacity so `allocate`
/// can find the smallest free one that fits a request.
struct CopyCommand {
    cmd: vk::CommandBuffer,
    staging: StagingBuffer,
    target_value: u64,
}

/// Owns the transfer queue, a timeline semaphore, and three pools of command buffers (`free`,
/// `work`, `submit`) keyed by staging-buffer size. `flush` submits every pending CB in one
/// batch, signaling the timeline semaphore to the max assigned target value, and returns that
/// value so the graphics submit can wait on it.
pub struct CopyAllocator {
    device: Arc<ash::Device>,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    timeline: vk::Semaphore,
    next_target: std::sync::atomic::AtomicU64,
    free: std::sync::Mutex<Vec<CopyCommand>>,
    work: std::sync::Mutex<Vec<CopyCommand>>,
    submitted: std::sync::Mutex<VecDeque<CopyCommand>>,
    memory_type_index: u32,
}

impl CopyAllocator {
    pub fn new(
        device: Arc<ash::Device>,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue: vk::Queue,
        queue_family: u32,
    ) -> Result<Self, RhiError> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))?;

        let mut timeline_info = vk::SemaphoreTypeCreateInfo::default().semaphore_type(vk::SemaphoreType::TIMELINE).initial_value(0);
        let semaphore_info = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_info);
        let timeline = unsafe { device.create_semaphore(&semaphore_info, None) }
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))?;

        let memory_type_index = crate::vulkan::find_memory_type(
            instance,
            physical_device,
            u32::MAX,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .ok_or(RhiError::NoSuitableDevice)?;

        Ok(Self {
            device,
            queue,
            command_pool,
            timeline,
            next_target: std::sync::atomic::AtomicU64::new(0),
            free: std::sync::Mutex::new(Vec::new()),
            work: std::sync::Mutex::new(Vec::new()),
            submitted: std::sync::Mutex::new(VecDeque::new()),
            memory_type_index,
        })
    }

    /// Returns a command buffer with a staging buffer of at least `size` bytes, reusing the
    /// smallest free one that fits or allocating a new CB with an Upload staging buffer sized
    /// to the next power of two.
    pub fn allocate(&self, size: u64) -> Result<vk::CommandBuffer, RhiError> {
        let mut free = self.free.lock().unwrap();
        let capacities: Vec<u64> = free.iter().map(|c| c.staging.capacity).collect();
        let best_index = best_fit_index(&capacities, size);

        let command = if let Some(i) = best_index {
            free.remove(i)
        } else {
            drop(free);
            self.create_command(staging_size_for(size))?
        };

        let cmd = command.cmd;
        unsafe {
            self.device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()).ok();
            let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            let _ = self.device.begin_command_buffer(cmd, &begin_info);
        }
        self.work.lock().unwrap().push(command);
        Ok(cmd)
    }

    /// Writes `data` into the command buffer's mapped staging buffer at `offset`.
    pub fn write_staging(&self, cmd: vk::CommandBuffer, offset: u64, data: &[u8]) {
        let work = self.work.lock().unwrap();
        if let Some(c) = work.iter().find(|c| c.cmd == cmd) {
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), c.staging.mapped.add(offset as usize), data.len());
            }
        }
    }

    pub fn staging_buffer(&self, cmd: vk::CommandBuffer) -> Option<vk::Buffer> {
        self.work.lock().unwrap().iter().find(|c| c.cmd == cmd).map(|c| c.staging.buffer)
    }

    /// Assigns `cmd` a monotonically increasing target timeline value and defers the actual
    /// submit until `flush`.
    pub fn submit(&self, cmd: vk::CommandBuffer) -> u64 {
        let target = self.next_target.fetch_add(1, std::sync::atomic::Ordering::AcqRel) + 1;
        let mut work = self.work.lock().unwrap();
        if let Some(pos) = work.iter().position(|c| c.cmd == cmd) {
            let mut command = work.remove(pos);
            command.target_value = target;
            unsafe {
                let _ = self.device.end_command_buffer(cmd);
            }
            self.submitted.lock().unwrap().push_back(command);
        }
        target
    }

    /// Submits every pending command buffer in one batch, signaling the timeline semaphore to
    /// the maximum assigned target value; reclaims already-completed CBs back into the free
    /// pool and returns the last signaled value so the first graphics submit of the frame can
    /// add it as a wait.
    pub fn flush(&self) -> u64 {
        let mut submitted = self.submitted.lock().unwrap();
        let max_target = submitted.iter().map(|c| c.target_value).max().unwrap_or(0);

        if !submitted.is_empty() {
            let cmds: Vec<vk::CommandBuffer> = submitted.iter().map(|c| c.cmd).collect();
            let signal_values = [max_target];
            let mut timeline_submit = vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
            let signal_semaphores = [self.timeline];
            let submit_info = vk::SubmitInfo::default()
                .command_buffers(&cmds)
                .signal_semaphores(&signal_semaphores)
                .push_next(&mut timeline_submit);
            unsafe {
                let _ = self.device.queue_submit(self.queue, std::slice::from_ref(&submit_info), vk::Fence::null());
            }
        }

        let completed = unsafe { self.device.get_semaphore_counter_value(self.timeline) }.unwrap_or(0);
        let mut free = self.free.lock().unwrap();
        submitted.retain(|c| {
            if c.target_value <= completed {
                // SAFETY: staging buffers are plain-old-data blobs reused across frames; moving
                // the struct itself (not aliasing the memory while in flight) is fine here
                // because retain only removes entries whose GPU work already completed.
                false
            } else {
                true
            }
        });
        // Rebuild the free list from entries that just completed.
        while let Some(front) = submitted.front() {
            if front.target_value <= completed {
                free.push(submitted.pop_front().unwrap());
            } else {
                break;
            }
        }
        max_target
    }

    fn create_command(&self, staging_size: u64) -> Result<CopyCommand, RhiError> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))?[0];

        let buffer_info = vk::BufferCreateInfo::default().size(staging_size).usage(vk::BufferUsageFlags::TRANSFER_SRC).sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
        let reqs = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let alloc = vk::MemoryAllocateInfo::default().allocation_size(reqs.size).memory_type_index(self.memory_type_index);
        let memory = unsafe { self.device.allocate_memory(&alloc, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
        unsafe { self.device.bind_buffer_memory(buffer, memory, 0) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
        let mapped = unsafe { self.device.map_memory(memory, 0, staging_size, vk::MemoryMapFlags::empty()) }
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))? as *mut u8;

        Ok(CopyCommand {
            cmd,
            staging: StagingBuffer { buffer, memory, mapped, capacity: staging_size },
            target_value: 0,
        })
    }
}

/// Smallest staging-buffer capacity that still fits `size`, so reuse never wastes more than it
/// has to. Pulled out of `allocate` so S6's selection order is testable without a real device.
fn best_fit_index(capacities: &[u64], size: u64) -> Option<usize> {
    capacities.iter().enumerate().filter(|(_, &c)| c >= size).min_by_key(|(_, &c)| c).map(|(i, _)| i)
}

/// Rounds a fresh staging buffer's size up to the next power of two, floored at 64 KiB, so
/// repeated allocations of similar sizes converge on a small set of reusable capacities.
fn staging_size_for(requested: u64) -> u64 {
    requested.next_power_of_two().max(64 * 1024)
}

impl Drop for CopyAllocator {
    fn drop(&mut self) {
        let mut all: Vec<CopyCommand> = Vec::new();
        all.append(&mut self.free.lock().unwrap());
        all.append(&mut self.work.lock().unwrap());
        all.append(&mut self.submitted.lock().unwrap().drain(..).collect());
        for c in all {
            unsafe {
                self.device.unmap_memory(c.staging.memory);
                self.device.destroy_buffer(c.staging.buffer, None);
                self.device.free_memory(c.staging.memory, None);
            }
        }
        unsafe {
            self.device.destroy_semaphore(self.timeline, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6: `allocate` reuses the smallest free staging buffer that still fits the request,
    /// rather than the first one found or the largest.
    #[test]
    fn best_fit_index_picks_smallest_capacity_that_still_fits() {
        let capacities = [256 * 1024, 64 * 1024, 128 * 1024];
        assert_eq!(best_fit_index(&capacities, 100 * 1024), Some(2));
        assert_eq!(best_fit_index(&capacities, 64 * 1024), Some(1));
    }

    #[test]
    fn best_fit_index_is_none_when_nothing_fits() {
        let capacities = [4 * 1024, 8 * 1024];
        assert_eq!(best_fit_index(&capacities, 64 * 1024), None);
    }

    #[test]
    fn staging_size_rounds_up_to_power_of_two_floored_at_64kib() {
        assert_eq!(staging_size_for(1), 64 * 1024);
        assert_eq!(staging_size_for(64 * 1024), 64 * 1024);
        assert_eq!(staging_size_for(64 * 1024 + 1), 128 * 1024);
        assert_eq!(staging_size_for(200 * 1024), 256 * 1024);
    }
}
