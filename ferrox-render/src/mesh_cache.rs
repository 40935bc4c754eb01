//! Lazily uploads each mesh's CPU-side GPU streams (§4.8 phase 4) into RHI buffers the first
//! time it is drawn, keyed by the mesh's entity — the renderer's own small dedup cache,
//! grounded in the same "hash/key once, reuse forever" shape as the resource cache (C2), but
//! keyed by `Entity` rather than a file-name hash since meshes are scene-owned, not file-backed.

use std::collections::HashMap;

use ferrox_rhi::device::Device;
use ferrox_rhi::resources::buffer::{Buffer, BufferDesc};
use ferrox_rhi::{BindFlags, BufferUsage, RhiError};
use ferrox_scene::components::Mesh;
use ferrox_scene::Entity;

pub struct GpuMesh {
    pub position_buffer: Buffer,
    pub color_buffer: Option<Buffer>,
    pub index_buffer: Buffer,
    pub index_count: u32,
}

#[derive(Default)]
pub struct MeshGpuCache {
    entries: HashMap<Entity, GpuMesh>,
}

impl MeshGpuCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached upload for `mesh_entity`, building it from `mesh`'s `gpu_*` streams
    /// on first use. `mesh` must already have its GPU streams built (§4.8 phase 4) — callers
    /// draw only objects whose mesh passed through the scene update graph at least once.
    pub fn get_or_upload(&mut self, device: &Device, mesh_entity: Entity, mesh: &Mesh) -> Result<&GpuMesh, RhiError> {
        if !self.entries.contains_key(&mesh_entity) {
            let uploaded = upload_mesh(device, mesh)?;
            self.entries.insert(mesh_entity, uploaded);
        }
        Ok(self.entries.get(&mesh_entity).unwrap())
    }

    pub fn invalidate(&mut self, mesh_entity: Entity) {
        self.entries.remove(&mesh_entity);
    }
}

fn upload_mesh(device: &Device, mesh: &Mesh) -> Result<GpuMesh, RhiError> {
    let positions = mesh.gpu_positions.as_ref().expect("mesh has no GPU position stream built");
    let position_bytes: &[u8] = bytemuck::cast_slice(positions);
    let position_buffer = device.create_buffer(
        BufferDesc {
            size: position_bytes.len() as u64,
            usage: BufferUsage::Default,
            bind_flags: BindFlags::VERTEX,
            stride: std::mem::size_of::<ferrox_scene::components::PackedPositionNormal>() as u32,
            label: Some("mesh_position_stream"),
            ..Default::default()
        },
        Some(position_bytes),
    )?;

    let color_buffer = match &mesh.gpu_colors {
        Some(colors) => {
            let bytes: &[u8] = bytemuck::cast_slice(colors);
            Some(device.create_buffer(
                BufferDesc {
                    size: bytes.len() as u64,
                    usage: BufferUsage::Default,
                    bind_flags: BindFlags::VERTEX,
                    stride: 4,
                    label: Some("mesh_color_stream"),
                    ..Default::default()
                },
                Some(bytes),
            )?)
        }
        None => None,
    };

    let indices = mesh.gpu_indices.as_ref().expect("mesh has no GPU index stream built");
    let index_bytes: &[u8] = bytemuck::cast_slice(indices);
    let index_buffer = device.create_buffer(
        BufferDesc {
            size: index_bytes.len() as u64,
            usage: BufferUsage::Default,
            bind_flags: BindFlags::INDEX,
            label: Some("mesh_index_stream"),
            ..Default::default()
        },
        Some(index_bytes),
    )?;

    Ok(GpuMesh { position_buffer, color_buffer, index_buffer, index_count: indices.len() as u32 })
}
