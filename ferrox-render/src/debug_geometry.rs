//! Shared geometry for the debug pass (§4.10 `drawDebugScene`): a unit wire cube used for both
//! object-AABB and point-light-AABB overlays, and a unit quad used for the light-icon billboard.

use ferrox_rhi::device::Device;
use ferrox_rhi::resources::buffer::{Buffer, BufferDesc};
use ferrox_rhi::{BindFlags, BufferUsage, RhiError};

/// 8 corners of a `[-0.5, 0.5]^3` cube plus the 12-edge line-list index buffer drawing its
/// wireframe (§4.10: "line-list pso against a shared unit-cube VB/IB").
pub struct UnitWireCube {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub index_count: u32,
}

const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

const CUBE_EDGES: [u32; 24] =
    [0, 1, 1, 2, 2, 3, 3, 0, 4, 5, 5, 6, 6, 7, 7, 4, 0, 4, 1, 5, 2, 6, 3, 7];

impl UnitWireCube {
    pub fn new(device: &Device) -> Result<Self, RhiError> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&CUBE_CORNERS);
        let vertex_buffer = device.create_buffer(
            BufferDesc {
                size: vertex_bytes.len() as u64,
                usage: BufferUsage::Default,
                bind_flags: BindFlags::VERTEX,
                stride: 12,
                label: Some("debug_wire_cube_vb"),
                ..Default::default()
            },
            Some(vertex_bytes),
        )?;
        let index_bytes: &[u8] = bytemuck::cast_slice(&CUBE_EDGES);
        let index_buffer = device.create_buffer(
            BufferDesc {
                size: index_bytes.len() as u64,
                usage: BufferUsage::Default,
                bind_flags: BindFlags::INDEX,
                label: Some("debug_wire_cube_ib"),
                ..Default::default()
            },
            Some(index_bytes),
        )?;
        Ok(Self { vertex_buffer, index_buffer, index_count: CUBE_EDGES.len() as u32 })
    }
}

/// A unit quad (two triangles, XY plane) billboarded toward the camera via the model matrix's
/// rotation block (§4.10: "billboard via an inverse-rotation matrix").
pub struct UnitIconQuad {
    pub vertex_buffer: Buffer,
    pub vertex_count: u32,
}

const QUAD_VERTICES: [[f32; 3]; 6] = [
    [-0.5, -0.5, 0.0],
    [0.5, -0.5, 0.0],
    [0.5, 0.5, 0.0],
    [-0.5, -0.5, 0.0],
    [0.5, 0.5, 0.0],
    [-0.5, 0.5, 0.0],
];

impl UnitIconQuad {
    pub fn new(device: &Device) -> Result<Self, RhiError> {
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        let vertex_buffer = device.create_buffer(
            BufferDesc {
                size: bytes.len() as u64,
                usage: BufferUsage::Default,
                bind_flags: BindFlags::VERTEX,
                stride: 12,
                label: Some("debug_icon_quad_vb"),
                ..Default::default()
            },
            Some(bytes),
        )?;
        Ok(Self { vertex_buffer, vertex_count: QUAD_VERTICES.len() as u32 })
    }
}
