//! Shared enums and bitflags mirroring the shader-interop contract (§6 of the shader header).

use bitflags::bitflags;

/// Frame-in-flight ring size. Deferred-free entries retire `BUFFER_COUNT` frames after
/// their resource's last reference drops.
pub const BUFFER_COUNT: u32 = 2;

/// Slots shared by the engine and shaders (`std140`, 16-byte aligned).
pub const CBV_SLOT_FRAME: u32 = 0;
pub const CBV_SLOT_CAMERA: u32 = 2;
pub const CBV_SLOT_MISC: u32 = 3;
pub const CBV_SLOT_MATERIAL: u32 = 4;
pub const SRV_SLOT_IMAGE: u32 = 5;

pub const SHADER_MAX_LIGHTSOURCES: usize = 64;

/// Binding-table sizing for the descriptor binder (§4.5).
pub const MAX_CBV_SLOTS: usize = 14;
pub const MAX_SRV_SLOTS: usize = 14;
pub const MAX_SAMPLER_SLOTS: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Default,
    Upload,
    Readback,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const RENDER_TARGET = 1 << 4;
        const DEPTH_STENCIL = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MiscFlags: u32 {
        const RAW = 1 << 0;
        const STRUCTURED = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Tex1D,
    Tex2D,
    Tex3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba8Srgb,
    Bgra8Srgb,
    R32Float,
    R16Float,
    Rgba16Float,
    Rgba32Float,
    D32Float,
    D24UnormS8Uint,
}

impl Format {
    pub fn is_depth(self) -> bool {
        matches!(self, Format::D32Float | Format::D24UnormS8Uint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Undefined,
    TransferDst,
    TransferSrc,
    ShaderResource,
    RenderTarget,
    DepthStencilWrite,
    DepthStencilRead,
    Present,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    LineList,
    PointList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Unorm8x4,
}

impl VertexFormat {
    pub fn byte_size(self) -> u32 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
            VertexFormat::Uint32 => 4,
            VertexFormat::Unorm8x4 => 4,
        }
    }
}

/// Marker for auto-computed vertex attribute offsets, mirroring D3D's `APPEND_ALIGNED_ELEMENT`.
pub const APPEND_ALIGNED_ELEMENT: u32 = u32::MAX;

/// Material shader variant selecting the pipeline used to draw a mesh subset (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MaterialShader {
    Brdf = 0,
    DisneyBrdf = 1,
    Unlit = 2,
    Terrain = 3,
}

/// Light wire-format type tag (§6): `0 = Directional`, `1 = Point`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LightType {
    Directional = 0,
    Point = 1,
}
