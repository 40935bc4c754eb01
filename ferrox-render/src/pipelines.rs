//! Process-wide pipeline-state and sampler tables (§4.10: "Pipeline-state and sampler tables
//! are process-wide, created at init; shader reload clears the dynamic pipeline cache and
//! rebuilds the pipelines on next validate").

use std::collections::HashMap;
use std::sync::Arc;

use ferrox_rhi::device::Device;
use ferrox_rhi::pipeline::{DepthStencilDesc, PipelineStateDesc, RasterizerDesc, VertexAttributeDesc};
use ferrox_rhi::resources::sampler::{Sampler, SamplerDesc};
use ferrox_rhi::resources::shader::Shader;
use ferrox_rhi::{CullMode, FrontFace, PipelineState, PrimitiveTopology, RhiError, VertexFormat};
use ferrox_scene::components::MaterialShader;

/// One (vertex, fragment) program supplied by the resource cache / loader — a shader program
/// is an external collaborator (§1), so the renderer only ever consumes already-compiled
/// `Shader` handles, never source.
#[derive(Clone)]
pub struct ShaderProgram {
    pub vs: Arc<Shader>,
    pub fs: Arc<Shader>,
}

/// Every shader program the renderer's fixed pass set needs. Callers build this from whatever
/// the resource cache (§4.2) hands back.
pub struct RendererShaders {
    pub brdf: ShaderProgram,
    pub disney_brdf: ShaderProgram,
    pub unlit: ShaderProgram,
    pub terrain: ShaderProgram,
    pub sky: ShaderProgram,
    pub debug_wire: ShaderProgram,
    pub debug_icon: ShaderProgram,
    pub outline: ShaderProgram,
}

fn mesh_attributes(with_vertex_colors: bool) -> Vec<VertexAttributeDesc> {
    let mut attrs = vec![
        VertexAttributeDesc { location: 0, binding: 0, format: VertexFormat::Float32x3, offset: ferrox_rhi::APPEND_ALIGNED_ELEMENT },
        VertexAttributeDesc { location: 1, binding: 0, format: VertexFormat::Uint32, offset: ferrox_rhi::APPEND_ALIGNED_ELEMENT },
    ];
    if with_vertex_colors {
        attrs.push(VertexAttributeDesc { location: 2, binding: 1, format: VertexFormat::Unorm8x4, offset: ferrox_rhi::APPEND_ALIGNED_ELEMENT });
    }
    attrs
}

/// Material pipelines are keyed by shader variant and whether the mesh's color stream is
/// bound, since the vertex-input layout (not just the fragment program) differs between the
/// two (§3 `Material.flags: uses vertex colors`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct OpaqueKey {
    shader: MaterialShaderKey,
    with_vertex_colors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MaterialShaderKey {
    Brdf,
    DisneyBrdf,
    Unlit,
    Terrain,
}

fn key_of(shader: MaterialShader) -> MaterialShaderKey {
    match shader {
        MaterialShader::Brdf => MaterialShaderKey::Brdf,
        MaterialShader::DisneyBrdf => MaterialShaderKey::DisneyBrdf,
        MaterialShader::Unlit => MaterialShaderKey::Unlit,
        MaterialShader::Terrain => MaterialShaderKey::Terrain,
    }
}

pub struct PipelineTable {
    opaque: HashMap<OpaqueKey, PipelineState>,
    pub sky: PipelineState,
    pub debug_wire: PipelineState,
    pub debug_icon: PipelineState,
    pub outline: PipelineState,
}

impl PipelineTable {
    pub fn new(device: &Device, shaders: &RendererShaders) -> Result<Self, RhiError> {
        let mut opaque = HashMap::new();
        for (key, program) in [
            (MaterialShaderKey::Brdf, &shaders.brdf),
            (MaterialShaderKey::DisneyBrdf, &shaders.disney_brdf),
            (MaterialShaderKey::Unlit, &shaders.unlit),
            (MaterialShaderKey::Terrain, &shaders.terrain),
        ] {
            for with_vertex_colors in [false, true] {
                let pso = device.create_pipeline_state(PipelineStateDesc {
                    vs: Some(program.vs.clone()),
                    fs: Some(program.fs.clone()),
                    gs: None,
                    attributes: mesh_attributes(with_vertex_colors),
                    topology: PrimitiveTopology::TriangleList,
                    rasterizer: RasterizerDesc { cull_mode: CullMode::Back, front_face: FrontFace::CounterClockwise, wireframe: false },
                    depth_stencil: DepthStencilDesc { stencil_test: true, ..Default::default() },
                    label: None,
                })?;
                opaque.insert(OpaqueKey { shader: key, with_vertex_colors }, pso);
            }
        }

        let sky = device.create_pipeline_state(PipelineStateDesc {
            vs: Some(shaders.sky.vs.clone()),
            fs: Some(shaders.sky.fs.clone()),
            gs: None,
            attributes: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerDesc { cull_mode: CullMode::None, front_face: FrontFace::Clockwise, wireframe: false },
            depth_stencil: DepthStencilDesc {
                depth_test: true,
                depth_write: false,
                depth_compare: ferrox_rhi::CompareOp::GreaterEqual,
                stencil_test: true,
                ..Default::default()
            },
            label: Some("sky"),
        })?;

        let debug_wire = device.create_pipeline_state(PipelineStateDesc {
            vs: Some(shaders.debug_wire.vs.clone()),
            fs: Some(shaders.debug_wire.fs.clone()),
            gs: None,
            attributes: vec![VertexAttributeDesc { location: 0, binding: 0, format: VertexFormat::Float32x3, offset: 0 }],
            topology: PrimitiveTopology::LineList,
            rasterizer: RasterizerDesc { cull_mode: CullMode::None, front_face: FrontFace::CounterClockwise, wireframe: false },
            depth_stencil: DepthStencilDesc { depth_write: false, ..Default::default() },
            label: Some("debug_wire"),
        })?;

        let debug_icon = device.create_pipeline_state(PipelineStateDesc {
            vs: Some(shaders.debug_icon.vs.clone()),
            fs: Some(shaders.debug_icon.fs.clone()),
            gs: None,
            attributes: vec![VertexAttributeDesc { location: 0, binding: 0, format: VertexFormat::Float32x3, offset: 0 }],
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerDesc { cull_mode: CullMode::None, front_face: FrontFace::CounterClockwise, wireframe: false },
            depth_stencil: DepthStencilDesc { depth_write: false, ..Default::default() },
            label: Some("debug_icon"),
        })?;

        let outline = device.create_pipeline_state(PipelineStateDesc {
            vs: Some(shaders.outline.vs.clone()),
            fs: Some(shaders.outline.fs.clone()),
            gs: None,
            attributes: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            rasterizer: RasterizerDesc { cull_mode: CullMode::None, front_face: FrontFace::CounterClockwise, wireframe: false },
            depth_stencil: DepthStencilDesc { depth_test: false, depth_write: false, stencil_test: false, ..Default::default() },
            label: Some("outline"),
        })?;

        Ok(Self { opaque, sky, debug_wire, debug_icon, outline })
    }

    pub fn opaque(&self, shader: MaterialShader, with_vertex_colors: bool) -> &PipelineState {
        self.opaque
            .get(&OpaqueKey { shader: key_of(shader), with_vertex_colors })
            .expect("every MaterialShader variant has a pipeline built at init")
    }

    /// Drops every dynamic `VkPipeline` in every table entry. Called after a shader hot-reload
    /// (§4.10); the next `drawScene`/`drawSky`/etc. rebuilds lazily via `validatePSO`.
    pub fn invalidate_all(&self) {
        for pso in self.opaque.values() {
            pso.invalidate_dynamic_cache();
        }
        self.sky.invalidate_dynamic_cache();
        self.debug_wire.invalidate_dynamic_cache();
        self.debug_icon.invalidate_dynamic_cache();
        self.outline.invalidate_dynamic_cache();
    }
}

/// Process-wide sampler table. Only the point-clamp sampler used by the outline pass is named
/// in §4.10; kept as a small table (not a single field) so future fullscreen passes can add
/// entries without touching the renderer's struct layout.
pub struct SamplerTable {
    pub point_clamp: Sampler,
}

impl SamplerTable {
    pub fn new(device: &Device) -> Result<Self, RhiError> {
        Ok(Self { point_clamp: device.create_sampler(SamplerDesc::point_clamp())? })
    }
}
