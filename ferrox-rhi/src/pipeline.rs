//! Pipeline state objects (§4.4) and the two caches they rely on: a pipeline-layout cache
//! keyed on merged binding hash, and a per-PSO dynamic `VkPipeline` cache keyed on
//! `(pso_hash, vertex_strides_hash, render_pass_hash)` (§4.5 `validatePSO`).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use ash::vk;

use crate::error::RhiError;
use crate::handle::{AllocationTracker, FreeItem};
use crate::resources::shader::{DescriptorKind, ReflectedBinding, Shader};
use crate::types::{CompareOp, CullMode, FrontFace, PrimitiveTopology, VertexFormat, APPEND_ALIGNED_ELEMENT};

#[derive(Debug, Clone, Copy)]
pub struct VertexAttributeDesc {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    /// `APPEND_ALIGNED_ELEMENT` auto-computes the offset by summing prior attribute sizes on
    /// the same binding, in declaration order.
    pub offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RasterizerDesc {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub wireframe: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DepthStencilDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub stencil_test: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            // Reversed-Z convention: nearer pixels have larger depth values.
            depth_compare: CompareOp::Greater,
            stencil_test: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
        }
    }
}

#[derive(Clone)]
pub struct PipelineStateDesc {
    pub vs: Option<Arc<Shader>>,
    pub fs: Option<Arc<Shader>>,
    pub gs: Option<Arc<Shader>>,
    pub attributes: Vec<VertexAttributeDesc>,
    pub topology: PrimitiveTopology,
    pub rasterizer: RasterizerDesc,
    pub depth_stencil: DepthStencilDesc,
    pub label: Option<&'static str>,
}

/// Binding merged from every attached shader stage: binding index/descriptor type/count must
/// agree across stages that share it, and stage flags are OR'd.
#[derive(Debug, Clone, Copy)]
pub struct MergedBinding {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
    pub block_size: Option<u32>,
}

fn merge_bindings(desc: &PipelineStateDesc) -> Result<Vec<MergedBinding>, RhiError> {
    let mut merged: HashMap<u32, MergedBinding> = HashMap::new();
    for (shader, stage_flags) in [
        (desc.vs.as_deref(), vk::ShaderStageFlags::VERTEX),
        (desc.fs.as_deref(), vk::ShaderStageFlags::FRAGMENT),
        (desc.gs.as_deref(), vk::ShaderStageFlags::GEOMETRY),
    ] {
        let Some(shader) = shader else { continue };
        for b in &shader.reflection.bindings {
            merge_one(&mut merged, b, stage_flags)?;
        }
    }
    let mut out: Vec<MergedBinding> = merged.into_values().collect();
    // Dynamic-UBO slots sort ascending so `vkCmdBindDescriptorSets`' dynamic-offset array lines
    // up with the order the binder supplies offsets in (§4.5).
    out.sort_by_key(|b| b.binding);
    Ok(out)
}

fn merge_one(
    merged: &mut HashMap<u32, MergedBinding>,
    b: &ReflectedBinding,
    stage_flags: vk::ShaderStageFlags,
) -> Result<(), RhiError> {
    match merged.get_mut(&b.binding) {
        Some(existing) => {
            if existing.kind != b.kind || existing.count != b.count {
                return Err(RhiError::ResourceCreation(format!(
                    "binding {} disagrees on type/count between shader stages",
                    b.binding
                )));
            }
            existing.stages |= stage_flags;
        }
        None => {
            merged.insert(
                b.binding,
                MergedBinding { binding: b.binding, kind: b.kind, count: b.count, stages: stage_flags, block_size: b.block_size },
            );
        }
    }
    Ok(())
}

fn binding_hash(bindings: &[MergedBinding]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for b in bindings {
        (b.binding, b.kind, b.count, b.stages.as_raw()).hash(&mut hasher);
    }
    hasher.finish()
}

fn descriptor_type_of(kind: DescriptorKind) -> vk::DescriptorType {
    match kind {
        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorKind::DynamicUniformBuffer => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

struct CachedLayout {
    set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
}

/// Process-wide cache of `(VkDescriptorSetLayout, VkPipelineLayout)` keyed by merged binding
/// hash, so pipelines with identical binding shapes share one layout.
pub struct PipelineLayoutCache {
    tracker: Arc<AllocationTracker>,
    entries: Mutex<HashMap<u64, CachedLayout>>,
}

impl PipelineLayoutCache {
    pub fn new(tracker: Arc<AllocationTracker>) -> Self {
        Self { tracker, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get_or_create(
        &self,
        bindings: &[MergedBinding],
    ) -> Result<(u64, vk::DescriptorSetLayout, vk::PipelineLayout), RhiError> {
        let hash = binding_hash(bindings);
        let mut entries = self.entries.lock().unwrap();
        if let Some(cached) = entries.get(&hash) {
            return Ok((hash, cached.set_layout, cached.pipeline_layout));
        }

        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_of(b.kind))
                    .descriptor_count(b.count)
                    .stage_flags(b.stages)
            })
            .collect();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let set_layout = unsafe { self.tracker.device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(|e| RhiError::ResourceCreation(e.to_string()))?;

        let set_layouts = [set_layout];
        // One push-constant range, sized for the largest user of it (`OutlinePushConstants`,
        // two vec4s): cheaper than threading a per-pipeline push-constant size through
        // `PipelineStateDesc` for the single pass that needs it (§4.10 `postprocessOutline`).
        let push_constant_ranges =
            [vk::PushConstantRange::default().stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT).offset(0).size(32)];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let pipeline_layout = unsafe { self.tracker.device.create_pipeline_layout(&pipeline_layout_info, None) }
            .map_err(|e| {
                unsafe { self.tracker.device.destroy_descriptor_set_layout(set_layout, None) };
                RhiError::ResourceCreation(e.to_string())
            })?;

        entries.insert(hash, CachedLayout { set_layout, pipeline_layout });
        Ok((hash, set_layout, pipeline_layout))
    }
}

impl Drop for PipelineLayoutCache {
    fn drop(&mut self) {
        for cached in self.entries.get_mut().unwrap().values() {
            self.tracker.retire(FreeItem::PipelineLayout(cached.pipeline_layout));
            self.tracker.retire(FreeItem::DescriptorSetLayout(cached.set_layout));
        }
    }
}

/// A pipeline state object: shader stages, rasterizer/depth-stencil/input-assembly state, and
/// the derived pipeline layout. The concrete `VkPipeline` is *not* created here (§4.4) — it is
/// built lazily by [`PipelineState::validate`] the first time a given render pass / vertex
/// stride combination is drawn with it.
pub struct PipelineState {
    pub desc: PipelineStateDesc,
    pub bindings: Vec<MergedBinding>,
    pub binding_hash: u64,
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    dynamic_cache: Mutex<HashMap<u64, vk::Pipeline>>,
    tracker: Arc<AllocationTracker>,
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState").field("bindings", &self.bindings.len()).finish()
    }
}

impl PipelineState {
    pub fn create(
        tracker: Arc<AllocationTracker>,
        layouts: &PipelineLayoutCache,
        desc: PipelineStateDesc,
    ) -> Result<Self, RhiError> {
        if desc.vs.is_none() {
            return Err(RhiError::NullShaderStage);
        }
        let bindings = merge_bindings(&desc)?;
        let (binding_hash, descriptor_set_layout, pipeline_layout) = layouts.get_or_create(&bindings)?;
        Ok(Self {
            desc,
            bindings,
            binding_hash,
            descriptor_set_layout,
            pipeline_layout,
            dynamic_cache: Mutex::new(HashMap::new()),
            tracker,
        })
    }

    /// `validatePSO` (§4.5): composes `pso.hash ^ render_pass.hash ^ vertex_strides_hash`,
    /// returning the cached `VkPipeline` on a hit or building (and caching) a new one.
    pub fn validate(
        &self,
        render_pass: &crate::render_pass::RenderPass,
        vertex_strides: &[u32],
    ) -> Result<vk::Pipeline, RhiError> {
        let strides_hash = hash_strides(vertex_strides);
        let key = self.binding_hash ^ render_pass.hash ^ strides_hash;
        {
            let cache = self.dynamic_cache.lock().unwrap();
            if let Some(&pipeline) = cache.get(&key) {
                return Ok(pipeline);
            }
        }
        let pipeline = self.build_pipeline(render_pass, vertex_strides)?;
        self.dynamic_cache.lock().unwrap().insert(key, pipeline);
        Ok(pipeline)
    }

    /// Drops every cached `VkPipeline`. Called after a shader hot-reload so the next
    /// `validate` rebuilds against the freshly compiled modules.
    pub fn invalidate_dynamic_cache(&self) {
        let mut cache = self.dynamic_cache.lock().unwrap();
        for (_, pipeline) in cache.drain() {
            self.tracker.retire(FreeItem::Pipeline(pipeline));
        }
    }

    fn build_pipeline(
        &self,
        render_pass: &crate::render_pass::RenderPass,
        vertex_strides: &[u32],
    ) -> Result<vk::Pipeline, RhiError> {
        let device = &self.tracker.device;

        let mut stages = Vec::new();
        let entry_point = std::ffi::CStr::from_bytes_with_nul(b"main\0").unwrap();
        if let Some(vs) = &self.desc.vs {
            stages.push(vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::VERTEX).module(vs.raw).name(entry_point));
        }
        if let Some(fs) = &self.desc.fs {
            stages.push(vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::FRAGMENT).module(fs.raw).name(entry_point));
        }
        if let Some(gs) = &self.desc.gs {
            stages.push(vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::GEOMETRY).module(gs.raw).name(entry_point));
        }

        let (bindings, attributes) = build_vertex_input(&self.desc.attributes, vertex_strides);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let topology = match self.desc.topology {
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(topology);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);

        let cull_mode = match self.desc.rasterizer.cull_mode {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        };
        let front_face = match self.desc.rasterizer.front_face {
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        };
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(if self.desc.rasterizer.wireframe { vk::PolygonMode::LINE } else { vk::PolygonMode::FILL })
            .cull_mode(cull_mode)
            .front_face(front_face)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_compare = compare_op_to_vk(self.desc.depth_stencil.depth_compare);
        let stencil_op_state = vk::StencilOpState::default()
            .compare_op(vk::CompareOp::ALWAYS)
            .fail_op(vk::StencilOp::KEEP)
            .pass_op(vk::StencilOp::REPLACE)
            .depth_fail_op(vk::StencilOp::KEEP)
            .compare_mask(self.desc.depth_stencil.stencil_read_mask as u32)
            .write_mask(self.desc.depth_stencil.stencil_write_mask as u32);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.desc.depth_stencil.depth_test)
            .depth_write_enable(self.desc.depth_stencil.depth_write)
            .depth_compare_op(depth_compare)
            .stencil_test_enable(self.desc.depth_stencil.stencil_test)
            .front(stencil_op_state)
            .back(stencil_op_state);

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = render_pass
            .desc
            .attachments
            .iter()
            .filter(|a| a.kind == crate::render_pass::AttachmentKind::RenderTarget)
            .map(|_| vk::PipelineColorBlendAttachmentState::default().color_write_mask(vk::ColorComponentFlags::RGBA))
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR, vk::DynamicState::STENCIL_REFERENCE];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(self.pipeline_layout)
            .render_pass(render_pass.raw)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
        }
        .map_err(|(_, e)| RhiError::ResourceCreation(e.to_string()))?;
        Ok(pipelines[0])
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        self.invalidate_dynamic_cache();
        // The pipeline layout and descriptor set layout are owned by the shared
        // `PipelineLayoutCache`, not by this PSO; they are freed when the cache drops.
    }
}

fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_strides_is_deterministic_and_order_sensitive() {
        assert_eq!(hash_strides(&[12, 8]), hash_strides(&[12, 8]));
        assert_ne!(hash_strides(&[12, 8]), hash_strides(&[8, 12]));
        assert_ne!(hash_strides(&[12, 8]), hash_strides(&[12, 16]));
    }

    /// Property 8: `validate`'s cache key is `pso.hash ^ render_pass.hash ^ strides_hash` (§4.5)
    /// — identical triples must collide, and changing any one element must not.
    #[test]
    fn validate_pso_cache_key_matches_iff_all_three_inputs_match() {
        let binding_hash_a = 0xAAAA_AAAA_u64;
        let binding_hash_b = 0xBBBB_BBBB_u64;
        let render_pass_hash_a = 0x1111_u64;
        let render_pass_hash_b = 0x2222_u64;
        let strides_hash_a = hash_strides(&[12, 8]);
        let strides_hash_b = hash_strides(&[24]);

        let key = |bh: u64, rph: u64, sh: u64| bh ^ rph ^ sh;

        let base = key(binding_hash_a, render_pass_hash_a, strides_hash_a);
        assert_eq!(base, key(binding_hash_a, render_pass_hash_a, strides_hash_a));
        assert_ne!(base, key(binding_hash_b, render_pass_hash_a, strides_hash_a));
        assert_ne!(base, key(binding_hash_a, render_pass_hash_b, strides_hash_a));
        assert_ne!(base, key(binding_hash_a, render_pass_hash_a, strides_hash_b));
    }

    #[test]
    fn build_vertex_input_auto_computes_append_aligned_offsets() {
        let attrs = vec![
            VertexAttributeDesc { location: 0, binding: 0, format: VertexFormat::Float32x3, offset: APPEND_ALIGNED_ELEMENT },
            VertexAttributeDesc { location: 1, binding: 0, format: VertexFormat::Float32x2, offset: APPEND_ALIGNED_ELEMENT },
            VertexAttributeDesc { location: 2, binding: 0, format: VertexFormat::Float32x4, offset: 0 },
        ];
        let (bindings, vk_attrs) = build_vertex_input(&attrs, &[36]);

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 36);
        assert_eq!(vk_attrs[0].offset, 0);
        assert_eq!(vk_attrs[1].offset, 12);
        assert_eq!(vk_attrs[2].offset, 0);
    }
}

fn vertex_format_to_vk(f: VertexFormat) -> vk::Format {
    match f {
        VertexFormat::Float32 => vk::Format::R32_SFLOAT,
        VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Uint32 => vk::Format::R32_UINT,
        VertexFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
    }
}

fn hash_strides(strides: &[u32]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    strides.hash(&mut hasher);
    hasher.finish()
}

/// Resolves `APPEND_ALIGNED_ELEMENT` offsets by summing prior attribute sizes per binding, in
/// declaration order, then emits one `VkVertexInputBindingDescription` per distinct binding
/// using the command list's recorded vertex-buffer strides.
fn build_vertex_input(
    attrs: &[VertexAttributeDesc],
    vertex_strides: &[u32],
) -> (Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>) {
    let mut next_offset: HashMap<u32, u32> = HashMap::new();
    let mut vk_attrs = Vec::with_capacity(attrs.len());
    let mut seen_bindings: Vec<u32> = Vec::new();

    for a in attrs {
        let offset = if a.offset == APPEND_ALIGNED_ELEMENT {
            let cursor = next_offset.entry(a.binding).or_insert(0);
            let o = *cursor;
            *cursor += a.format.byte_size();
            o
        } else {
            a.offset
        };
        vk_attrs.push(
            vk::VertexInputAttributeDescription::default()
                .location(a.location)
                .binding(a.binding)
                .format(vertex_format_to_vk(a.format))
                .offset(offset),
        );
        if !seen_bindings.contains(&a.binding) {
            seen_bindings.push(a.binding);
        }
    }

    let bindings = seen_bindings
        .into_iter()
        .map(|binding| {
            let stride = vertex_strides.get(binding as usize).copied().unwrap_or(0);
            vk::VertexInputBindingDescription::default()
                .binding(binding)
                .stride(stride)
                .input_rate(vk::VertexInputRate::VERTEX)
        })
        .collect();

    (bindings, vk_attrs)
}
