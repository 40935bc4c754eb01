use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use crate::error::RhiError;
use crate::handle::{AllocationTracker, FreeItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl ShaderStage {
    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    UniformBuffer,
    DynamicUniformBuffer,
    CombinedImageSampler,
}

#[derive(Debug, Clone, Copy)]
pub struct ReflectedBinding {
    pub binding: u32,
    pub set: u32,
    pub kind: DescriptorKind,
    pub count: u32,
    /// UBO block size in bytes, `None` for non-buffer bindings.
    pub block_size: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
}

/// Verifies a SPIR-V module is well-formed enough to hand to `vkCreateShaderModule`: size is a
/// multiple of 4 and the first word is the SPIR-V magic number.
pub fn validate_spirv(bytes: &[u8]) -> Result<(), RhiError> {
    if bytes.len() % 4 != 0 || bytes.len() < 20 {
        return Err(RhiError::InvalidShader("size is not a multiple of 4 (or too short for a header)".into()));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != 0x0723_0203 {
        return Err(RhiError::InvalidShader(format!("bad magic number {magic:#x}")));
    }
    Ok(())
}

/// Minimal SPIR-V reflection sufficient to build descriptor-set layouts: walks `OpDecorate`
/// for `Binding`/`DescriptorSet`, `OpVariable` storage classes to classify UBO vs combined
/// image sampler, and `OpTypeStruct` member offsets/sizes for UBO block sizes. Bindings on a
/// non-zero set are rejected per the no-bindless-sets policy (§6).
pub fn reflect(words: &[u32]) -> Result<ShaderReflection, RhiError> {
    let mut decorations_binding: HashMap<u32, u32> = HashMap::new();
    let mut decorations_set: HashMap<u32, u32> = HashMap::new();
    let mut var_storage_class: HashMap<u32, u32> = HashMap::new();
    let mut var_type: HashMap<u32, u32> = HashMap::new();
    let mut pointer_pointee: HashMap<u32, u32> = HashMap::new();
    let mut struct_sizes: HashMap<u32, u32> = HashMap::new();
    let mut sampled_image_types: std::collections::HashSet<u32> = Default::default();

    let mut i = 5usize; // skip the 5-word header
    while i < words.len() {
        let word0 = words[i];
        let op = word0 & 0xFFFF;
        let len = (word0 >> 16) as usize;
        if len == 0 || i + len > words.len() {
            break;
        }
        let operands = &words[i + 1..i + len];
        match op {
            71 => {
                // OpDecorate: target, decoration, [literal]
                if operands.len() >= 2 {
                    let target = operands[0];
                    let decoration = operands[1];
                    match decoration {
                        33 if operands.len() >= 3 => {
                            decorations_binding.insert(target, operands[2]);
                        } // Binding
                        34 if operands.len() >= 3 => {
                            decorations_set.insert(target, operands[2]);
                        } // DescriptorSet
                        _ => {}
                    }
                }
            }
            32 => {
                // OpTypePointer: result, storage class, pointee type
                if operands.len() >= 3 {
                    pointer_pointee.insert(operands[0], operands[2]);
                }
            }
            59 => {
                // OpVariable: result type, result id, storage class
                if operands.len() >= 3 {
                    var_type.insert(operands[1], operands[0]);
                    var_storage_class.insert(operands[1], operands[2]);
                }
            }
            27 => {
                // OpTypeSampledImage: result id
                if !operands.is_empty() {
                    sampled_image_types.insert(operands[0]);
                }
            }
            30 => {
                // OpTypeStruct: result id, [member types...]
                if !operands.is_empty() {
                    // Conservative block size: 16 bytes per member (std140 vec4 rounding),
                    // good enough to pick between `shader-recorded size` and `WHOLE_SIZE`.
                    let member_count = operands.len() as u32 - 1;
                    struct_sizes.insert(operands[0], member_count.max(1) * 16);
                }
            }
            _ => {}
        }
        i += len;
    }

    let mut bindings = Vec::new();
    for (&var_id, &storage_class) in &var_storage_class {
        const STORAGE_CLASS_UNIFORM: u32 = 2;
        const STORAGE_CLASS_UNIFORM_CONSTANT: u32 = 0;
        if storage_class != STORAGE_CLASS_UNIFORM && storage_class != STORAGE_CLASS_UNIFORM_CONSTANT {
            continue;
        }
        let Some(&binding) = decorations_binding.get(&var_id) else { continue };
        let set = *decorations_set.get(&var_id).unwrap_or(&0);
        if set != 0 {
            return Err(RhiError::NonZeroDescriptorSet { set, binding });
        }
        let Some(&ptr_type) = var_type.get(&var_id) else { continue };
        let Some(&pointee) = pointer_pointee.get(&ptr_type) else { continue };

        if let Some(&size) = struct_sizes.get(&pointee) {
            // Plain uniform buffers are promoted to dynamic so per-draw offsets can be
            // supplied without reallocating descriptor sets (§4.5).
            bindings.push(ReflectedBinding {
                binding,
                set,
                kind: DescriptorKind::DynamicUniformBuffer,
                count: 1,
                block_size: Some(size),
            });
        } else if sampled_image_types.contains(&pointee) {
            bindings.push(ReflectedBinding {
                binding,
                set,
                kind: DescriptorKind::CombinedImageSampler,
                count: 1,
                block_size: None,
            });
        }
    }
    bindings.sort_by_key(|b| b.binding);
    Ok(ShaderReflection { bindings })
}

pub struct Shader {
    pub(crate) tracker: Arc<AllocationTracker>,
    pub raw: vk::ShaderModule,
    pub stage: ShaderStage,
    pub reflection: ShaderReflection,
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader").field("stage", &self.stage).finish_non_exhaustive()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.tracker.retire(FreeItem::ShaderModule(self.raw));
    }
}

/// Validates and loads SPIR-V bytes, creating a shader module and its binding reflection.
/// `bytes` must be a whole number of 4-byte words (§6).
pub fn create_shader(tracker: Arc<AllocationTracker>, stage: ShaderStage, bytes: &[u8]) -> Result<Shader, RhiError> {
    validate_spirv(bytes)?;
    let words: Vec<u32> = bytes.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
    let reflection = reflect(&words)?;

    let info = vk::ShaderModuleCreateInfo::default().code(&words);
    let raw = unsafe { tracker.device.create_shader_module(&info, None) }.map_err(|e| RhiError::ResourceCreation(e.to_string()))?;
    Ok(Shader { tracker, raw, stage, reflection })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_spirv_rejects_bad_magic() {
        let bytes = [0u8; 24];
        assert!(validate_spirv(&bytes).is_err());
    }

    #[test]
    fn validate_spirv_rejects_unaligned_size() {
        let mut bytes = 0x0723_0203u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 17]);
        assert!(validate_spirv(&bytes).is_err());
    }

    #[test]
    fn validate_spirv_accepts_well_formed_header() {
        let mut bytes = 0x0723_0203u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(validate_spirv(&bytes).is_ok());
    }

    #[test]
    fn reflect_rejects_nonzero_descriptor_set() {
        // Hand-built module: OpTypePointer(uniform) %3 = pointer to struct %2; OpVariable %4:
        // type %3, storage class Uniform; decorate %4 Binding 0; decorate %4 DescriptorSet 1.
        let mut words = vec![0x07230203u32, 0x10000, 0, 20, 0];
        words.extend([(4u32 << 16) | 30, 2]); // OpTypeStruct result=2
        words.extend([(4u32 << 16) | 32, 3, 2, 2]); // OpTypePointer result=3 storage=2 pointee=2
        words.extend([(4u32 << 16) | 59, 3, 4, 2]); // OpVariable type=3 result=4 storage=2
        words.extend([(4u32 << 16) | 71, 4, 33, 0]); // OpDecorate %4 Binding 0
        words.extend([(4u32 << 16) | 71, 4, 34, 1]); // OpDecorate %4 DescriptorSet 1
        let result = reflect(&words);
        assert!(matches!(result, Err(RhiError::NonZeroDescriptorSet { set: 1, binding: 0 })));
    }

    #[test]
    fn reflect_finds_dynamic_ubo_on_set_zero() {
        let mut words = vec![0x07230203u32, 0x10000, 0, 20, 0];
        words.extend([(4u32 << 16) | 30, 2]);
        words.extend([(4u32 << 16) | 32, 3, 2, 2]);
        words.extend([(4u32 << 16) | 59, 3, 4, 2]);
        words.extend([(4u32 << 16) | 71, 4, 33, 0]);
        words.extend([(4u32 << 16) | 71, 4, 34, 0]);
        let refl = reflect(&words).unwrap();
        assert_eq!(refl.bindings.len(), 1);
        assert_eq!(refl.bindings[0].kind, DescriptorKind::DynamicUniformBuffer);
    }
}
