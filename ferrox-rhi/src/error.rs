use thiserror::Error;

#[derive(Debug, Error)]
pub enum RhiError {
    #[error("no suitable physical device found (need graphics + transfer + compute queue families)")]
    NoSuitableDevice,
    #[error("vulkan instance creation failed: {0}")]
    InstanceCreation(String),
    #[error("vulkan device creation failed: {0}")]
    DeviceCreation(String),
    #[error("swap chain creation failed: {0}")]
    SwapChainCreation(String),
    #[error("resource creation failed: {0}")]
    ResourceCreation(String),
    #[error("shader validation failed: {0}")]
    InvalidShader(String),
    #[error("pipeline state references a null shader stage")]
    NullShaderStage,
    #[error("descriptor binding {binding} on set {set} is not set 0 (bindless sets are not supported)")]
    NonZeroDescriptorSet { set: u32, binding: u32 },
    #[error("descriptor pool exhausted after {attempts} growth attempts")]
    DescriptorPoolExhausted { attempts: u32 },
    #[error("surface/device lost")]
    DeviceLost,
}
