pub mod buffer;
pub mod sampler;
pub mod shader;
pub mod texture;
