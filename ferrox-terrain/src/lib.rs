//! Procedural-terrain node graph (C11): a DAG of producer/modifier/consumer noise nodes that
//! samples height fields and emits triangulated chunk meshes into a staging scene.

pub mod cellular;
pub mod error;
pub mod generator;
pub mod graph;
pub mod image;
pub mod mesh;
pub mod perlin;

pub use error::TerrainError;
pub use generator::{Generator, NoiseType, Parameters};
pub use graph::{CellularParams, Graph, Node, NodeId, PerlinParams, StrataMode};
pub use image::{render_noise_image, Color, NoiseImage, NoiseImageDesc};
pub use mesh::{generate_chunk_mesh, ChunkDesc, GridTriangulator, Triangulator};
