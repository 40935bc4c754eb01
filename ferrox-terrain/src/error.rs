use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("node graph slot {0} references a node id that does not exist")]
    DanglingInput(usize),
    #[error("generated mesh has {vertices} vertices but a chunk must have at least one triangle")]
    EmptyMesh { vertices: usize },
}
