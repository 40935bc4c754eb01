//! Entity-component store and job-dispatched scene update graph (C7, C8, C9): stable entity
//! IDs, dense component managers, the eight-phase `Scene::update` pipeline, and per-camera
//! frustum culling.

pub mod aabb;
pub mod component_store;
pub mod components;
pub mod entity;
pub mod error;
pub mod scene;
pub mod serialize;
pub mod update;
pub mod view;

pub use aabb::{AxisAlignedBox, Frustum};
pub use component_store::ComponentManager;
pub use entity::{Entity, EntityAllocator};
pub use error::SceneError;
pub use scene::Scene;
pub use view::SceneView;
