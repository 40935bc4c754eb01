use thiserror::Error;

use crate::entity::Entity;

/// ECS/scene-graph invariant violations (§7): asserted in debug builds, returned here so release
/// builds can skip the offending operation with a logged error instead of aborting.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("entity {0} has no component of the requested type")]
    MissingComponent(Entity),
    #[error("attaching {child} to {parent} would create a hierarchy cycle")]
    WouldCreateCycle { child: Entity, parent: Entity },
    #[error("entity {0} does not exist in this scene")]
    UnknownEntity(Entity),
}
