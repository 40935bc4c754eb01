//! Ambient services shared by the rest of the engine: the job system (C1) and the resource
//! cache (C2). Neither module depends on the GPU; both are usable headless (e.g. for tests
//! or offline terrain generation).

pub mod cache;
pub mod config;
pub mod error;
pub mod job;

pub use cache::{LoadFlags, Payload, Resource, ResourceCache, ResourceType};
pub use config::Config;
pub use error::{CacheError, JobError};
pub use job::{JobContext, JobSystem};
