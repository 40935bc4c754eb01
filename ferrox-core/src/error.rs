use thiserror::Error;

/// Job-system-level failures, distinct from errors a task body records into its own state.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job context reused after it was drained and dropped")]
    ContextReused,
    #[error("dispatch called with groupSize == 0")]
    ZeroGroupSize,
}

/// Resource cache failures. A failed load never panics; callers check `Resource::is_valid()`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("resource not found in any search path: {0}")]
    NotFound(String),
    #[error("unrecognized file extension: {0}")]
    UnknownExtension(String),
    #[error("decode failed for {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
