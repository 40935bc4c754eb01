//! Process-wide configuration knobs, centralized instead of scattered as constants.
//!
//! Loaded once at engine init and held behind the same kind of process-wide handle as
//! the device/scene/cache singletons (see the RHI core design notes).

use std::path::PathBuf;

/// Number of frame-in-flight slots. Mirrors `BUFFER_COUNT` in the RHI core.
pub const DEFAULT_BUFFER_COUNT: u32 = 2;

#[derive(Debug, Clone)]
pub struct Config {
    /// Frames kept in flight before a deferred-free entry's retire frame is honored.
    pub buffer_count: u32,
    /// Worker thread count for the job system. `None` means hardware concurrency minus one.
    pub job_worker_count: Option<usize>,
    /// Directories searched, in order, for resources requested by logical name.
    pub resource_search_paths: Vec<PathBuf>,
    /// How long the hot-reload watcher holds a burst of events quiet before firing.
    pub hot_reload_debounce_ms: u64,
    /// Whether to request the Vulkan validation layer, also readable from `FERROX_VALIDATION`.
    pub validation_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_count: DEFAULT_BUFFER_COUNT,
            job_worker_count: None,
            resource_search_paths: vec![PathBuf::from(".")],
            hot_reload_debounce_ms: 250,
            validation_enabled: Self::validation_from_env(),
        }
    }
}

impl Config {
    fn validation_from_env() -> bool {
        match std::env::var("FERROX_VALIDATION") {
            Ok(v) => v != "0" && !v.eq_ignore_ascii_case("false"),
            Err(_) => cfg!(debug_assertions),
        }
    }

    pub fn with_search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.resource_search_paths = paths.into_iter().collect();
        self
    }
}
