//! Cache configuration types and defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{cache, config};

/// Configuration for the two-tier cache store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Location of the JSON snapshot
    pub snapshot_path: PathBuf,
    /// Entries kept in the memory tier (0 disables the memory tier)
    pub max_memory_entries: usize,
    /// When false every lookup misses and writes are dropped
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            max_memory_entries: cache::MAX_MEMORY_ENTRIES,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a configuration writing its snapshot to `snapshot_path`
    pub fn with_snapshot_path(snapshot_path: PathBuf) -> Self {
        Self {
            snapshot_path,
            ..Default::default()
        }
    }

    /// Set the memory-tier capacity
    pub fn with_max_memory_entries(mut self, max_entries: usize) -> Self {
        self.max_memory_entries = max_entries;
        self
    }

    /// Enable or disable caching entirely
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// OS cache directory, falling back to `./cache`
pub fn default_snapshot_path() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(config::DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./cache"))
        .join(cache::SNAPSHOT_FILE_NAME)
}
