//! Two-tier TTL cache with an atomic JSON snapshot
//!
//! Every network-facing component consults this cache before issuing a
//! request. Repeated lookups within one process are served from memory; the
//! on-disk snapshot lets TTL-valid results survive across short-lived runs.
//!
//! # Key Features
//!
//! - **TTL validity**: an entry is returned only while `now < created_at + ttl`
//! - **Memory tier**: bounded, evicting the oldest entry when full
//! - **Atomic snapshot**: one JSON document rewritten via temp file and rename
//! - **Corruption tolerance**: an unreadable snapshot behaves as an empty cache
//!
//! # Module Organization
//!
//! - [`config`] - Configuration types and defaults
//! - [`entry`] - Entries, validity rule and snapshot type
//! - [`store`] - The cache store itself
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotlist_fetcher::app::cache::{CacheConfig, CacheStore};
//! use serde_json::json;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::with_snapshot_path(PathBuf::from("./cache/hotlist_cache.json"));
//! let cache = CacheStore::new(config);
//!
//! cache.put("hot_list", json!([{"title": "example"}]), 3600).await?;
//! if let Some(value) = cache.get("hot_list").await {
//!     println!("cached: {}", value);
//! }
//!
//! let removed = cache.sweep_expired().await?;
//! println!("removed {} expired entries", removed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, Snapshot};
pub use store::{CacheStats, CacheStore};
