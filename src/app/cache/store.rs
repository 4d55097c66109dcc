//! Two-tier TTL cache store
//!
//! Lookups go to the memory tier first and fall back to the JSON snapshot on
//! disk, promoting valid disk entries into memory. Every write rewrites the
//! whole snapshot through a temp file and an atomic rename; concurrent writers
//! are serialized by a single disk lock. A snapshot that cannot be parsed is
//! treated as an empty cache.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::config::CacheConfig;
use super::entry::{rekey, CacheEntry, Snapshot};
use crate::app::clock::{Clock, SystemClock};
use crate::app::paths;
use crate::errors::{CacheError, CacheResult};

/// Point-in-time view of the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub expired_disk_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub snapshot_corrupt: bool,
}

impl CacheStats {
    /// Fraction of lookups served from cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Key/value store with TTL, memory tier and durable JSON snapshot
#[derive(Debug)]
pub struct CacheStore {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    memory: RwLock<HashMap<String, CacheEntry>>,
    disk_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Create a store using the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store using a custom clock
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(
            "Cache store at {} (memory capacity {}, enabled: {})",
            config.snapshot_path.display(),
            config.max_memory_entries,
            config.enabled
        );
        Self {
            config,
            clock,
            memory: RwLock::new(HashMap::new()),
            disk_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.config.snapshot_path
    }

    /// Look up an unexpired value
    ///
    /// Disk read failures and corrupt snapshots are logged and reported as a
    /// miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.now();

        {
            let memory = self.memory.read().await;
            if let Some(entry) = memory.get(key) {
                if entry.is_valid_at(now) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache hit (memory): {}", key);
                    return Some(entry.value.clone());
                }
            }
        }

        {
            let mut memory = self.memory.write().await;
            if memory.get(key).is_some_and(|entry| !entry.is_valid_at(now)) {
                memory.remove(key);
                debug!("Dropped expired memory entry: {}", key);
            }
        }

        let mut snapshot = self.load_snapshot_lossy().await;
        match snapshot.remove(key) {
            Some(entry) if entry.is_valid_at(now) => {
                let value = entry.value.clone();
                self.insert_memory(entry).await;
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit (disk): {}", key);
                Some(value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss: {}", key);
                None
            }
        }
    }

    /// Look up a value and deserialize it
    ///
    /// A value that no longer matches `T` is treated as absent.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!("Ignoring cached value for '{}' with unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store a value, replacing any previous entry for `key`
    ///
    /// The memory tier is updated immediately; the snapshot is rewritten
    /// before this returns.
    pub async fn put(&self, key: &str, value: Value, ttl_seconds: u64) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let entry = CacheEntry::new(key, value, self.clock.now(), ttl_seconds);
        self.insert_memory(entry.clone()).await;

        let _guard = self.disk_lock.lock().await;
        let mut snapshot = self.load_snapshot_lossy().await;
        snapshot.insert(key.to_string(), entry);
        self.write_snapshot(&snapshot).await?;

        debug!("Cached '{}' for {}s", key, ttl_seconds);
        Ok(())
    }

    /// Serialize and store a value
    pub async fn put_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> CacheResult<()> {
        let value = serde_json::to_value(value)?;
        self.put(key, value, ttl_seconds).await
    }

    /// Remove `key` from both tiers
    ///
    /// Returns whether anything was removed.
    pub async fn invalidate(&self, key: &str) -> CacheResult<bool> {
        let in_memory = self.memory.write().await.remove(key).is_some();

        let _guard = self.disk_lock.lock().await;
        let mut snapshot = self.load_snapshot_lossy().await;
        let on_disk = snapshot.remove(key).is_some();
        if on_disk {
            self.write_snapshot(&snapshot).await?;
        }

        debug!("Invalidated '{}' (memory: {}, disk: {})", key, in_memory, on_disk);
        Ok(in_memory || on_disk)
    }

    /// Remove every expired entry from both tiers
    ///
    /// A corrupt snapshot is replaced with an empty one. Returns the number
    /// of distinct keys removed.
    pub async fn sweep_expired(&self) -> CacheResult<usize> {
        let now = self.clock.now();
        let mut removed = HashSet::new();

        self.memory.write().await.retain(|key, entry| {
            let keep = entry.is_valid_at(now);
            if !keep {
                removed.insert(key.clone());
            }
            keep
        });

        let _guard = self.disk_lock.lock().await;
        match self.load_snapshot().await {
            Ok(mut snapshot) => {
                let before = snapshot.len();
                snapshot.retain(|key, entry| {
                    let keep = entry.is_valid_at(now);
                    if !keep {
                        removed.insert(key.clone());
                    }
                    keep
                });
                if snapshot.len() != before {
                    self.write_snapshot(&snapshot).await?;
                }
            }
            Err(e @ CacheError::CacheCorrupt { .. }) => {
                warn!("Resetting corrupt cache snapshot: {}", e);
                self.write_snapshot(&Snapshot::new()).await?;
            }
            Err(e) => return Err(e),
        }

        info!("Swept {} expired cache entries", removed.len());
        Ok(removed.len())
    }

    /// Drop every entry and delete the snapshot file
    pub async fn clear(&self) -> CacheResult<()> {
        self.memory.write().await.clear();

        let _guard = self.disk_lock.lock().await;
        let path = &self.config.snapshot_path;
        match fs::remove_file(path).await {
            Ok(()) => info!("Removed cache snapshot {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.clone(),
                    source,
                })
            }
        }
        Ok(())
    }

    /// Entry counts for both tiers plus lookup counters
    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let memory_entries = self.memory.read().await.len();

        let (disk_entries, expired_disk_entries, snapshot_corrupt) =
            match self.load_snapshot().await {
                Ok(snapshot) => {
                    let expired = snapshot
                        .values()
                        .filter(|entry| !entry.is_valid_at(now))
                        .count();
                    (snapshot.len(), expired, false)
                }
                Err(CacheError::CacheCorrupt { .. }) => (0, 0, true),
                Err(_) => (0, 0, false),
            };

        CacheStats {
            memory_entries,
            disk_entries,
            expired_disk_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            snapshot_corrupt,
        }
    }

    async fn insert_memory(&self, entry: CacheEntry) {
        let capacity = self.config.max_memory_entries;
        if capacity == 0 {
            return;
        }

        let mut memory = self.memory.write().await;
        // A disk promotion racing a put must not replace the newer value
        if memory
            .get(&entry.key)
            .is_some_and(|existing| existing.created_at > entry.created_at)
        {
            debug!("Kept newer memory entry: {}", entry.key);
            return;
        }
        if !memory.contains_key(&entry.key) && memory.len() >= capacity {
            let oldest = memory
                .values()
                .min_by(|a, b| a.created_at.total_cmp(&b.created_at))
                .map(|oldest| oldest.key.clone());
            if let Some(oldest) = oldest {
                memory.remove(&oldest);
                debug!("Evicted oldest memory entry: {}", oldest);
            }
        }
        memory.insert(entry.key.clone(), entry);
    }

    async fn load_snapshot(&self) -> CacheResult<Snapshot> {
        let path = &self.config.snapshot_path;
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Snapshot::new());
        }

        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::CacheCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(rekey(snapshot))
    }

    async fn load_snapshot_lossy(&self) -> Snapshot {
        match self.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Treating cache snapshot as empty: {}", e);
                Snapshot::new()
            }
        }
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> CacheResult<()> {
        let final_path = &self.config.snapshot_path;
        paths::ensure_parent_dir(final_path).await.map_err(|e| {
            error!("Failed to create cache directory: {}", e);
            CacheError::DirectoryNotAccessible {
                path: final_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            }
        })?;

        let temp_path = paths::temp_path_for(final_path);
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        fs::write(&temp_path, &bytes)
            .await
            .map_err(|source| CacheError::Io {
                path: temp_path.clone(),
                source,
            })?;

        if let Err(e) = fs::rename(&temp_path, final_path).await {
            error!("Failed to rename cache snapshot: {}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::AtomicOperationFailed {
                temp_path,
                final_path: final_path.clone(),
            });
        }

        debug!(
            "Wrote cache snapshot with {} entries to {}",
            snapshot.len(),
            final_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::clock::ManualClock;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_store(temp_dir: &TempDir) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = CacheConfig::with_snapshot_path(temp_dir.path().join("cache.json"));
        (CacheStore::with_clock(config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_get_returns_value_until_ttl_elapses() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = create_store(&temp_dir);

        store.put("k", json!({"a": 1}), 60).await.unwrap();
        assert_eq!(store.get("k").await, Some(json!({"a": 1})));

        clock.advance(Duration::from_secs(59));
        assert_eq!(store.get("k").await, Some(json!({"a": 1})));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_stale_promotion_keeps_newer_memory_entry() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = create_store(&temp_dir);

        store.put("k", json!("old"), 3600).await.unwrap();
        let stale = CacheEntry::new("k", json!("old"), clock.now(), 3600);

        clock.advance(Duration::from_secs(5));
        store.put("k", json!("new"), 3600).await.unwrap();

        // A lookup that read the snapshot before the second put promotes late
        store.insert_memory(stale).await;
        assert_eq!(store.get("k").await, Some(json!("new")));
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = create_store(&temp_dir);

        store.put("short", json!("s"), 10).await.unwrap();
        store.put("long-a", json!([1, 2, 3]), 600).await.unwrap();
        store.put("long-b", json!({"x": true}), 600).await.unwrap();
        clock.advance(Duration::from_secs(30));

        // Fresh store over the same file, sharing the clock
        let config = CacheConfig::with_snapshot_path(temp_dir.path().join("cache.json"));
        let restarted = CacheStore::with_clock(config, clock.clone());

        assert_eq!(restarted.get("long-a").await, Some(json!([1, 2, 3])));
        assert_eq!(restarted.get("long-b").await, Some(json!({"x": true})));
        assert_eq!(restarted.get("short").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_empty_cache() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _clock) = create_store(&temp_dir);
        tokio::fs::write(store.snapshot_path(), b"{not json")
            .await
            .unwrap();

        assert_eq!(store.get("anything").await, None);
        assert!(store.stats().await.snapshot_corrupt);

        // A put replaces the corrupt file with a valid snapshot
        store.put("k", json!(1), 60).await.unwrap();
        let raw = tokio::fs::read(store.snapshot_path()).await.unwrap();
        let parsed: Snapshot = serde_json::from_slice(&raw).unwrap();
        assert!(parsed.contains_key("k"));
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _clock) = create_store(&temp_dir);

        store.put("k", json!(1), 60).await.unwrap();

        assert!(store.snapshot_path().exists());
        assert!(!paths::temp_path_for(store.snapshot_path()).exists());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _clock) = create_store(&temp_dir);

        store.put("k", json!(1), 60).await.unwrap();
        store.put("k", json!(2), 60).await.unwrap();

        assert_eq!(store.get("k").await, Some(json!(2)));
        assert_eq!(store.stats().await.disk_entries, 1);
    }

    #[tokio::test]
    async fn test_invalidate_removes_both_tiers() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = create_store(&temp_dir);

        store.put("k", json!(1), 60).await.unwrap();
        assert!(store.invalidate("k").await.unwrap());
        assert_eq!(store.get("k").await, None);

        let config = CacheConfig::with_snapshot_path(temp_dir.path().join("cache.json"));
        let restarted = CacheStore::with_clock(config, clock);
        assert_eq!(restarted.get("k").await, None);

        assert!(!store.invalidate("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_expired_cleans_disk() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = create_store(&temp_dir);

        store.put("old", json!(1), 10).await.unwrap();
        store.put("new", json!(2), 1000).await.unwrap();
        clock.advance(Duration::from_secs(20));

        let stats = store.stats().await;
        assert_eq!(stats.disk_entries, 2);
        assert_eq!(stats.expired_disk_entries, 1);

        assert_eq!(store.sweep_expired().await.unwrap(), 1);

        let stats = store.stats().await;
        assert_eq!(stats.disk_entries, 1);
        assert_eq!(stats.memory_entries, 1);
        assert_eq!(store.get("new").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_memory_tier_evicts_oldest() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let config = CacheConfig::with_snapshot_path(temp_dir.path().join("cache.json"))
            .with_max_memory_entries(2);
        let store = CacheStore::with_clock(config, clock.clone());

        for key in ["a", "b", "c"] {
            store.put(key, json!(key), 600).await.unwrap();
            clock.advance(Duration::from_secs(1));
        }

        let stats = store.stats().await;
        assert_eq!(stats.memory_entries, 2);
        assert_eq!(stats.disk_entries, 3);

        // The evicted entry is still served from disk
        assert_eq!(store.get("a").await, Some(json!("a")));
    }

    #[tokio::test]
    async fn test_disabled_cache_never_hits() {
        let temp_dir = TempDir::new().unwrap();
        let config = CacheConfig::with_snapshot_path(temp_dir.path().join("cache.json"))
            .with_enabled(false);
        let store = CacheStore::new(config);

        store.put("k", json!(1), 60).await.unwrap();
        assert_eq!(store.get("k").await, None);
        assert!(!store.snapshot_path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_puts_all_persist() {
        let temp_dir = TempDir::new().unwrap();
        let (store, clock) = create_store(&temp_dir);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.put(&format!("key-{i}"), json!(i), 600).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let config = CacheConfig::with_snapshot_path(temp_dir.path().join("cache.json"));
        let restarted = CacheStore::with_clock(config, clock);
        for i in 0..16 {
            assert_eq!(restarted.get(&format!("key-{i}")).await, Some(json!(i)));
        }
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _clock) = create_store(&temp_dir);

        store.put_as("nums", &vec![1u32, 2, 3], 60).await.unwrap();
        assert_eq!(store.get_as::<Vec<u32>>("nums").await, Some(vec![1, 2, 3]));
        assert_eq!(store.get_as::<String>("nums").await, None);
    }

    #[tokio::test]
    async fn test_clear_removes_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _clock) = create_store(&temp_dir);

        store.put("k", json!(1), 60).await.unwrap();
        store.clear().await.unwrap();

        assert!(!store.snapshot_path().exists());
        assert_eq!(store.get("k").await, None);
        // Clearing twice is fine
        store.clear().await.unwrap();
    }
}
