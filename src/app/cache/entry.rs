//! Cache entries and their validity rule

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-disk snapshot: key to entry, serialized as one JSON object
pub type Snapshot = BTreeMap<String, CacheEntry>;

/// A cached value with its creation time and lifetime
///
/// The key is not part of the serialized form; the snapshot map carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(skip)]
    pub key: String,
    pub value: Value,
    /// Fractional seconds since the Unix epoch
    pub created_at: f64,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Value, created_at: f64, ttl_seconds: u64) -> Self {
        Self {
            key: key.into(),
            value,
            created_at,
            ttl_seconds,
        }
    }

    /// Epoch seconds at which the entry stops being valid
    pub fn expires_at(&self) -> f64 {
        self.created_at + self.ttl_seconds as f64
    }

    /// An entry is valid iff `now < created_at + ttl_seconds`
    pub fn is_valid_at(&self, now: f64) -> bool {
        now < self.expires_at()
    }

    /// Time left before expiry, zero once expired
    pub fn remaining_at(&self, now: f64) -> Duration {
        let remaining = self.expires_at() - now;
        if remaining > 0.0 {
            Duration::from_secs_f64(remaining)
        } else {
            Duration::ZERO
        }
    }
}

/// Restore keys after deserializing a snapshot
pub(crate) fn rekey(mut snapshot: Snapshot) -> Snapshot {
    for (key, entry) in snapshot.iter_mut() {
        entry.key.clone_from(key);
    }
    snapshot
}
