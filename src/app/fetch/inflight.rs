//! Collapsing of concurrent requests for the same key
//!
//! The first caller for a key installs a shared cell and runs the operation;
//! callers arriving while it is pending await the same cell and receive a
//! clone of its outcome. The slot is released as soon as the leader finishes,
//! so the next call after that starts afresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

/// Map of pending operations keyed by cache key
#[derive(Debug)]
pub struct InFlight<T> {
    slots: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` for `key` unless a run is already pending
    ///
    /// Returns the outcome and whether this caller executed the operation.
    /// If the leading caller is dropped mid-flight, one of the waiters takes
    /// over and runs its own `operation`.
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let mut led = false;
        let value = cell
            .get_or_init(|| {
                led = true;
                operation()
            })
            .await
            .clone();

        if led {
            let mut slots = self.slots.lock().await;
            if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
                slots.remove(key);
            }
        }

        (value, led)
    }

    /// Number of keys with a pending or unreleased run
    pub async fn pending(&self) -> usize {
        self.slots.lock().await.len()
    }
}
