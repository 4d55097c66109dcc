//! Request counters for the orchestrator

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of the orchestrator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Calls answered from the cache without joining or fetching
    pub cache_hits: u64,
    /// Source calls actually issued, retries included
    pub network_requests: u64,
    /// Fetches that produced a validated result
    pub successes: u64,
    /// Fetches that ended in an error
    pub failures: u64,
    /// Calls that joined another caller's pending fetch
    pub joined: u64,
}

impl FetchStats {
    /// Share of completed fetches that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.successes as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FetchCounters {
    cache_hits: AtomicU64,
    network_requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    joined: AtomicU64,
}

impl FetchCounters {
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn network_request(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn outcome(&self, success: bool) {
        let counter = if success {
            &self.successes
        } else {
            &self.failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn joined(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        assert_eq!(FetchStats::default().success_rate(), 0.0);

        let counters = FetchCounters::default();
        counters.outcome(true);
        counters.outcome(true);
        counters.outcome(true);
        counters.outcome(false);
        counters.cache_hit();

        let stats = counters.snapshot();
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.success_rate(), 75.0);
    }
}
