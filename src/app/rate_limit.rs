//! Minimum request spacing per endpoint class
//!
//! Each [`EndpointClass`] owns a governor limiter with a one-cell burst, so a
//! grant is only issued once the configured interval has elapsed since the
//! previous grant for that class. Waiters are queued behind a fair mutex,
//! which makes grants FIFO in arrival order.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Jitter, Quota, RateLimiter as GovernorLimiter,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::constants::limits;

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Logical group of requests sharing one rate-limit budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    HotList,
    Detail,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 2] = [EndpointClass::HotList, EndpointClass::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::HotList => "hot-list",
            EndpointClass::Detail => "detail",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spacing configuration for every endpoint class
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub hot_list_interval: Duration,
    pub detail_interval: Duration,
    /// Random extra delay added on top of the interval (zero disables)
    pub jitter: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            hot_list_interval: limits::HOT_LIST_INTERVAL,
            detail_interval: limits::DETAIL_INTERVAL,
            jitter: limits::RATE_LIMIT_JITTER,
        }
    }
}

impl RateLimitConfig {
    /// Same interval for every class, no jitter
    pub fn uniform(interval: Duration) -> Self {
        Self {
            hot_list_interval: interval,
            detail_interval: interval,
            jitter: Duration::ZERO,
        }
    }

    /// No spacing at all
    pub fn disabled() -> Self {
        Self::uniform(Duration::ZERO)
    }

    pub fn interval(&self, class: EndpointClass) -> Duration {
        match class {
            EndpointClass::HotList => self.hot_list_interval,
            EndpointClass::Detail => self.detail_interval,
        }
    }
}

#[derive(Debug)]
struct ClassGate {
    interval: Duration,
    /// `None` when the interval is zero
    limiter: Option<DirectLimiter>,
    queue: Mutex<()>,
    granted: AtomicU64,
}

impl ClassGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            limiter: Quota::with_period(interval).map(DirectLimiter::direct),
            queue: Mutex::new(()),
            granted: AtomicU64::new(0),
        }
    }
}

/// Process-wide request gate, one budget per endpoint class
#[derive(Debug)]
pub struct RateLimiter {
    gates: HashMap<EndpointClass, ClassGate>,
    jitter: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let gates = EndpointClass::ALL
            .into_iter()
            .map(|class| (class, ClassGate::new(config.interval(class))))
            .collect();

        Self {
            gates,
            jitter: config.jitter,
        }
    }

    /// Wait until a request of `class` may be issued
    ///
    /// Returns once at least the class interval has elapsed since the last
    /// grant for that class. Concurrent callers are served in arrival order.
    pub async fn acquire(&self, class: EndpointClass) {
        let Some(gate) = self.gates.get(&class) else {
            return;
        };

        let _turn = gate.queue.lock().await;
        if let Some(limiter) = &gate.limiter {
            if self.jitter.is_zero() {
                limiter.until_ready().await;
            } else {
                limiter
                    .until_ready_with_jitter(Jitter::up_to(self.jitter))
                    .await;
            }
        }

        let granted = gate.granted.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Rate limiter granted {} request #{}", class, granted);
    }

    /// Configured spacing for `class`
    pub fn min_interval(&self, class: EndpointClass) -> Duration {
        self.gates
            .get(&class)
            .map(|gate| gate.interval)
            .unwrap_or_default()
    }

    /// Number of grants issued so far for `class`
    pub fn granted(&self, class: EndpointClass) -> u64 {
        self.gates
            .get(&class)
            .map(|gate| gate.granted.load(Ordering::Relaxed))
            .unwrap_or_default()
    }
}
