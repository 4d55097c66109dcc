//! Per-endpoint fetch policy

use std::time::Duration;

use crate::app::retry::RetryPolicy;
use crate::constants::{cache, endpoints, limits};

/// Cache lifetime, retry and timeout settings for one endpoint class
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointPolicy {
    pub ttl_seconds: u64,
    pub retry: RetryPolicy,
    /// Bound on a single source call; zero disables it
    pub timeout: Duration,
}

impl EndpointPolicy {
    pub fn hot_list() -> Self {
        Self {
            ttl_seconds: cache::HOT_LIST_TTL_SECS,
            retry: RetryPolicy::new(limits::HOT_LIST_MAX_ATTEMPTS, limits::HOT_LIST_RETRY_DELAY),
            timeout: limits::HOT_LIST_TIMEOUT,
        }
    }

    pub fn detail() -> Self {
        Self {
            ttl_seconds: cache::DETAIL_TTL_SECS,
            retry: RetryPolicy::new(limits::DETAIL_MAX_ATTEMPTS, limits::DETAIL_RETRY_DELAY),
            timeout: limits::DETAIL_TIMEOUT,
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub hot_list: EndpointPolicy,
    pub detail: EndpointPolicy,
    /// Drop the first (pinned) entry from every hot-list view
    pub skip_top_item: bool,
    /// Base of fallback item URLs
    pub hot_list_page_url: String,
    /// Base of detail share URLs
    pub video_page_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            hot_list: EndpointPolicy::hot_list(),
            detail: EndpointPolicy::detail(),
            skip_top_item: true,
            hot_list_page_url: endpoints::HOT_LIST_PAGE_URL.to_string(),
            video_page_url: endpoints::VIDEO_PAGE_URL.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_skip_top_item(mut self, skip: bool) -> Self {
        self.skip_top_item = skip;
        self
    }

    pub fn with_retry(mut self, hot_list: RetryPolicy, detail: RetryPolicy) -> Self {
        self.hot_list.retry = hot_list;
        self.detail.retry = detail;
        self
    }
}
