//! Core application logic for Hotlist Fetcher
//!
//! This module contains the fetch pipeline: the HTTP source, the persistent
//! response cache, the per-endpoint rate limiter and retry policy, the fetch
//! orchestrator that ties them together, and the media download manager.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hotlist_fetcher::app::{
//!     CacheConfig, CacheStore, FetchConfig, FetchOrchestrator, HttpSource, RateLimitConfig,
//!     RateLimiter, SourceConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = HttpSource::new(SourceConfig::default())?;
//! let orchestrator = FetchOrchestrator::new(
//!     Arc::new(source),
//!     Arc::new(CacheStore::new(CacheConfig::default())),
//!     Arc::new(RateLimiter::new(&RateLimitConfig::default())),
//!     FetchConfig::default(),
//! );
//!
//! for item in orchestrator.get_hot_list(10).await? {
//!     println!("{}. {} ({})", item.position, item.title, item.item_url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod download;
pub mod fetch;
pub mod models;
pub mod paths;
pub mod rate_limit;
pub mod retry;
pub mod session;
pub mod signals;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main public API
pub use cache::{CacheConfig, CacheStats, CacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use download::{
    tasks_for_items, DownloadConfig, DownloadEvent, DownloadManager, DownloadResult,
    DownloadStatus, DownloadSummary, DownloadTask, HttpTransport, MediaResponse, MediaTransport,
};
pub use fetch::{FetchConfig, FetchOrchestrator, FetchStats};
pub use models::{HotListItem, ItemDetail};
pub use rate_limit::{EndpointClass, RateLimitConfig, RateLimiter};
pub use retry::{RetryDecision, RetryError, RetryPolicy};
pub use session::{RunReport, Session, SessionOptions};
pub use signals::SignalHandler;
pub use source::{HotListSource, HttpSource, SourceConfig};
