//! Application constants for Hotlist Fetcher
//!
//! This module centralizes the constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for overrides
pub mod env {
    /// Session cookie forwarded to the upstream site
    pub const COOKIE: &str = "HOTLIST_COOKIE";

    /// Number of hot-list items to return
    pub const MAX_ITEMS: &str = "HOTLIST_MAX_ITEMS";

    /// Hot-list request spacing in milliseconds
    pub const REQUEST_INTERVAL_MS: &str = "HOTLIST_REQUEST_INTERVAL_MS";

    /// Enable media downloads
    pub const DOWNLOAD_ENABLED: &str = "HOTLIST_DOWNLOAD_ENABLED";

    /// Media download directory
    pub const DOWNLOAD_DIR: &str = "HOTLIST_DOWNLOAD_DIR";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Upstream endpoints
pub mod endpoints {
    /// Hot-list JSON endpoint
    pub const HOT_LIST_API_URL: &str = "https://www.douyin.com/aweme/v1/web/hot/search/list/";

    /// Item detail JSON endpoint; `{id}` is replaced with the item id
    pub const DETAIL_API_URL_TEMPLATE: &str =
        "https://www.douyin.com/aweme/v1/web/aweme/detail/?aweme_id={id}";

    /// Human-facing hot-list page, base of fallback item URLs
    pub const HOT_LIST_PAGE_URL: &str = "https://www.douyin.com/hot";

    /// Human-facing video page, base of share URLs
    pub const VIDEO_PAGE_URL: &str = "https://www.douyin.com/video";
}

/// Rate limiting, timeout and retry configuration
pub mod limits {
    use super::Duration;

    /// Minimum spacing between hot-list requests
    pub const HOT_LIST_INTERVAL: Duration = Duration::from_secs(2);

    /// Minimum spacing between detail requests
    pub const DETAIL_INTERVAL: Duration = Duration::from_secs(1);

    /// Upper bound of random jitter added to every rate-limited request
    pub const RATE_LIMIT_JITTER: Duration = Duration::from_millis(100);

    /// Hot-list request timeout
    pub const HOT_LIST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Detail request timeout
    pub const DETAIL_TIMEOUT: Duration = Duration::from_secs(15);

    /// Attempts for a hot-list fetch
    pub const HOT_LIST_MAX_ATTEMPTS: u32 = 3;

    /// Base retry delay for hot-list fetches
    pub const HOT_LIST_RETRY_DELAY: Duration = Duration::from_secs(2);

    /// Attempts for a detail fetch
    pub const DETAIL_MAX_ATTEMPTS: u32 = 2;

    /// Base retry delay for detail fetches
    pub const DETAIL_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Extra delay factor applied to rate-limited and server-rejected attempts
    pub const BACKOFF_MULTIPLIER: u32 = 2;
}

/// Cache keys, TTLs and storage
pub mod cache {
    /// Cache key for the current hot list
    pub const HOT_LIST_KEY: &str = "hot_list";

    /// Prefix for per-item detail keys
    pub const DETAIL_KEY_PREFIX: &str = "detail:";

    /// Hot-list TTL in seconds
    pub const HOT_LIST_TTL_SECS: u64 = 3600;

    /// Detail TTL in seconds
    pub const DETAIL_TTL_SECS: u64 = 600;

    /// Entries kept in the memory tier
    pub const MAX_MEMORY_ENTRIES: usize = 100;

    /// File name of the on-disk snapshot
    pub const SNAPSHOT_FILE_NAME: &str = "hotlist_cache.json";
}

/// Hot-list shaping and validation
pub mod crawler {
    /// Default number of items returned
    pub const DEFAULT_MAX_ITEMS: usize = 10;

    /// Largest accepted max_items
    pub const MAX_ITEMS_LIMIT: usize = 100;

    /// Longest accepted title, in characters
    pub const MAX_TITLE_CHARS: usize = 200;

    /// Concurrent detail fetches during enrichment
    pub const DETAIL_FAN_OUT: usize = 3;
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Extension given to downloaded media
    pub const MEDIA_EXTENSION: &str = "mp4";

    /// Longest sanitized file stem, in characters
    pub const MAX_FILE_STEM_CHARS: usize = 100;
}

/// Download worker configuration
pub mod workers {
    use super::Duration;

    /// Default number of download workers
    pub const DEFAULT_CONCURRENCY: usize = 3;

    /// Maximum accepted download workers
    pub const MAX_CONCURRENCY: usize = 20;

    /// Attempts per download
    pub const DOWNLOAD_MAX_ATTEMPTS: u32 = 3;

    /// Base delay between download attempts
    pub const DOWNLOAD_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Timeout for a single download attempt
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

    /// Largest media file accepted (200 MiB)
    pub const MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;

    /// Channel buffer size for progress events
    pub const EVENT_BUFFER_SIZE: usize = 64;
}

/// Configuration file locations
pub mod config {
    /// Directory under the user config dir
    pub const DIR_NAME: &str = "hotlist-fetcher";

    /// File name inside the user config dir
    pub const FILE_NAME: &str = "config.toml";

    /// Project-local config file name
    pub const LOCAL_FILE_NAME: &str = "hotlist-fetcher.toml";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

// Re-export commonly used constants for convenience
pub use cache::{DETAIL_KEY_PREFIX, HOT_LIST_KEY};
pub use crawler::DEFAULT_MAX_ITEMS;
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use workers::DEFAULT_CONCURRENCY;
