//! Configuration management for Hotlist Fetcher
//!
//! This module provides the TOML configuration file format, multi-source
//! loading (defaults, config file, environment), validation, and conversion
//! into the runtime configuration structs used by the core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::cache::{config::default_snapshot_path, CacheConfig};
use crate::app::download::DownloadConfig;
use crate::app::fetch::{EndpointPolicy, FetchConfig};
use crate::app::rate_limit::RateLimitConfig;
use crate::app::retry::RetryPolicy;
use crate::app::source::SourceConfig;
use crate::constants::{self, cache, crawler, endpoints, env, http, limits, workers};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Upstream endpoints and HTTP client settings
    pub source: SourceConfigToml,
    /// Cache settings
    pub cache: CacheConfigToml,
    /// Request spacing per endpoint class
    pub rate_limit: RateLimitConfigToml,
    /// Retry settings per endpoint class
    pub retry: RetryConfigToml,
    /// Hot-list shaping
    pub crawler: CrawlerConfigToml,
    /// Media download settings
    pub download: DownloadConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfigToml {
    pub hot_list_api_url: String,
    /// Must contain `{id}`
    pub detail_api_url_template: String,
    pub hot_list_page_url: String,
    pub video_page_url: String,
    /// Session cookie sent with every request
    pub cookie: Option<String>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub hot_list_timeout_secs: u64,
    pub detail_timeout_secs: u64,
}

impl Default for SourceConfigToml {
    fn default() -> Self {
        Self {
            hot_list_api_url: endpoints::HOT_LIST_API_URL.to_string(),
            detail_api_url_template: endpoints::DETAIL_API_URL_TEMPLATE.to_string(),
            hot_list_page_url: endpoints::HOT_LIST_PAGE_URL.to_string(),
            video_page_url: endpoints::VIDEO_PAGE_URL.to_string(),
            cookie: None,
            user_agent: http::USER_AGENT.to_string(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            hot_list_timeout_secs: limits::HOT_LIST_TIMEOUT.as_secs(),
            detail_timeout_secs: limits::DETAIL_TIMEOUT.as_secs(),
        }
    }
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigToml {
    pub enabled: bool,
    /// Snapshot file (leave unset to use the system cache directory)
    pub snapshot_path: Option<PathBuf>,
    pub max_memory_entries: usize,
    pub hot_list_ttl_secs: u64,
    pub detail_ttl_secs: u64,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_path: None,
            max_memory_entries: cache::MAX_MEMORY_ENTRIES,
            hot_list_ttl_secs: cache::HOT_LIST_TTL_SECS,
            detail_ttl_secs: cache::DETAIL_TTL_SECS,
        }
    }
}

/// TOML-friendly rate limit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfigToml {
    pub hot_list_interval_ms: u64,
    pub detail_interval_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RateLimitConfigToml {
    fn default() -> Self {
        Self {
            hot_list_interval_ms: limits::HOT_LIST_INTERVAL.as_millis() as u64,
            detail_interval_ms: limits::DETAIL_INTERVAL.as_millis() as u64,
            jitter_ms: limits::RATE_LIMIT_JITTER.as_millis() as u64,
        }
    }
}

/// TOML-friendly retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfigToml {
    pub hot_list_max_attempts: u32,
    pub hot_list_delay_ms: u64,
    pub detail_max_attempts: u32,
    pub detail_delay_ms: u64,
    /// Extra factor for rate-limited and server-rejected attempts
    pub backoff_multiplier: u32,
}

impl Default for RetryConfigToml {
    fn default() -> Self {
        Self {
            hot_list_max_attempts: limits::HOT_LIST_MAX_ATTEMPTS,
            hot_list_delay_ms: limits::HOT_LIST_RETRY_DELAY.as_millis() as u64,
            detail_max_attempts: limits::DETAIL_MAX_ATTEMPTS,
            detail_delay_ms: limits::DETAIL_RETRY_DELAY.as_millis() as u64,
            backoff_multiplier: limits::BACKOFF_MULTIPLIER,
        }
    }
}

/// TOML-friendly crawler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfigToml {
    pub max_items: usize,
    /// Drop the pinned first entry of the hot list
    pub skip_top_item: bool,
    /// Detail fetches running at once during enrichment
    pub detail_fan_out: usize,
}

impl Default for CrawlerConfigToml {
    fn default() -> Self {
        Self {
            max_items: crawler::DEFAULT_MAX_ITEMS,
            skip_top_item: true,
            detail_fan_out: crawler::DETAIL_FAN_OUT,
        }
    }
}

/// TOML-friendly download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    pub enabled: bool,
    pub directory: PathBuf,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Largest accepted file in bytes (0 = unlimited)
    pub max_file_size: u64,
    pub timeout_secs: u64,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("downloads"),
            concurrency: workers::DEFAULT_CONCURRENCY,
            max_attempts: workers::DOWNLOAD_MAX_ATTEMPTS,
            retry_delay_ms: workers::DOWNLOAD_RETRY_DELAY.as_millis() as u64,
            max_file_size: workers::MAX_FILE_SIZE,
            timeout_secs: workers::DOWNLOAD_TIMEOUT.as_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: constants::logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Everything the core needs for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub fetch: FetchConfig,
    pub download: DownloadConfig,
    pub max_items: usize,
    pub detail_fan_out: usize,
    pub download_enabled: bool,
    pub download_dir: PathBuf,
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            source: self.source.to_runtime_config(),
            cache: self.cache.to_runtime_config(),
            rate_limit: self.rate_limit.to_runtime_config(),
            fetch: self.fetch_config(),
            download: self.download.to_runtime_config(),
            max_items: self.crawler.max_items,
            detail_fan_out: self.crawler.detail_fan_out.max(1),
            download_enabled: self.download.enabled,
            download_dir: self.download.directory.clone(),
        }
    }

    fn fetch_config(&self) -> FetchConfig {
        let retry = &self.retry;
        let policy = |attempts: u32, delay_ms: u64| {
            RetryPolicy::new(attempts, Duration::from_millis(delay_ms))
                .with_backoff_multiplier(retry.backoff_multiplier)
        };

        FetchConfig {
            hot_list: EndpointPolicy {
                ttl_seconds: self.cache.hot_list_ttl_secs,
                retry: policy(retry.hot_list_max_attempts, retry.hot_list_delay_ms),
                timeout: Duration::from_secs(self.source.hot_list_timeout_secs),
            },
            detail: EndpointPolicy {
                ttl_seconds: self.cache.detail_ttl_secs,
                retry: policy(retry.detail_max_attempts, retry.detail_delay_ms),
                timeout: Duration::from_secs(self.source.detail_timeout_secs),
            },
            skip_top_item: self.crawler.skip_top_item,
            hot_list_page_url: self.source.hot_list_page_url.clone(),
            video_page_url: self.source.video_page_url.clone(),
        }
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// CLI arguments are applied by the caller on top of the result.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match &config_file_override {
            Some(path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cookie) = lookup(env::COOKIE).filter(|c| !c.trim().is_empty()) {
            debug!("Using cookie from {}", env::COOKIE);
            self.source.cookie = Some(cookie.trim().to_string());
        }

        if let Some(value) = lookup(env::MAX_ITEMS) {
            self.crawler.max_items = parse_env(env::MAX_ITEMS, &value)?;
        }

        if let Some(value) = lookup(env::REQUEST_INTERVAL_MS) {
            self.rate_limit.hot_list_interval_ms = parse_env(env::REQUEST_INTERVAL_MS, &value)?;
        }

        if let Some(value) = lookup(env::DOWNLOAD_ENABLED) {
            self.download.enabled = parse_env_bool(env::DOWNLOAD_ENABLED, &value)?;
        }

        if let Some(dir) = lookup(env::DOWNLOAD_DIR).filter(|d| !d.trim().is_empty()) {
            self.download.directory = PathBuf::from(dir.trim());
        }

        Ok(())
    }

    /// Validate configuration values, collecting every problem found
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.crawler.max_items == 0 || self.crawler.max_items > crawler::MAX_ITEMS_LIMIT {
            errors.push(format!(
                "crawler.max_items must be between 1 and {}, got {}",
                crawler::MAX_ITEMS_LIMIT,
                self.crawler.max_items
            ));
        }

        if self.retry.hot_list_max_attempts == 0 || self.retry.detail_max_attempts == 0 {
            errors.push("retry max_attempts must be at least 1".to_string());
        }

        if self.download.max_attempts == 0 {
            errors.push("download.max_attempts must be at least 1".to_string());
        }

        if let Err(e) = self.download.to_runtime_config().validate() {
            errors.push(e.to_string());
        }

        for (field, value) in [
            ("source.hot_list_api_url", &self.source.hot_list_api_url),
            ("source.detail_api_url_template", &self.source.detail_api_url_template),
            ("source.hot_list_page_url", &self.source.hot_list_page_url),
            ("source.video_page_url", &self.source.video_page_url),
        ] {
            if !is_http_url(value) {
                errors.push(format!("{} must be an http(s) URL, got '{}'", field, value));
            }
        }

        if !self.source.detail_api_url_template.contains("{id}") {
            errors.push("source.detail_api_url_template must contain '{id}'".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            // Project-local config
            PathBuf::from(format!("./{}", constants::config::LOCAL_FILE_NAME)),
            PathBuf::from(format!("./{}", constants::config::FILE_NAME)),
        ];
        if let Some(user_config) = Self::get_default_config_path() {
            search_paths.push(user_config);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::config::DIR_NAME)
                .join(constants::config::FILE_NAME)
        })
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the commented default configuration to `path`
    ///
    /// Uses the user config location when `path` is `None`. An existing file
    /// is only replaced when `force` is set.
    pub async fn write_default_config(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()
                .ok_or_else(|| AppError::generic("Could not determine user config directory"))?,
        };

        if config_path.exists() && !force {
            return Err(AppError::generic(format!(
                "Config file already exists: {} (use --force to overwrite)",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&config_path, Self::generate_default_config_content()).await?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        let defaults = Self::default();

        format!(
            r#"# Hotlist Fetcher Configuration
# Every setting is optional; missing values fall back to these defaults.

[source]
hot_list_api_url = "{hot_list_api_url}"
# {{id}} is replaced with the item id
detail_api_url_template = "{detail_api_url_template}"
hot_list_page_url = "{hot_list_page_url}"
video_page_url = "{video_page_url}"
# Session cookie (or set {cookie_env})
# cookie = "..."
user_agent = "{user_agent}"
connect_timeout_secs = {connect_timeout_secs}
hot_list_timeout_secs = {hot_list_timeout_secs}
detail_timeout_secs = {detail_timeout_secs}

[cache]
enabled = true
# Snapshot file (leave unset to use the system cache directory)
# snapshot_path = "/path/to/hotlist_cache.json"
max_memory_entries = {max_memory_entries}
hot_list_ttl_secs = {hot_list_ttl_secs}
detail_ttl_secs = {detail_ttl_secs}

[rate_limit]
# Minimum spacing between requests of the same kind
hot_list_interval_ms = {hot_list_interval_ms}
detail_interval_ms = {detail_interval_ms}
jitter_ms = {jitter_ms}

[retry]
hot_list_max_attempts = {hot_list_max_attempts}
hot_list_delay_ms = {hot_list_delay_ms}
detail_max_attempts = {detail_max_attempts}
detail_delay_ms = {detail_delay_ms}
backoff_multiplier = {backoff_multiplier}

[crawler]
max_items = {max_items}
# Drop the pinned first entry of the hot list
skip_top_item = true
detail_fan_out = {detail_fan_out}

[download]
enabled = false
directory = "downloads"
concurrency = {concurrency}
max_attempts = {download_attempts}
retry_delay_ms = {download_delay_ms}
# Bytes; 0 = unlimited
max_file_size = {max_file_size}
timeout_secs = {download_timeout_secs}

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            hot_list_api_url = defaults.source.hot_list_api_url,
            detail_api_url_template = defaults.source.detail_api_url_template,
            hot_list_page_url = defaults.source.hot_list_page_url,
            video_page_url = defaults.source.video_page_url,
            cookie_env = env::COOKIE,
            user_agent = defaults.source.user_agent,
            connect_timeout_secs = defaults.source.connect_timeout_secs,
            hot_list_timeout_secs = defaults.source.hot_list_timeout_secs,
            detail_timeout_secs = defaults.source.detail_timeout_secs,
            max_memory_entries = defaults.cache.max_memory_entries,
            hot_list_ttl_secs = defaults.cache.hot_list_ttl_secs,
            detail_ttl_secs = defaults.cache.detail_ttl_secs,
            hot_list_interval_ms = defaults.rate_limit.hot_list_interval_ms,
            detail_interval_ms = defaults.rate_limit.detail_interval_ms,
            jitter_ms = defaults.rate_limit.jitter_ms,
            hot_list_max_attempts = defaults.retry.hot_list_max_attempts,
            hot_list_delay_ms = defaults.retry.hot_list_delay_ms,
            detail_max_attempts = defaults.retry.detail_max_attempts,
            detail_delay_ms = defaults.retry.detail_delay_ms,
            backoff_multiplier = defaults.retry.backoff_multiplier,
            max_items = defaults.crawler.max_items,
            detail_fan_out = defaults.crawler.detail_fan_out,
            concurrency = defaults.download.concurrency,
            download_attempts = defaults.download.max_attempts,
            download_delay_ms = defaults.download.retry_delay_ms,
            max_file_size = defaults.download.max_file_size,
            download_timeout_secs = defaults.download.timeout_secs,
            level = defaults.logging.level,
        )
    }
}

impl SourceConfigToml {
    /// Convert to runtime SourceConfig
    pub fn to_runtime_config(&self) -> SourceConfig {
        SourceConfig {
            hot_list_api_url: self.hot_list_api_url.clone(),
            detail_api_url_template: self.detail_api_url_template.clone(),
            hot_list_page_url: self.hot_list_page_url.clone(),
            cookie: self.cookie.clone(),
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            // The orchestrator enforces the per-endpoint timeouts; this is an outer bound
            request_timeout: Duration::from_secs(
                self.hot_list_timeout_secs.max(self.detail_timeout_secs),
            ),
        }
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig
    pub fn to_runtime_config(&self) -> CacheConfig {
        CacheConfig {
            snapshot_path: self
                .snapshot_path
                .clone()
                .unwrap_or_else(default_snapshot_path),
            max_memory_entries: self.max_memory_entries,
            enabled: self.enabled,
        }
    }
}

impl RateLimitConfigToml {
    /// Convert to runtime RateLimitConfig
    pub fn to_runtime_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            hot_list_interval: Duration::from_millis(self.hot_list_interval_ms),
            detail_interval: Duration::from_millis(self.detail_interval_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

impl DownloadConfigToml {
    /// Convert to runtime DownloadConfig
    pub fn to_runtime_config(&self) -> DownloadConfig {
        DownloadConfig {
            concurrency: self.concurrency,
            retry: RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms)),
            max_file_size: (self.max_file_size > 0).then_some(self.max_file_size),
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            field: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_env_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            value: value.to_string(),
            reason: "Expected true/false".to_string(),
        }),
    }
}

fn is_http_url(value: &str) -> bool {
    // Templates carry a placeholder that is not a valid URL character
    url::Url::parse(&value.replace("{id}", "0"))
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
