//! Download manager configuration

use std::time::Duration;

use crate::app::retry::RetryPolicy;
use crate::constants::workers;
use crate::errors::{ConfigError, ConfigResult};

/// Settings for a [`DownloadManager`](super::DownloadManager)
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    /// Worker count a session passes to [`DownloadManager::run`](super::DownloadManager::run)
    pub concurrency: usize,
    /// Retry policy applied to every task
    pub retry: RetryPolicy,
    /// Largest accepted media size; `None` disables the check
    pub max_file_size: Option<u64>,
    /// Bound on one download attempt, body included
    pub request_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: workers::DEFAULT_CONCURRENCY,
            retry: RetryPolicy::new(
                workers::DOWNLOAD_MAX_ATTEMPTS,
                workers::DOWNLOAD_RETRY_DELAY,
            ),
            max_file_size: Some(workers::MAX_FILE_SIZE),
            request_timeout: workers::DOWNLOAD_TIMEOUT,
        }
    }
}

impl DownloadConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_file_size(mut self, limit: Option<u64>) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency == 0 || self.concurrency > workers::MAX_CONCURRENCY {
            return Err(ConfigError::InvalidValue {
                field: "download.concurrency".to_string(),
                value: self.concurrency.to_string(),
                reason: format!("Must be between 1 and {}", workers::MAX_CONCURRENCY),
            });
        }

        if self.max_file_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "download.max_file_size".to_string(),
                value: "0".to_string(),
                reason: "Must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
