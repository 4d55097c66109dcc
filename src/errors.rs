//! Error types for Hotlist Fetcher
//!
//! This module defines the error types for every layer of the application.
//! Each concern owns an enum; all of them map onto the shared [`ErrorKind`]
//! taxonomy so retry classification and run summaries can reason about a
//! failure without knowing which layer produced it.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy shared by all layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failure or timeout
    Transport,
    /// Upstream asked us to slow down
    RateLimited,
    /// Upstream failed with a 5xx-equivalent
    ServerRejected,
    /// Request rejected as invalid (4xx-equivalent)
    ClientError,
    /// Malformed or incomplete response
    DataIntegrity,
    /// Retries ran out
    ExhaustedRetries,
    /// Disk snapshot unreadable
    CacheCorrupt,
    /// Run-level cancellation
    Cancelled,
    /// Local file system failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerRejected => "server_rejected",
            ErrorKind::ClientError => "client_error",
            ErrorKind::DataIntegrity => "data_integrity",
            ErrorKind::ExhaustedRetries => "exhausted_retries",
            ErrorKind::CacheCorrupt => "cache_corrupt",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}

/// Errors raised by a hot-list source collaborator
///
/// Carried by value through shared in-flight results, so every variant is
/// cheap to clone and holds no foreign error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connection could not be established or was dropped
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// Request did not complete in time
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Upstream rate limit hit
    #[error("Rate limited by upstream. Server responded with HTTP 429")]
    RateLimited,

    /// Upstream server error
    #[error("Server rejected request: HTTP {status}")]
    ServerRejected { status: u16 },

    /// Request refused as invalid
    #[error("Client error: HTTP {status}")]
    ClientError { status: u16 },

    /// Response body could not be decoded
    #[error("Malformed response: {reason}")]
    Decode { reason: String },

    /// Request abandoned because the run was cancelled
    #[error("Request cancelled")]
    Cancelled,
}

impl SourceError {
    /// Create a transport error from any displayable cause
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status onto the taxonomy
    ///
    /// Returns `None` for 1xx/2xx/3xx statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited),
            400..=499 => Some(Self::ClientError { status }),
            500..=599 => Some(Self::ServerRejected { status }),
            _ => None,
        }
    }

    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Transport { .. } | SourceError::Timeout { .. } => ErrorKind::Transport,
            SourceError::RateLimited => ErrorKind::RateLimited,
            SourceError::ServerRejected { .. } => ErrorKind::ServerRejected,
            SourceError::ClientError { .. } => ErrorKind::ClientError,
            SourceError::Decode { .. } => ErrorKind::DataIntegrity,
            SourceError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Errors surfaced by the fetch orchestrator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Response failed structural validation; never cached
    #[error("Data integrity failure for '{key}': {reason}")]
    DataIntegrity { key: String, reason: String },

    /// Retries exhausted on a retryable failure
    #[error("Fetch failed for '{key}' after {attempts} attempt(s): {last}")]
    FetchFailed {
        key: String,
        attempts: u32,
        last: SourceError,
    },

    /// Fatal source failure propagated after a single attempt
    #[error("Fetch for '{key}' rejected: {error}")]
    Rejected {
        key: String,
        #[source]
        error: SourceError,
    },

    /// Run was cancelled before the fetch resolved
    #[error("Fetch for '{key}' cancelled")]
    Cancelled { key: String },
}

impl FetchError {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::DataIntegrity { .. } => ErrorKind::DataIntegrity,
            FetchError::FetchFailed { .. } => ErrorKind::ExhaustedRetries,
            FetchError::Rejected { error, .. } => error.kind(),
            FetchError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Cache key the failing request was made for
    pub fn key(&self) -> &str {
        match self {
            FetchError::DataIntegrity { key, .. }
            | FetchError::FetchFailed { key, .. }
            | FetchError::Rejected { key, .. }
            | FetchError::Cancelled { key } => key,
        }
    }
}

/// Cache management errors
///
/// None of these abort a run; the cache is an optimisation.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Snapshot exists but cannot be parsed
    #[error("Cache snapshot corrupted at {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// I/O failure reading or writing the snapshot
    #[error("Cache I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be serialized
    #[error("Failed to serialize cache snapshot")]
    Serialize(#[from] serde_json::Error),

    /// Atomic replace of the snapshot failed
    #[error("Atomic cache write failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

impl CacheError {
    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::CacheCorrupt { .. } => ErrorKind::CacheCorrupt,
            _ => ErrorKind::Io,
        }
    }
}

/// Download errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// Transfer failed at the network layer
    #[error(transparent)]
    Source(#[from] SourceError),

    /// I/O error during file operations
    #[error("File I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Completed transfer does not match the declared size
    #[error("File size mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Media exceeds the configured size limit
    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// Body ended before the advertised length
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Retries exhausted; wraps the last underlying error
    #[error("Maximum retry attempts ({attempts}) exceeded: {last}")]
    ExhaustedRetries {
        attempts: u32,
        last: Box<DownloadError>,
    },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Run cancelled while the task was in progress
    #[error("Download cancelled")]
    Cancelled,

    /// Worker exited without reporting a result for the task
    #[error("Worker terminated before reporting a result")]
    WorkerLost,
}

impl DownloadError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Source(e) => e.kind(),
            DownloadError::Io { .. }
            | DownloadError::AtomicOperationFailed { .. }
            | DownloadError::WorkerLost => ErrorKind::Io,
            DownloadError::SizeMismatch { .. }
            | DownloadError::TooLarge { .. }
            | DownloadError::IncompleteDownload { .. } => ErrorKind::DataIntegrity,
            DownloadError::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
            DownloadError::InvalidUrl { .. } => ErrorKind::ClientError,
            DownloadError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Source collaborator error
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Fetch orchestration error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        let kind = match self {
            AppError::Source(e) => e.kind(),
            AppError::Fetch(e) => e.kind(),
            AppError::Download(e) => e.kind(),
            // Cache failures only ever cost a refetch
            AppError::Cache(_) => return true,
            _ => return false,
        };

        matches!(
            kind,
            ErrorKind::Transport
                | ErrorKind::RateLimited
                | ErrorKind::ServerRejected
                | ErrorKind::ExhaustedRetries
        )
    }

    /// Get error category for logging and summaries
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Source(_) => "source",
            AppError::Fetch(_) => "fetch",
            AppError::Cache(_) => "cache",
            AppError::Download(_) => "download",
            AppError::Config(_) => "config",
            AppError::Json(_) => "serialization",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Source result type alias
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Single-transfer result type alias
pub type TransferResult<T> = std::result::Result<T, DownloadError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
