//! Hotlist Fetcher Library
//!
//! Fetches a ranked hot list from a remote HTTP API, enriches entries with
//! item details, and downloads their media. Responses are cached on disk,
//! requests are spaced per endpoint and retried with backoff, and concurrent
//! requests for the same resource are collapsed into one.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
