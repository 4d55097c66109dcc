//! Fetch orchestration
//!
//! [`FetchOrchestrator`] composes the cache, rate limiter and retry policy in
//! front of a [`HotListSource`](crate::app::source::HotListSource).

pub mod config;
pub mod inflight;
pub mod orchestrator;
pub mod stats;

pub use config::{EndpointPolicy, FetchConfig};
pub use inflight::InFlight;
pub use orchestrator::{hot_list_view, FetchOrchestrator};
pub use stats::FetchStats;
