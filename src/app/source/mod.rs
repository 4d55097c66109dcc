//! Hot-list source collaborator
//!
//! The orchestrator talks to the upstream site only through
//! [`HotListSource`]. [`HttpSource`] is the reqwest-backed implementation;
//! tests substitute in-memory sources.

pub mod config;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SourceResult;

pub use config::SourceConfig;
pub use http::HttpSource;

/// Raw access to the upstream hot list and item details
///
/// Implementations return the undecoded JSON document; validation happens in
/// the orchestrator.
#[async_trait]
pub trait HotListSource: Send + Sync {
    /// Fetch the current hot list
    async fn fetch_hot_list_raw(&self) -> SourceResult<Value>;

    /// Fetch the detail record for one item
    async fn fetch_item_detail_raw(&self, id: &str) -> SourceResult<Value>;
}

#[async_trait]
impl<S: HotListSource + ?Sized> HotListSource for Arc<S> {
    async fn fetch_hot_list_raw(&self) -> SourceResult<Value> {
        (**self).fetch_hot_list_raw().await
    }

    async fn fetch_item_detail_raw(&self, id: &str) -> SourceResult<Value> {
        (**self).fetch_item_detail_raw(id).await
    }
}
