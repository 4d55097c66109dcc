//! Shared fixtures for integration tests
//!
//! Provides scripted in-memory collaborators so the fetch pipeline and the
//! download manager can be exercised without a network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use hotlist_fetcher::app::{
    CacheConfig, CacheStore, DownloadTask, FetchConfig, FetchOrchestrator, HotListSource,
    MediaResponse, MediaTransport, RateLimitConfig, RateLimiter, RetryPolicy,
};
use hotlist_fetcher::errors::{SourceError, SourceResult, TransferResult};

/// Hot-list payload with `count` entries at positions 1..=count
pub fn hot_list_json(count: u32) -> Value {
    let words: Vec<Value> = (1..=count)
        .map(|position| {
            json!({
                "sentence_id": format!("s{}", position),
                "word": format!("Trending topic {}", position),
                "position": position,
                "hot_value": 10_000 - position * 10,
                "view_count": position * 100,
            })
        })
        .collect();
    json!({ "data": { "word_list": words } })
}

/// Detail payload whose media lives at `https://media.test/{id}.mp4`
pub fn detail_json(id: &str) -> Value {
    json!({
        "aweme_detail": {
            "aweme_id": format!("v-{}", id),
            "desc": format!("clip for {}", id),
            "video": { "play_addr": { "url_list": [format!("https://media.test/{}.mp4", id)] } }
        }
    })
}

/// Scripted hot-list source counting every call
#[derive(Default)]
pub struct MockSource {
    hot_list: Mutex<VecDeque<SourceResult<Value>>>,
    pub hot_list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub delay: Duration,
}

impl MockSource {
    /// Source answering hot-list calls with `responses`, in order
    ///
    /// Once the script is exhausted the last successful shape is not
    /// repeated; further calls fail with a transport error.
    pub fn new(responses: Vec<SourceResult<Value>>) -> Self {
        Self {
            hot_list: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hot_list_calls(&self) -> usize {
        self.hot_list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HotListSource for MockSource {
    async fn fetch_hot_list_raw(&self) -> SourceResult<Value> {
        self.hot_list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.hot_list
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::transport("script exhausted")))
    }

    async fn fetch_item_detail_raw(&self, id: &str) -> SourceResult<Value> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(detail_json(id))
    }
}

/// How the mock transport answers one URL
#[derive(Clone)]
pub enum MockBody {
    /// Full body with a matching content length
    Complete(Vec<u8>),
    /// Sends the prefix, then fails with a transport error
    FailAfter(Vec<u8>, u64),
    /// Sends the prefix, then never yields again
    Stall(Vec<u8>),
    /// Refuses the request with an HTTP status
    Status(u16),
}

/// In-memory media server keyed by URL
#[derive(Default)]
pub struct MockTransport {
    bodies: HashMap<String, MockBody>,
    opens: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, body: MockBody) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn open(&self, task: &DownloadTask) -> TransferResult<MediaResponse> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(&task.source_url)
            .cloned()
            .unwrap_or(MockBody::Status(404));

        let response = match body {
            MockBody::Complete(bytes) => {
                let len = bytes.len() as u64;
                MediaResponse::from_chunks(Some(len), vec![Ok(Bytes::from(bytes))])
            }
            MockBody::FailAfter(prefix, declared) => MediaResponse::from_chunks(
                Some(declared),
                vec![
                    Ok(Bytes::from(prefix)),
                    Err(SourceError::transport("connection reset mid-body")),
                ],
            ),
            MockBody::Stall(prefix) => {
                let declared = prefix.len() as u64 * 2;
                let body = futures::stream::iter(vec![Ok(Bytes::from(prefix))])
                    .chain(futures::stream::pending())
                    .boxed();
                MediaResponse::new(Some(declared), body)
            }
            MockBody::Status(status) => {
                return Err(SourceError::from_status(status)
                    .unwrap_or_else(|| SourceError::transport("unexpected status"))
                    .into())
            }
        };
        Ok(response)
    }
}

/// Fast retry policy for tests
pub fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10))
}

/// Cache backed by a snapshot file inside `dir`
pub fn cache_in(dir: &Path) -> Arc<CacheStore> {
    Arc::new(CacheStore::new(CacheConfig::with_snapshot_path(
        dir.join("cache.json"),
    )))
}

/// Orchestrator over `source` with no request spacing and quick retries
pub fn orchestrator(source: Arc<MockSource>, cache: Arc<CacheStore>) -> FetchOrchestrator {
    FetchOrchestrator::new(
        source,
        cache,
        Arc::new(RateLimiter::new(&RateLimitConfig::disabled())),
        FetchConfig::default().with_retry(quick_retry(3), quick_retry(2)),
    )
}
