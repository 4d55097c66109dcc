//! Cache-first fetching of the hot list and item details
//!
//! Every lookup consults the [`CacheStore`] first. On a miss the request
//! passes the [`RateLimiter`] gate for its endpoint class, runs through the
//! endpoint's [`RetryPolicy`](crate::app::retry::RetryPolicy), is validated,
//! and the full validated result is written back to the cache. Concurrent
//! lookups of the same key share a single fetch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{EndpointPolicy, FetchConfig};
use super::inflight::InFlight;
use super::stats::{FetchCounters, FetchStats};
use crate::app::cache::CacheStore;
use crate::app::models::{parse_hot_list, parse_item_detail, HotListItem, ItemDetail};
use crate::app::rate_limit::{EndpointClass, RateLimiter};
use crate::app::retry::{classify_source_error, RetryError};
use crate::app::source::HotListSource;
use crate::constants::{DETAIL_KEY_PREFIX, HOT_LIST_KEY};
use crate::errors::{FetchError, FetchResult, SourceError, SourceResult};

/// Answers hot-list and detail queries with at most one fetch in flight per key
pub struct FetchOrchestrator {
    source: Arc<dyn HotListSource>,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    config: FetchConfig,
    hot_lists: InFlight<FetchResult<Vec<HotListItem>>>,
    details: InFlight<FetchResult<ItemDetail>>,
    stats: FetchCounters,
    cancel: CancellationToken,
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("cache", &self.cache.snapshot_path())
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl FetchOrchestrator {
    pub fn new(
        source: Arc<dyn HotListSource>,
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
        config: FetchConfig,
    ) -> Self {
        Self::with_cancellation(source, cache, limiter, config, CancellationToken::new())
    }

    /// Create an orchestrator whose retry loops stop once `cancel` fires
    pub fn with_cancellation(
        source: Arc<dyn HotListSource>,
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
        config: FetchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            cache,
            limiter,
            config,
            hot_lists: InFlight::new(),
            details: InFlight::new(),
            stats: FetchCounters::default(),
            cancel,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Current request counters
    pub fn stats(&self) -> FetchStats {
        self.stats.snapshot()
    }

    /// Ranked hot list, at most `max_items` long
    ///
    /// The full validated list is cached under one constant key; the pinned
    /// top entry is dropped (when configured) and truncation applied on every
    /// read.
    pub async fn get_hot_list(&self, max_items: usize) -> FetchResult<Vec<HotListItem>> {
        let source = &self.source;
        let page_url = self.config.hot_list_page_url.as_str();

        let full = self
            .load(
                HOT_LIST_KEY,
                EndpointClass::HotList,
                &self.config.hot_list,
                &self.hot_lists,
                move || source.fetch_hot_list_raw(),
                move |raw| parse_hot_list(raw, page_url),
            )
            .await?;

        Ok(hot_list_view(&full, max_items, self.config.skip_top_item))
    }

    /// Detail record for one item
    pub async fn get_item_detail(&self, item_id: &str) -> FetchResult<ItemDetail> {
        let key = format!("{}{}", DETAIL_KEY_PREFIX, item_id);
        if item_id.trim().is_empty() {
            return Err(FetchError::DataIntegrity {
                key,
                reason: "item id is empty".to_string(),
            });
        }

        let source = &self.source;
        let video_url = self.config.video_page_url.as_str();

        self.load(
            &key,
            EndpointClass::Detail,
            &self.config.detail,
            &self.details,
            move || source.fetch_item_detail_raw(item_id),
            move |raw| parse_item_detail(raw, video_url),
        )
        .await
    }

    /// Attach details to `items`, fetching at most `concurrency` at a time
    ///
    /// Returns new items in the input order. An item whose detail cannot be
    /// fetched is returned unchanged.
    pub async fn enrich_items(
        &self,
        items: &[HotListItem],
        concurrency: usize,
    ) -> Vec<HotListItem> {
        let enriched: Vec<HotListItem> = futures::stream::iter(items)
            .map(|item| async move {
                match self.get_item_detail(&item.item_id).await {
                    Ok(detail) => item.with_detail(detail),
                    Err(e) => {
                        warn!("No detail for #{} '{}': {}", item.position, item.title, e);
                        item.clone()
                    }
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let with_detail = enriched.iter().filter(|item| item.detail.is_some()).count();
        info!("Enriched {}/{} items with details", with_detail, items.len());
        enriched
    }

    async fn load<T, Call, CallFut, Parse>(
        &self,
        key: &str,
        class: EndpointClass,
        policy: &EndpointPolicy,
        inflight: &InFlight<FetchResult<T>>,
        call: Call,
        parse: Parse,
    ) -> FetchResult<T>
    where
        T: Clone + Serialize + DeserializeOwned,
        Call: Fn() -> CallFut,
        CallFut: Future<Output = SourceResult<Value>>,
        Parse: Fn(&Value) -> Result<T, String>,
    {
        if let Some(cached) = self.cache.get_as::<T>(key).await {
            self.stats.cache_hit();
            return Ok(cached);
        }

        let (result, led) = inflight
            .run(key, || async {
                // Another caller may have completed this key since our miss
                if let Some(cached) = self.cache.get_as::<T>(key).await {
                    self.stats.cache_hit();
                    return Ok(cached);
                }
                self.fetch_and_store(key, class, policy, call, parse).await
            })
            .await;

        if !led {
            self.stats.joined();
            debug!("Joined pending fetch for '{}'", key);
        }
        result
    }

    async fn fetch_and_store<T, Call, CallFut, Parse>(
        &self,
        key: &str,
        class: EndpointClass,
        policy: &EndpointPolicy,
        call: Call,
        parse: Parse,
    ) -> FetchResult<T>
    where
        T: Serialize,
        Call: Fn() -> CallFut,
        CallFut: Future<Output = SourceResult<Value>>,
        Parse: Fn(&Value) -> Result<T, String>,
    {
        info!("Fetching '{}' from {} endpoint", key, class);

        let raw = policy
            .retry
            .execute_with_cancel(
                &self.cancel,
                || self.request(class, policy.timeout, &call),
                classify_source_error,
            )
            .await
            .map_err(|e| retry_error_to_fetch(key, e));

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.outcome(false);
                error!("Fetch for '{}' failed: {}", key, e);
                return Err(e);
            }
        };

        let value = match parse(&raw) {
            Ok(value) => value,
            Err(reason) => {
                self.stats.outcome(false);
                warn!("Rejected response for '{}': {}", key, reason);
                return Err(FetchError::DataIntegrity {
                    key: key.to_string(),
                    reason,
                });
            }
        };

        if let Err(e) = self.cache.put_as(key, &value, policy.ttl_seconds).await {
            warn!("Failed to cache '{}': {}", key, e);
        }

        self.stats.outcome(true);
        Ok(value)
    }

    /// One rate-limited, time-bounded source call
    async fn request<Call, CallFut>(
        &self,
        class: EndpointClass,
        timeout: Duration,
        call: &Call,
    ) -> SourceResult<Value>
    where
        Call: Fn() -> CallFut,
        CallFut: Future<Output = SourceResult<Value>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(SourceError::Cancelled),
            _ = self.limiter.acquire(class) => {}
        }

        self.stats.network_request();
        let pending = call();

        if timeout.is_zero() {
            return tokio::select! {
                _ = self.cancel.cancelled() => Err(SourceError::Cancelled),
                result = pending => result,
            };
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(SourceError::Cancelled),
            result = tokio::time::timeout(timeout, pending) => {
                result.unwrap_or(Err(SourceError::Timeout { seconds: timeout.as_secs() }))
            }
        }
    }
}

fn retry_error_to_fetch(key: &str, error: RetryError<SourceError>) -> FetchError {
    let key = key.to_string();
    match error {
        RetryError::Exhausted { attempts, last } => FetchError::FetchFailed {
            key,
            attempts,
            last,
        },
        RetryError::Cancelled { .. } | RetryError::Fatal(SourceError::Cancelled) => {
            FetchError::Cancelled { key }
        }
        RetryError::Fatal(SourceError::Decode { reason }) => {
            FetchError::DataIntegrity { key, reason }
        }
        RetryError::Fatal(error) => FetchError::Rejected { key, error },
    }
}

/// Apply the skip-top policy and truncation to a full hot list
pub fn hot_list_view(items: &[HotListItem], max_items: usize, skip_top: bool) -> Vec<HotListItem> {
    let start = usize::from(skip_top && items.len() > 1);
    items.iter().skip(start).take(max_items).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::CacheConfig;
    use crate::app::clock::ManualClock;
    use crate::app::rate_limit::RateLimitConfig;
    use crate::app::retry::RetryPolicy;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct ScriptedSource {
        hot_list: Mutex<VecDeque<SourceResult<Value>>>,
        detail: Mutex<VecDeque<SourceResult<Value>>>,
        hot_list_calls: AtomicUsize,
        detail_calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn with_hot_list(responses: Vec<SourceResult<Value>>) -> Self {
            Self {
                hot_list: Mutex::new(responses.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl HotListSource for ScriptedSource {
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
            match self.detail.lock().await.pop_front() {
                Some(response) => response,
                None => Ok(detail_json(id)),
            }
        }
    }

    fn hot_list_json(count: u32) -> Value {
        let words: Vec<Value> = (1..=count)
            .map(|position| {
                json!({
                    "sentence_id": format!("s{}", position),
                    "word": format!("Topic {}", position),
                    "position": position,
                    "hot_value": 1000 - position,
                    "view_count": 10 * position,
                })
            })
            .collect();
        json!({ "data": { "word_list": words } })
    }

    fn detail_json(id: &str) -> Value {
        json!({
            "aweme_detail": {
                "aweme_id": id,
                "desc": "clip",
                "video": { "play_addr": { "url_list": [format!("https://cdn.example.com/{}.mp4", id)] } }
            }
        })
    }

    struct Harness {
        orchestrator: Arc<FetchOrchestrator>,
        source: Arc<ScriptedSource>,
        clock: Arc<ManualClock>,
        _dir: TempDir,
    }

    fn harness(source: ScriptedSource, config: FetchConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(CacheStore::with_clock(
            CacheConfig::with_snapshot_path(dir.path().join("cache.json")),
            clock.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::disabled()));
        let source = Arc::new(source);
        let orchestrator = Arc::new(FetchOrchestrator::new(
            source.clone(),
            cache,
            limiter,
            config,
        ));
        Harness {
            orchestrator,
            source,
            clock,
            _dir: dir,
        }
    }

    fn fast_config() -> FetchConfig {
        FetchConfig::default().with_retry(
            RetryPolicy::new(3, Duration::from_millis(10)),
            RetryPolicy::new(2, Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn test_skip_top_and_truncation() {
        let h = harness(
            ScriptedSource::with_hot_list(vec![Ok(hot_list_json(12))]),
            fast_config(),
        );

        let items = h.orchestrator.get_hot_list(10).await.unwrap();
        let positions: Vec<u32> = items.iter().map(|item| item.position).collect();
        assert_eq!(positions, (2..=11).collect::<Vec<_>>());

        // Different truncation is served from the same cached list
        let items = h.orchestrator.get_hot_list(3).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(h.source.hot_list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_no_skip_top_keeps_first_item() {
        let h = harness(
            ScriptedSource::with_hot_list(vec![Ok(hot_list_json(5))]),
            fast_config().with_skip_top_item(false),
        );

        let items = h.orchestrator.get_hot_list(10).await.unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].position, 1);
    }

    #[test]
    fn test_view_keeps_single_item() {
        let items = parse_hot_list(&hot_list_json(1), "https://example.com/hot").unwrap();
        assert_eq!(hot_list_view(&items, 10, true).len(), 1);
        assert!(hot_list_view(&items, 0, false).is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let h = harness(
            ScriptedSource::with_hot_list(vec![Ok(hot_list_json(3)), Ok(hot_list_json(4))]),
            fast_config().with_skip_top_item(false),
        );

        assert_eq!(h.orchestrator.get_hot_list(10).await.unwrap().len(), 3);
        h.clock.advance(Duration::from_secs(3601));
        assert_eq!(h.orchestrator.get_hot_list(10).await.unwrap().len(), 4);
        assert_eq!(h.source.hot_list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_cached() {
        let h = harness(
            ScriptedSource::with_hot_list(vec![
                Ok(json!({ "data": { "word_list": [] } })),
                Ok(hot_list_json(3)),
            ]),
            fast_config(),
        );

        let error = h.orchestrator.get_hot_list(10).await.unwrap_err();
        assert!(matches!(error, FetchError::DataIntegrity { .. }));
        assert_eq!(error.key(), HOT_LIST_KEY);

        let items = h.orchestrator.get_hot_list(10).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(h.source.hot_list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unwritable_cache_does_not_fail_fetch() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"plain file").unwrap();

        // Snapshot lives under a regular file, so every write fails
        let cache = Arc::new(CacheStore::new(
            CacheConfig::with_snapshot_path(blocker.join("cache.json")).with_max_memory_entries(0),
        ));
        let source = Arc::new(ScriptedSource::with_hot_list(vec![
            Ok(hot_list_json(4)),
            Ok(hot_list_json(4)),
        ]));
        let orchestrator = FetchOrchestrator::new(
            source.clone(),
            cache,
            Arc::new(RateLimiter::new(&RateLimitConfig::disabled())),
            fast_config(),
        );

        let items = orchestrator.get_hot_list(10).await.unwrap();
        assert_eq!(items.len(), 3);

        // Nothing was cached, so the next lookup goes back to the source
        let items = orchestrator.get_hot_list(10).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(source.hot_list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.stats().successes, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_as_fetch_failed() {
        let h = harness(
            ScriptedSource::with_hot_list(vec![
                Err(SourceError::transport("reset")),
                Err(SourceError::transport("reset")),
                Err(SourceError::transport("reset")),
            ]),
            fast_config(),
        );

        let error = h.orchestrator.get_hot_list(10).await.unwrap_err();
        assert_eq!(
            error,
            FetchError::FetchFailed {
                key: HOT_LIST_KEY.to_string(),
                attempts: 3,
                last: SourceError::transport("reset"),
            }
        );
        assert_eq!(h.orchestrator.stats().failures, 1);
        assert_eq!(h.orchestrator.stats().network_requests, 3);
    }

    #[tokio::test]
    async fn test_client_error_is_rejected_without_retry() {
        let h = harness(
            ScriptedSource::with_hot_list(vec![Err(SourceError::ClientError { status: 403 })]),
            fast_config(),
        );

        let error = h.orchestrator.get_hot_list(10).await.unwrap_err();
        assert!(matches!(error, FetchError::Rejected { .. }));
        assert_eq!(h.source.hot_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_and_retries() {
        let mut config = fast_config();
        config.hot_list.timeout = Duration::from_millis(100);
        let source = ScriptedSource {
            delay: Duration::from_secs(5),
            ..ScriptedSource::with_hot_list(vec![Ok(hot_list_json(3)); 3])
        };
        let h = harness(source, config);

        let error = h.orchestrator.get_hot_list(10).await.unwrap_err();
        assert!(matches!(
            error,
            FetchError::FetchFailed {
                last: SourceError::Timeout { .. },
                ..
            }
        ));
        assert_eq!(h.source.hot_list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_detail_requests_collapse() {
        let source = ScriptedSource {
            delay: Duration::from_secs(1),
            ..Default::default()
        };
        let h = harness(source, fast_config());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let orchestrator = h.orchestrator.clone();
                tokio::spawn(async move { orchestrator.get_item_detail("X").await })
            })
            .collect();

        for handle in handles {
            let detail = handle.await.unwrap().unwrap();
            assert_eq!(detail.media_id, "X");
        }
        assert_eq!(h.source.detail_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.stats().joined, 1);
    }

    #[tokio::test]
    async fn test_empty_item_id_is_rejected() {
        let h = harness(ScriptedSource::default(), fast_config());
        let error = h.orchestrator.get_item_detail("  ").await.unwrap_err();
        assert!(matches!(error, FetchError::DataIntegrity { .. }));
        assert_eq!(h.source.detail_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enrich_items_keeps_order_and_failures() {
        let source = ScriptedSource {
            hot_list: Mutex::new(vec![Ok(hot_list_json(4))].into()),
            detail: Mutex::new(
                vec![
                    Ok(detail_json("s1")),
                    Err(SourceError::ClientError { status: 404 }),
                ]
                .into(),
            ),
            ..Default::default()
        };
        let h = harness(source, fast_config().with_skip_top_item(false));

        let items = h.orchestrator.get_hot_list(4).await.unwrap();
        // One fetch at a time so the scripted responses map to items in order
        let enriched = h.orchestrator.enrich_items(&items, 1).await;

        assert_eq!(enriched.len(), 4);
        assert!(enriched[0].detail.is_some());
        assert_eq!(enriched[0].item_url, "https://www.douyin.com/video/s1");
        assert!(enriched[1].detail.is_none());
        assert_eq!(enriched[1].item_url, items[1].item_url);
        assert!(enriched[2].media_url().is_some());
        assert!(items.iter().all(|item| item.detail.is_none()));
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_fetching() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = Arc::new(ScriptedSource::with_hot_list(vec![Ok(hot_list_json(3))]));
        let orchestrator = FetchOrchestrator::with_cancellation(
            source.clone(),
            Arc::new(CacheStore::new(
                CacheConfig::with_snapshot_path(dir.path().join("cache.json")),
            )),
            Arc::new(RateLimiter::new(&RateLimitConfig::disabled())),
            fast_config(),
            cancel,
        );

        let error = orchestrator.get_hot_list(10).await.unwrap_err();
        assert_eq!(
            error,
            FetchError::Cancelled {
                key: HOT_LIST_KEY.to_string()
            }
        );
        assert_eq!(source.hot_list_calls.load(Ordering::SeqCst), 0);
    }
}
