//! One fetch run, end to end
//!
//! A [`Session`] sweeps expired cache entries, fetches the hot list, attaches
//! item details when asked, and downloads media. The resulting [`RunReport`]
//! decides the process outcome: a hot-list failure is an error, and a
//! download batch only fails the run when nothing in it succeeded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::cache::CacheStore;
use crate::app::download::{
    tasks_for_items, DownloadEvent, DownloadManager, DownloadResult, DownloadSummary,
    HttpTransport,
};
use crate::app::fetch::{FetchOrchestrator, FetchStats};
use crate::app::models::HotListItem;
use crate::app::rate_limit::RateLimiter;
use crate::app::source::HttpSource;
use crate::config::RuntimeConfig;
use crate::errors::Result;

/// What a run should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_items: usize,
    /// Fetch item details even when not downloading
    pub with_details: bool,
    pub download: bool,
    pub download_dir: PathBuf,
    pub concurrency: usize,
}

impl SessionOptions {
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            max_items: config.max_items,
            with_details: false,
            download: config.download_enabled,
            download_dir: config.download_dir.clone(),
            concurrency: config.download.concurrency,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub items: Vec<HotListItem>,
    #[serde(skip)]
    pub download_results: Vec<DownloadResult>,
    /// Present when downloads were requested
    pub downloads: Option<DownloadSummary>,
    pub fetch_stats: FetchStats,
}

impl RunReport {
    /// False only when downloads were requested and none succeeded
    pub fn is_success(&self) -> bool {
        self.downloads
            .as_ref()
            .map_or(true, DownloadSummary::is_success)
    }
}

/// Composes the orchestrator and the download manager for a run
#[derive(Debug)]
pub struct Session {
    orchestrator: Arc<FetchOrchestrator>,
    downloads: DownloadManager,
    detail_fan_out: usize,
}

impl Session {
    pub fn new(
        orchestrator: Arc<FetchOrchestrator>,
        downloads: DownloadManager,
        detail_fan_out: usize,
    ) -> Self {
        Self {
            orchestrator,
            downloads,
            detail_fan_out,
        }
    }

    /// Wire up the HTTP-backed components described by `config`
    pub fn build(config: &RuntimeConfig, cancel: CancellationToken) -> Result<Self> {
        let source = HttpSource::new(config.source.clone())?;
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let orchestrator = FetchOrchestrator::with_cancellation(
            Arc::new(source),
            cache,
            limiter,
            config.fetch.clone(),
            cancel.clone(),
        );

        let transport =
            HttpTransport::from_source_config(&config.source, config.download.request_timeout)?;
        let downloads =
            DownloadManager::with_cancellation(Arc::new(transport), config.download.clone(), cancel);

        Ok(Self::new(
            Arc::new(orchestrator),
            downloads,
            config.detail_fan_out,
        ))
    }

    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.orchestrator
    }

    /// Execute a run
    ///
    /// Download progress is reported on `events` when given.
    pub async fn run(
        &self,
        options: &SessionOptions,
        events: Option<mpsc::Sender<DownloadEvent>>,
    ) -> Result<RunReport> {
        match self.orchestrator.cache().sweep_expired().await {
            Ok(0) => {}
            Ok(removed) => info!("Removed {} expired cache entries", removed),
            Err(e) => warn!("Cache sweep failed: {}", e),
        }

        let mut items = self.orchestrator.get_hot_list(options.max_items).await?;
        info!("Fetched {} hot-list items", items.len());

        if options.with_details || options.download {
            items = self
                .orchestrator
                .enrich_items(&items, self.detail_fan_out)
                .await;
        }

        let mut download_results = Vec::new();
        let mut downloads = None;
        if options.download {
            let tasks = tasks_for_items(&items, &options.download_dir);
            if tasks.len() < items.len() {
                warn!(
                    "{} of {} items have no downloadable media",
                    items.len() - tasks.len(),
                    items.len()
                );
            }

            let started = Instant::now();
            download_results = self
                .downloads
                .run_with_progress(tasks, options.concurrency, events)
                .await;
            let summary = DownloadSummary::from_results(&download_results, started.elapsed());
            info!("{}", summary.summary());
            downloads = Some(summary);
        }

        Ok(RunReport {
            items,
            download_results,
            downloads,
            fetch_stats: self.orchestrator.stats(),
        })
    }
}
