//! Bounded-concurrency download pipeline
//!
//! [`DownloadManager::run`] answers every submitted task with exactly one
//! [`DownloadResult`]. Tasks whose destination is already complete are
//! skipped before any worker starts. The rest are pulled from a shared queue
//! by a fixed number of workers; each transfer streams into a temp file next
//! to the destination and is renamed into place only once it is complete and
//! verified.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::DownloadConfig;
use super::result::{DownloadEvent, DownloadResult, DownloadStatus};
use super::task::DownloadTask;
use super::transport::MediaTransport;
use crate::app::paths::{ensure_parent_dir, temp_path_for};
use crate::app::retry::{classify_source_error, RetryDecision, RetryError};
use crate::errors::{DownloadError, TransferResult};

/// Runs batches of [`DownloadTask`]s on a worker pool
#[derive(Clone)]
pub struct DownloadManager {
    transport: Arc<dyn MediaTransport>,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Per-task counters updated by the current attempt
#[derive(Debug, Default)]
struct AttemptProgress {
    attempts: AtomicU32,
    bytes: AtomicU64,
}

/// Locks serializing work on the same destination within one batch
type DestinationLocks = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

impl DownloadManager {
    pub fn new(transport: Arc<dyn MediaTransport>, config: DownloadConfig) -> Self {
        Self::with_cancellation(transport, config, CancellationToken::new())
    }

    /// Create a manager whose in-flight transfers are abandoned once `cancel` fires
    pub fn with_cancellation(
        transport: Arc<dyn MediaTransport>,
        config: DownloadConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `tasks` with at most `concurrency` transfers at a time
    ///
    /// Returns one result per task, in input order.
    pub async fn run(&self, tasks: Vec<DownloadTask>, concurrency: usize) -> Vec<DownloadResult> {
        self.run_with_progress(tasks, concurrency, None).await
    }

    /// Like [`run`](Self::run), reporting [`DownloadEvent`]s on `events`
    ///
    /// Events are dropped rather than awaited when the channel is full.
    pub async fn run_with_progress(
        &self,
        tasks: Vec<DownloadTask>,
        concurrency: usize,
        events: Option<mpsc::Sender<DownloadEvent>>,
    ) -> Vec<DownloadResult> {
        let total = tasks.len();
        let originals = tasks.clone();
        let mut slots: Vec<Option<DownloadResult>> = (0..total).map(|_| None).collect();
        let finished = Arc::new(AtomicUsize::new(0));

        let mut pending = Vec::new();
        for (index, task) in tasks.into_iter().enumerate() {
            match existing_complete_size(&task).await {
                Some(size) => {
                    debug!("Skipping existing file: {}", task.destination_path.display());
                    let result = DownloadResult::skipped(task, size);
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    emit(&events, finished_event(index, &result, done, total));
                    slots[index] = Some(result);
                }
                None => pending.push((index, task)),
            }
        }

        if !pending.is_empty() {
            let workers = concurrency.max(1).min(pending.len());
            info!(
                "Downloading {} file(s) with {} worker(s), {} already present",
                pending.len(),
                workers,
                total - pending.len()
            );

            let (task_tx, task_rx) = mpsc::channel(pending.len());
            for item in pending {
                // Capacity equals the number of items, so this never waits
                if task_tx.send(item).await.is_err() {
                    break;
                }
            }
            drop(task_tx);

            let task_rx = Arc::new(Mutex::new(task_rx));
            let locks: Arc<DestinationLocks> = Arc::new(Mutex::new(HashMap::new()));
            let (result_tx, mut result_rx) = mpsc::unbounded_channel();

            let handles: Vec<_> = (0..workers)
                .map(|worker_id| {
                    let manager = self.clone();
                    let task_rx = task_rx.clone();
                    let locks = locks.clone();
                    let result_tx = result_tx.clone();
                    let events = events.clone();
                    let finished = finished.clone();

                    tokio::spawn(async move {
                        loop {
                            let next = task_rx.lock().await.recv().await;
                            let Some((index, task)) = next else {
                                break;
                            };

                            emit(
                                &events,
                                DownloadEvent::Started {
                                    index,
                                    destination: task.destination_path.clone(),
                                },
                            );
                            let result = manager.process(task, &locks).await;
                            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                            emit(&events, finished_event(index, &result, done, total));

                            if result_tx.send((index, result)).is_err() {
                                break;
                            }
                        }
                        debug!("Download worker {} finished", worker_id);
                    })
                })
                .collect();
            drop(result_tx);

            while let Some((index, result)) = result_rx.recv().await {
                slots[index] = Some(result);
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    error!("Download worker panicked: {}", e);
                }
            }
        }

        slots
            .into_iter()
            .zip(originals)
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| {
                    warn!("No result recorded for {}", task.destination_path.display());
                    DownloadResult::failed(
                        task,
                        DownloadError::WorkerLost,
                        0,
                        0,
                        std::time::Duration::ZERO,
                    )
                })
            })
            .collect()
    }

    /// Run one task to its final result
    async fn process(&self, task: DownloadTask, locks: &DestinationLocks) -> DownloadResult {
        let started = Instant::now();

        let lock = {
            let mut locks = locks.lock().await;
            locks
                .entry(task.destination_path.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        // An earlier task in this batch may have produced the file meanwhile
        if let Some(size) = existing_complete_size(&task).await {
            debug!(
                "Skipping file completed earlier in batch: {}",
                task.destination_path.display()
            );
            return DownloadResult::skipped(task, size);
        }

        let progress = AttemptProgress::default();
        let outcome = self
            .config
            .retry
            .execute_with_cancel(
                &self.cancel,
                || self.attempt(&task, &progress),
                classify_download_error,
            )
            .await;

        let attempts = progress.attempts.load(Ordering::SeqCst);
        match outcome {
            Ok(written) => {
                info!(
                    "Downloaded {} ({} bytes)",
                    task.destination_path.display(),
                    written
                );
                DownloadResult::completed(task, written, attempts, started.elapsed())
            }
            Err(e) => {
                let error = match e {
                    RetryError::Exhausted { attempts, last } => DownloadError::ExhaustedRetries {
                        attempts,
                        last: Box::new(last),
                    },
                    RetryError::Fatal(error) => error,
                    RetryError::Cancelled { .. } => DownloadError::Cancelled,
                };
                warn!(
                    "Download of {} failed: {}",
                    task.destination_path.display(),
                    error
                );
                let bytes = progress.bytes.load(Ordering::SeqCst);
                DownloadResult::failed(task, error, bytes, attempts, started.elapsed())
            }
        }
    }

    /// One transfer attempt; the temp file never outlives a failed attempt
    async fn attempt(&self, task: &DownloadTask, progress: &AttemptProgress) -> TransferResult<u64> {
        progress.attempts.fetch_add(1, Ordering::SeqCst);
        progress.bytes.store(0, Ordering::SeqCst);

        let temp_path = temp_path_for(&task.destination_path);
        let outcome = match self.stream_to_temp(task, &temp_path, progress).await {
            Ok(_) if self.cancel.is_cancelled() => Err(DownloadError::Cancelled),
            Ok(written) => tokio::fs::rename(&temp_path, &task.destination_path)
                .await
                .map(|_| written)
                .map_err(|e| {
                    debug!("Rename failed: {}", e);
                    DownloadError::AtomicOperationFailed {
                        temp_path: temp_path.clone(),
                        final_path: task.destination_path.clone(),
                    }
                }),
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            remove_temp_file(&temp_path).await;
        }
        outcome
    }

    async fn stream_to_temp(
        &self,
        task: &DownloadTask,
        temp_path: &Path,
        progress: &AttemptProgress,
    ) -> TransferResult<u64> {
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.transport.open(task) => response?,
        };

        let declared = response.content_length;
        let limit = self.config.max_file_size;
        if let (Some(size), Some(limit)) = (declared, limit) {
            if size > limit {
                return Err(DownloadError::TooLarge { size, limit });
            }
        }
        if let (Some(actual), Some(expected)) = (declared, task.expected_size) {
            if actual != expected {
                return Err(DownloadError::SizeMismatch { expected, actual });
            }
        }

        ensure_parent_dir(&task.destination_path)
            .await
            .map_err(|e| DownloadError::io(&task.destination_path, &e))?;
        let mut file = File::create(temp_path)
            .await
            .map_err(|e| DownloadError::io(temp_path, &e))?;

        let mut body = response.body;
        let mut written: u64 = 0;
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            written += chunk.len() as u64;
            if let Some(limit) = limit {
                if written > limit {
                    return Err(DownloadError::TooLarge {
                        size: written,
                        limit,
                    });
                }
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(temp_path, &e))?;
            progress.bytes.store(written, Ordering::SeqCst);
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::io(temp_path, &e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(temp_path, &e))?;
        drop(file);

        // An empty file would never count as complete on the next run
        if written == 0 {
            return Err(DownloadError::IncompleteDownload {
                received: 0,
                expected: declared.or(task.expected_size).unwrap_or(1),
            });
        }

        if let Some(expected) = task.expected_size {
            if written != expected {
                return Err(DownloadError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }
        if let Some(expected) = declared {
            if written < expected {
                return Err(DownloadError::IncompleteDownload {
                    received: written,
                    expected,
                });
            }
        }

        Ok(written)
    }
}

/// Retry network failures and truncated bodies; everything else is final
pub fn classify_download_error(error: &DownloadError) -> RetryDecision {
    match error {
        DownloadError::Source(source) => classify_source_error(source),
        DownloadError::IncompleteDownload { .. } => RetryDecision::Retry,
        _ => RetryDecision::Abort,
    }
}

/// Size of the destination if it already holds a complete file
async fn existing_complete_size(task: &DownloadTask) -> Option<u64> {
    let metadata = tokio::fs::metadata(&task.destination_path).await.ok()?;
    let size = metadata.len();
    if !metadata.is_file() || size == 0 {
        return None;
    }
    match task.expected_size {
        Some(expected) if expected != size => {
            debug!(
                "Existing {} has {} bytes, expected {}",
                task.destination_path.display(),
                size,
                expected
            );
            None
        }
        _ => Some(size),
    }
}

async fn remove_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed temp file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
    }
}

fn finished_event(index: usize, result: &DownloadResult, completed: usize, total: usize) -> DownloadEvent {
    DownloadEvent::Finished {
        index,
        status: result.status,
        bytes_written: result.bytes_written,
        completed,
        total,
    }
}

fn emit(events: &Option<mpsc::Sender<DownloadEvent>>, event: DownloadEvent) {
    if let Some(tx) = events {
        if let Err(e) = tx.try_send(event) {
            debug!("Dropped download event: {}", e);
        }
    }
}
