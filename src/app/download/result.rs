//! Per-task outcomes, progress events and batch summaries

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::task::DownloadTask;
use crate::errors::{DownloadError, ErrorKind};

/// Final state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Completed,
    Skipped,
    Failed,
}

/// Outcome of one task; exactly one is produced per submitted task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadResult {
    pub task: DownloadTask,
    pub status: DownloadStatus,
    /// Bytes received by the last attempt, or the existing size for a skip
    pub bytes_written: u64,
    #[serde(skip)]
    pub error: Option<DownloadError>,
    /// Network attempts made
    pub attempts: u32,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DownloadResult {
    pub fn completed(task: DownloadTask, bytes_written: u64, attempts: u32, elapsed: Duration) -> Self {
        Self {
            task,
            status: DownloadStatus::Completed,
            bytes_written,
            error: None,
            attempts,
            elapsed,
        }
    }

    /// Destination already complete; no network access was made
    pub fn skipped(task: DownloadTask, existing_size: u64) -> Self {
        Self {
            task,
            status: DownloadStatus::Skipped,
            bytes_written: existing_size,
            error: None,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failed(
        task: DownloadTask,
        error: DownloadError,
        bytes_written: u64,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            task,
            status: DownloadStatus::Failed,
            bytes_written,
            error: Some(error),
            attempts,
            elapsed,
        }
    }

    /// Failure category, for failed tasks
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(DownloadError::kind)
    }

    pub fn is_success(&self) -> bool {
        self.status != DownloadStatus::Failed
    }
}

/// Progress notification emitted while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A worker picked up the task at `index`
    Started { index: usize, destination: PathBuf },
    /// The task at `index` reached its final status
    Finished {
        index: usize,
        status: DownloadStatus,
        bytes_written: u64,
        completed: usize,
        total: usize,
    },
}

/// Aggregate counts for one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadSummary {
    pub requested: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Bytes transferred by completed tasks
    pub bytes_downloaded: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DownloadSummary {
    pub fn from_results(results: &[DownloadResult], elapsed: Duration) -> Self {
        let mut summary = Self {
            requested: results.len(),
            elapsed,
            ..Default::default()
        };

        for result in results {
            match result.status {
                DownloadStatus::Completed => {
                    summary.completed += 1;
                    summary.bytes_downloaded += result.bytes_written;
                }
                DownloadStatus::Skipped => summary.skipped += 1,
                DownloadStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// A batch fails only when something was requested and nothing succeeded
    ///
    /// Skipped tasks count as successes since their file is already present.
    pub fn is_success(&self) -> bool {
        self.requested == 0 || self.completed + self.skipped > 0
    }

    /// Average transfer speed over the batch
    pub fn format_speed(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return "n/a".to_string();
        }
        format!("{}/s", format_size((self.bytes_downloaded as f64 / secs) as u64))
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Downloads: {} completed, {} skipped, {} failed of {} ({} at {})",
            self.completed,
            self.skipped,
            self.failed,
            self.requested,
            format_size(self.bytes_downloaded),
            self.format_speed()
        )
    }
}

/// Format bytes in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;

    fn task(name: &str) -> DownloadTask {
        DownloadTask::new(format!("https://cdn.example.com/{}", name), name)
    }

    #[test]
    fn test_summary_counts() {
        let results = vec![
            DownloadResult::completed(task("a"), 2048, 1, Duration::from_secs(1)),
            DownloadResult::skipped(task("b"), 512),
            DownloadResult::failed(
                task("c"),
                DownloadError::Source(SourceError::ClientError { status: 404 }),
                0,
                1,
                Duration::ZERO,
            ),
        ];
        let summary = DownloadSummary::from_results(&results, Duration::from_secs(2));

        assert_eq!(summary.requested, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.bytes_downloaded, 2048);
        assert_eq!(summary.format_speed(), "1.00 KB/s");
        assert!(summary.is_success());
        assert_eq!(results[2].error_kind(), Some(ErrorKind::ClientError));
    }

    #[test]
    fn test_success_rule() {
        assert!(DownloadSummary::default().is_success());

        let all_failed = vec![DownloadResult::failed(
            task("a"),
            DownloadError::Cancelled,
            0,
            0,
            Duration::ZERO,
        )];
        assert!(!DownloadSummary::from_results(&all_failed, Duration::ZERO).is_success());

        let only_skipped = vec![DownloadResult::skipped(task("a"), 10)];
        assert!(DownloadSummary::from_results(&only_skipped, Duration::ZERO).is_success());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(200 * 1024 * 1024), "200.00 MB");
    }
}
