//! Media downloads
//!
//! Build tasks with [`tasks_for_items`] (or by hand) and hand them to a
//! [`DownloadManager`]:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use hotlist_fetcher::app::download::{DownloadConfig, DownloadManager, DownloadTask, HttpTransport};
//! use hotlist_fetcher::app::source::SourceConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig::default();
//! let transport = HttpTransport::from_source_config(&SourceConfig::default(), config.request_timeout)?;
//! let manager = DownloadManager::new(Arc::new(transport), config);
//!
//! let task = DownloadTask::new("https://example.com/clip.mp4", Path::new("downloads/clip.mp4"));
//! for result in manager.run(vec![task], 3).await {
//!     println!("{:?}: {}", result.status, result.task.destination_path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod result;
pub mod task;
pub mod transport;

pub use config::DownloadConfig;
pub use manager::{classify_download_error, DownloadManager};
pub use result::{format_size, DownloadEvent, DownloadResult, DownloadStatus, DownloadSummary};
pub use task::{fallback_file_stem, sanitize_file_stem, tasks_for_items, DownloadTask};
pub use transport::{ByteStream, HttpTransport, MediaResponse, MediaTransport};
