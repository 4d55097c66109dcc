//! Terminal progress display
//!
//! Renders [`DownloadEvent`]s as an indicatif progress bar on stderr. The
//! bar is only drawn when stderr is a terminal; otherwise events are drained
//! silently and the final summary is all the user sees.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::download::{format_size, DownloadEvent, DownloadStatus};

/// Progress bar fed by download events
pub struct ProgressDisplay {
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// Create a display for `total` tasks; hidden when disabled or not a terminal
    pub fn new(total: usize, enabled: bool) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let bar = (enabled && is_terminal && total > 0).then(|| {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });

        Self { bar }
    }

    /// Consume events until the sender side is dropped
    pub fn spawn(self, mut events: mpsc::Receiver<DownloadEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(&event);
            }
            if let Some(bar) = &self.bar {
                bar.finish_and_clear();
            }
        })
    }

    fn handle(&self, event: &DownloadEvent) {
        let Some(bar) = &self.bar else {
            return;
        };

        match event {
            DownloadEvent::Started { destination, .. } => {
                let name = destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                bar.set_message(name);
            }
            DownloadEvent::Finished {
                status,
                bytes_written,
                completed,
                total,
                ..
            } => {
                bar.set_length(*total as u64);
                bar.set_position(*completed as u64);
                if *status == DownloadStatus::Failed {
                    debug!("Task failed after {}", format_size(*bytes_written));
                }
            }
        }
    }
}

/// Spinner shown while the hot list is fetched
pub fn fetch_spinner(message: &str, enabled: bool) -> Option<ProgressBar> {
    if !enabled || !atty::is(atty::Stream::Stderr) {
        return None;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    Some(spinner)
}
