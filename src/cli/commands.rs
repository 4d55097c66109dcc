//! Command handlers for Hotlist Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! to the session, cache and configuration layers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::cache::CacheStore;
use crate::app::download::{format_size, DownloadStatus};
use crate::app::models::HotListItem;
use crate::app::session::{RunReport, Session, SessionOptions};
use crate::app::signals::SignalHandler;
use crate::cli::progress::{fetch_spinner, ProgressDisplay};
use crate::cli::{CacheAction, CacheArgs, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs};
use crate::config::AppConfig;
use crate::constants::workers;
use crate::errors::{AppError, Result};

/// Handle the fetch command
///
/// Fetches the hot list, optionally enriches and downloads it, prints the
/// result and fails when a requested download batch produced nothing.
pub async fn handle_fetch(global: &GlobalArgs, mut config: AppConfig, args: FetchArgs) -> Result<()> {
    let start_time = Instant::now();

    args.validate().map_err(AppError::generic)?;
    args.apply_to(&mut config);
    global.apply_to(&mut config);
    config.validate()?;

    let runtime = config.to_runtime_config();
    let cancel = CancellationToken::new();
    let signals = SignalHandler::new(cancel.clone()).setup();

    let session = Session::build(&runtime, cancel.clone())?;
    let mut options = SessionOptions::from_runtime(&runtime);
    options.with_details = args.details;
    info!(
        "Fetching up to {} items (details: {}, download: {})",
        options.max_items, options.with_details, options.download
    );

    let show_progress = !global.quiet && !args.json;
    let spinner = fetch_spinner("Fetching hot list...", show_progress);

    let (events, display) = if options.download {
        let (tx, rx) = mpsc::channel(workers::EVENT_BUFFER_SIZE);
        let display = ProgressDisplay::new(options.max_items, show_progress).spawn(rx);
        (Some(tx), Some(display))
    } else {
        (None, None)
    };

    let outcome = session.run(&options, events).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    if let Some(display) = display {
        // Sender is dropped with the run, so the display ends on its own
        let _ = display.await;
    }
    cancel.cancel();
    let _ = signals.await;

    let report = outcome?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, global.quiet);
    }

    debug!("Fetch command finished in {:?}", start_time.elapsed());

    if !report.is_success() {
        return Err(AppError::generic(
            "Download batch failed: no task completed or was skipped",
        ));
    }
    Ok(())
}

fn print_report(report: &RunReport, quiet: bool) {
    if report.items.is_empty() {
        println!("Hot list is empty.");
    }
    for item in &report.items {
        print_item(item);
    }

    if quiet {
        return;
    }

    let stats = &report.fetch_stats;
    println!();
    println!(
        "Requests: {} network, {} cached, {} collapsed ({:.0}% success)",
        stats.network_requests,
        stats.cache_hits,
        stats.joined,
        stats.success_rate()
    );

    if let Some(summary) = &report.downloads {
        println!();
        println!("📊 Download Summary:");
        println!("  Requested: {}", summary.requested);
        println!("  Completed: {}", summary.completed);
        println!("  Skipped:   {}", summary.skipped);
        println!("  Failed:    {}", summary.failed);
        println!(
            "  Transferred: {} ({})",
            format_size(summary.bytes_downloaded),
            summary.format_speed()
        );

        let failures: Vec<_> = report
            .download_results
            .iter()
            .filter(|r| r.status == DownloadStatus::Failed)
            .collect();
        if !failures.is_empty() {
            println!("\nFailed downloads:");
            for result in failures {
                let reason = result
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown error".to_string());
                println!("  • {}: {}", result.task.destination_path.display(), reason);
            }
        }
    }
}

fn print_item(item: &HotListItem) {
    println!(
        "{:>3}. {}  (popularity {}, views {})",
        item.position, item.title, item.popularity, item.views
    );
    println!("     {}", item.item_url);
    if let Some(detail) = &item.detail {
        if !detail.description.is_empty() {
            println!("     {}", detail.description);
        }
        println!("     share: {}", detail.share_url);
        if let Some(media_url) = &detail.media_url {
            println!("     media: {}", media_url);
        }
    }
}

/// Handle cache maintenance commands
pub async fn handle_cache(global: &GlobalArgs, mut config: AppConfig, args: CacheArgs) -> Result<()> {
    global.apply_to(&mut config);
    let runtime = config.to_runtime_config();
    let cache = Arc::new(CacheStore::new(runtime.cache));

    match args.action {
        CacheAction::Sweep => {
            let removed = cache.sweep_expired().await?;
            println!("🧹 Removed {} expired entries", removed);
        }
        CacheAction::Clear => {
            cache.clear().await?;
            println!("🗑️  Cache cleared ({})", cache.snapshot_path().display());
        }
        CacheAction::Stats => {
            let stats = cache.stats().await;
            println!("📦 Cache: {}", cache.snapshot_path().display());
            println!("  Entries on disk: {}", stats.disk_entries);
            println!("  Expired on disk: {}", stats.expired_disk_entries);
            if stats.snapshot_corrupt {
                println!("  ⚠️  Snapshot is unreadable and will be rebuilt on the next write");
            }
        }
    }

    Ok(())
}

/// Handle configuration commands
pub async fn handle_config(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Init { force, path } => {
            let written = AppConfig::write_default_config(path, force).await?;
            println!("✅ Wrote default configuration to {}", written.display());
        }
        ConfigAction::Show => {
            let mut config = AppConfig::load(global.config.clone()).await?;
            global.apply_to(&mut config);
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| AppError::generic(format!("Failed to render config: {}", e)))?;
            println!("{}", rendered);
        }
    }

    Ok(())
}
