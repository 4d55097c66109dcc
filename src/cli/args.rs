//! Command-line argument parsing for Hotlist Fetcher
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! the hot list (optionally with details and media downloads), cache
//! maintenance, and configuration file management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::constants::{crawler, workers};

/// Hotlist Fetcher - fetch trending lists and their media
#[derive(Parser, Debug)]
#[command(
    name = "hotlist_fetcher",
    version,
    about = "Fetch a ranked hot list with caching, rate limiting and media downloads",
    long_about = "Fetches the current hot list, optionally enriches entries with item details,
and downloads their media with a bounded worker pool. Responses are cached on disk so
repeated runs within the cache lifetime do not hit the network."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache snapshot file path
    #[arg(long, global = true, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the hot list
    Fetch(FetchArgs),

    /// Cache maintenance
    Cache(CacheArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Number of items to return
    #[arg(short = 'n', long)]
    pub max_items: Option<usize>,

    /// Keep the pinned first entry
    #[arg(long)]
    pub no_skip_top: bool,

    /// Fetch item details (share URL, description, media URL)
    #[arg(long)]
    pub details: bool,

    /// Download media for every item that has it
    #[arg(short, long)]
    pub download: bool,

    /// Media download directory
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of concurrent download workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Bypass the cache for this run
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Remove expired entries
    Sweep,
    /// Remove every entry
    Clear,
    /// Show cache statistics
    Stats,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Destination (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },
    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested on the command line, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl GlobalArgs {
    /// Apply global overrides to a loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(path) = &self.cache_file {
            config.cache.snapshot_path = Some(path.clone());
        }
    }
}

impl FetchArgs {
    /// Reject argument values that can never be valid
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max_items) = self.max_items {
            if max_items == 0 || max_items > crawler::MAX_ITEMS_LIMIT {
                return Err(format!(
                    "--max-items must be between 1 and {}",
                    crawler::MAX_ITEMS_LIMIT
                ));
            }
        }
        if let Some(workers) = self.workers {
            if workers == 0 || workers > workers::MAX_CONCURRENCY {
                return Err(format!(
                    "Number of workers must be between 1 and {}",
                    workers::MAX_CONCURRENCY
                ));
            }
        }
        if self.output_dir.is_some() && !self.download {
            return Err("--output-dir requires --download".to_string());
        }
        Ok(())
    }

    /// Apply command overrides to a loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(max_items) = self.max_items {
            config.crawler.max_items = max_items;
        }
        if self.no_skip_top {
            config.crawler.skip_top_item = false;
        }
        if self.download {
            config.download.enabled = true;
        }
        if let Some(dir) = &self.output_dir {
            config.download.directory = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.download.concurrency = workers;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}
