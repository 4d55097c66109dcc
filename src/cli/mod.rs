//! Command-line interface components
//!
//! This module contains CLI-specific code for the Hotlist Fetcher application,
//! including argument parsing, progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    CacheAction, CacheArgs, Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs,
};
pub use commands::{handle_cache, handle_config, handle_fetch};
pub use progress::{fetch_spinner, ProgressDisplay};
