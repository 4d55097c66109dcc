//! Hotlist Fetcher CLI application
//!
//! Command-line interface for fetching a ranked hot list, its item details,
//! and the media behind each entry.

use std::process;

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use hotlist_fetcher::cli::{handle_cache, handle_config, handle_fetch, Cli, Commands};
use hotlist_fetcher::config::AppConfig;
use hotlist_fetcher::constants::logging::DEFAULT_LOG_LEVEL;
use hotlist_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // `config init` must work even when the existing file is broken
    let config = match &cli.command {
        Commands::Config(_) => None,
        _ => Some(AppConfig::load(cli.global.config.clone()).await?),
    };

    init_logging(&cli, config.as_ref().map(|c| c.logging.level.as_str()));

    info!("Hotlist Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            info!("Executing fetch command");
            handle_fetch(&cli.global, config.unwrap_or_default(), args).await
        }
        Commands::Cache(args) => {
            info!("Executing cache command");
            handle_cache(&cli.global, config.unwrap_or_default(), args).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(&cli.global, args).await
        }
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
fn init_logging(cli: &Cli, configured: Option<&str>) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    let mut filter = EnvFilter::from_default_env();
    let mut rejected = None;
    match format!("hotlist_fetcher={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => rejected = Some(e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if let Some(e) = rejected {
        warn!("Ignoring invalid log level '{}': {}", level, e);
    }

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
