//! Black Library main entry point
//!
//! This is the command-line driver for the Black Library harvester.

use anyhow::Context;
use black_library::config::{load_config_with_hash, Config};
use black_library::Library;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Black Library: an incremental harvester for serialized works
///
/// Black Library follows fan-fiction archives, forum threads and web
/// serials, saving every new or changed section to local storage.
#[derive(Parser, Debug)]
#[command(name = "black-library")]
#[command(version)]
#[command(about = "An incremental harvester for serialized works", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Harvest these work URLs once and exit (repeatable)
    #[arg(long = "url", value_name = "URL", conflicts_with_all = ["status", "dry_run"])]
    urls: Vec<String>,

    /// Show the works stored in the catalog and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,

    /// Validate config and show the effective settings without harvesting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.status {
        handle_status(config)?;
    } else if !cli.urls.is_empty() {
        handle_urls(config, &cli.urls).await?;
    } else {
        handle_run(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("black_library=info,warn"),
            1 => EnvFilter::new("black_library=debug,info"),
            2 => EnvFilter::new("black_library=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config) {
    println!("=== Black Library Dry Run ===\n");

    println!("Storage:");
    println!("  Sections: {}", config.storage.storage_path);
    println!("  Catalog: {}", config.storage.database_path);

    println!("\nManager:");
    println!("  Parsers per source: {}", config.manager.worker_count);
    for kind in config.manager.kinds() {
        println!("  - {} ({})", kind.source_name(), kind.source_url());
    }

    let settings = config.parser.settings();
    println!("\nParser:");
    println!("  Tick: {:?}", settings.tick);
    println!("  Politeness wait: {:?}", settings.politeness_wait);
    println!("  Fetch timeout: {:?}", settings.fetch_timeout);
    println!("  Max attempts: {}", settings.max_attempts);
    println!("  Pacing: {:?}", settings.pacing);

    println!("\nLibrary:");
    match &config.library.url_list {
        Some(path) => println!("  URL list: {}", path),
        None => println!("  URL list: none"),
    }
    println!("  Refresh interval: {}s", config.library.refresh_interval_secs);

    println!("\n✓ Configuration is valid");
}

/// Handles the --status mode: lists stored works
fn handle_status(config: Config) -> anyhow::Result<()> {
    let library = Library::new(config)?;
    let works = library.works()?;

    println!("{} works\n", works.len());
    for work in works {
        println!(
            "{}  {:<8}  {:>5}  {}  ({})",
            work.uuid,
            work.stage.to_db_string(),
            work.series_length,
            if work.title.is_empty() { &work.url } else { &work.title },
            work.source
        );
    }

    Ok(())
}

/// Handles one-shot URLs: harvest them and exit once every job is done
async fn handle_urls(config: Config, urls: &[String]) -> anyhow::Result<()> {
    let tick = Duration::from_secs(1);
    let mut library = Library::new(config)?;

    let entries = library.reconcile(urls)?;
    let queued = library.schedule(&entries);
    tracing::info!("Harvesting {} works", queued);

    let mut interval = tokio::time::interval(tick);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                library.tick();
                if library.is_idle() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }
    }

    library.stop().await;
    Ok(())
}

/// Handles the main run loop: periodic library cycles, ticking the manager
async fn handle_run(config: Config) -> anyhow::Result<()> {
    let refresh_interval = Duration::from_secs(config.library.refresh_interval_secs.max(1));
    let mut library = Library::new(config)?;

    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    let mut cycles = tokio::time::interval(refresh_interval);

    tracing::info!("Black Library running");
    loop {
        tokio::select! {
            _ = cycles.tick() => {
                if let Err(e) = library.run_once() {
                    tracing::error!("Library cycle failed: {}", e);
                }
            }
            _ = ticks.tick() => library.tick(),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    library.stop().await;
    tracing::info!("Black Library stopped");
    Ok(())
}
