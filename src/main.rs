//! Catalog-Ripple main entry point
//!
//! This is the command-line interface for the Catalog-Ripple crawler.

use anyhow::{bail, Context};
use catalog_ripple::config::{load_config_with_hash, Config};
use catalog_ripple::crawler::Coordinator;
use catalog_ripple::output::{
    history_statistics, render_history_statistics, render_pool_statistics, render_run_report,
    render_sweep_plan,
};
use catalog_ripple::proxy::{ProxyBanManager, ProxyPool};
use catalog_ripple::sweep::{run_sweep, write_report};
use catalog_ripple::{CrawlError, HistoryStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Ripple: an incremental catalog crawler for hostile networks
///
/// Catalog-Ripple walks a paginated catalog through a proxy pool and a
/// local bypass service, records which variants of each entry have been
/// captured, and only revisits entries that can still gain something.
#[derive(Parser, Debug)]
#[command(name = "catalog-ripple")]
#[command(version = "1.0.0")]
#[command(about = "An incremental catalog crawler for hostile networks", long_about = None)]
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

    /// Crawl without writing to the history ledger
    #[arg(long, conflicts_with_all = ["bans", "validate_history", "stats", "sweep"])]
    dry_run: bool,

    /// Show currently banned proxies and exit
    #[arg(long, conflicts_with_all = ["dry_run", "validate_history", "stats", "sweep"])]
    bans: bool,

    /// Check the history ledger for duplicate rows and exit
    #[arg(long, conflicts_with_all = ["dry_run", "bans", "stats", "sweep"])]
    validate_history: bool,

    /// Show history and proxy pool statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "bans", "validate_history", "sweep"])]
    stats: bool,

    /// Plan a dedup sweep over a storage library and exit
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "bans", "validate_history", "stats"])]
    sweep: Option<PathBuf>,

    /// Write the sweep deletion list to this CSV file
    #[arg(long, value_name = "FILE", requires = "sweep")]
    sweep_report: Option<PathBuf>,

    /// Run a single phase instead of both
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    phase: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.bans {
        handle_bans(&config);
    } else if cli.validate_history {
        handle_validate_history(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(root) = &cli.sweep {
        handle_sweep(&config, root, cli.sweep_report.as_deref()).await?;
    } else {
        handle_crawl(config, cli.dry_run, cli.phase).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_ripple=info,warn"),
            1 => EnvFilter::new("catalog_ripple=debug,info"),
            2 => EnvFilter::new("catalog_ripple=trace,debug"),
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

/// Handles the --bans mode: prints the ban ledger
fn handle_bans(config: &Config) {
    let bans = ProxyBanManager::new(config.proxy.ban_ledger.clone());
    println!("Ban ledger: {}\n", bans.ledger_path().display());
    println!("{}", bans.summary(true));
}

/// Handles the --validate-history mode
fn handle_validate_history(config: &Config) -> anyhow::Result<()> {
    let history = HistoryStore::open(&config.history)?;
    if !history.validate() {
        bail!("History ledger {} failed validation", history.location());
    }
    println!("✓ History ledger {} is valid", history.location());
    Ok(())
}

/// Handles the --stats mode: history and pool statistics
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let mut history = HistoryStore::open(&config.history)?;
    let entries = history.load(None);
    println!(
        "{}",
        render_history_statistics(&history_statistics(&entries), &history.location())
    );

    if !config.proxy.entries.is_empty() {
        let bans = Arc::new(ProxyBanManager::new(config.proxy.ban_ledger.clone()));
        let pool = ProxyPool::from_config(&config.proxy, bans);
        println!("{}", render_pool_statistics(&pool.statistics()));
        println!("{}", pool.ban_summary(false));
    }
    Ok(())
}

/// Handles the --sweep mode: plans a dedup over a storage library
async fn handle_sweep(config: &Config, root: &Path, report: Option<&Path>) -> anyhow::Result<()> {
    let plan = run_sweep(root, &config.sweep)
        .await
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    println!("{}", render_sweep_plan(&plan));

    if let Some(path) = report {
        write_report(&plan, path)?;
        println!("✓ Deletion list written to: {}", path.display());
    }
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, dry_run: bool, phase: Option<u8>) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} pages {}..={} (proxy: {}, bypass: {})",
        config.crawler.base_url,
        config.crawler.start_page,
        config.crawler.end_page,
        config.crawler.use_proxy && !config.proxy.entries.is_empty(),
        config.crawler.use_bypass && config.bypass.enabled
    );
    if dry_run {
        tracing::info!("Dry run: history will not be written");
    }

    let mut coordinator = Coordinator::from_config(config)?.with_dry_run(dry_run);
    let result = match phase {
        Some(phase) => coordinator.run_phases(&[phase]).await,
        None => coordinator.run().await,
    };

    match result {
        Ok(report) => {
            println!("{}", render_run_report(&report));
            Ok(())
        }
        Err(e @ CrawlError::ProxyBanned { .. }) => {
            if let Some(pool) = coordinator.orchestrator().pool() {
                println!("{}", pool.ban_summary(false));
            }
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
