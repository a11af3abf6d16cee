//! Herbarium-Harvest main entry point
//!
//! This is the command-line interface for the Herbarium-Harvest species harvester.

use anyhow::Context;
use clap::Parser;
use herbarium_harvest::aggregator::CompletionPolicy;
use herbarium_harvest::config::{load_config_with_hash, Config};
use herbarium_harvest::crawler::{build_frontier, Coordinator, HerbariumClient, RunOptions};
use herbarium_harvest::ledger::StatusLedger;
use herbarium_harvest::output::{print_statistics, LedgerStatistics, RecordWriter};
use herbarium_harvest::state::EntityId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Herbarium-Harvest: a resumable species profile harvester
///
/// Herbarium-Harvest assembles species profiles from the many section pages
/// of a herbarium site, writes one JSON file per species, and keeps a status
/// ledger so interrupted or partly failed harvests can be resumed or retried.
#[derive(Parser, Debug)]
#[command(name = "herbarium-harvest")]
#[command(version)]
#[command(about = "A resumable species profile harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Harvest a single species by id
    #[arg(long, value_name = "ID")]
    species_id: Option<u32>,

    /// Skip species already recorded as completed
    #[arg(long)]
    resume: bool,

    /// Only harvest species recorded as retryable failures
    #[arg(long)]
    retry_failed: bool,

    /// Harvest at most this many species
    #[arg(long, value_name = "N")]
    max_species: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the status ledger and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            species_id: self.species_id.map(EntityId::from),
            resume: self.resume,
            retry_failed: self.retry_failed,
            max_species: self.max_species,
        }
    }
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

    let options = cli.run_options();

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &options);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("herbarium_harvest=info,warn"),
            1 => EnvFilter::new("herbarium_harvest=debug,info"),
            2 => EnvFilter::new("herbarium_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, options: &RunOptions) {
    println!("=== Herbarium-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFetching:");
    println!("  Download delay: {}ms", config.fetch.download_delay);
    println!("  Request timeout: {}s", config.fetch.request_timeout);
    println!(
        "  Retries: {} (backoff from {}ms)",
        config.fetch.max_retries, config.fetch.retry_backoff
    );

    println!("\nAggregation:");
    println!("  Timeout window: {}ms", config.aggregation.timeout_window);
    println!(
        "  Partial completion needs max({}, {:.0}% of expected) responses",
        config.aggregation.min_responses,
        config.aggregation.min_fraction * 100.0
    );

    println!("\nOutput:");
    println!("  Records: {}", config.output.output_dir);
    println!("  Status ledger: {}", config.output.status_path().display());

    println!("\nRun:");
    match &options.species_id {
        Some(id) => println!("  Single species: {}", id),
        None => println!("  Species listing from the site"),
    }
    if options.resume {
        println!("  Skipping completed species");
    }
    if options.retry_failed {
        println!("  Only retryable failures");
    }
    if let Some(max) = options.max_species {
        println!("  At most {} species", max);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the status ledger
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.output.status_path();
    println!("Status ledger: {}\n", path.display());

    let ledger = StatusLedger::load(&path);
    let data = ledger.snapshot().context("Failed to read status ledger")?;
    print_statistics(&LedgerStatistics::from_ledger(&data));

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, options: RunOptions) -> anyhow::Result<()> {
    let ledger = Arc::new(StatusLedger::load(config.output.status_path()));
    let client = Arc::new(HerbariumClient::new(&config).context("Failed to build HTTP client")?);

    let frontier = build_frontier(client.as_ref(), &ledger, &options)
        .await
        .context("Failed to build species frontier")?;

    if frontier.is_empty() {
        tracing::info!("Nothing to harvest");
        return Ok(());
    }

    let writer = RecordWriter::new(&config.output.output_dir, ledger.clone());
    let policy = CompletionPolicy::from_config(&config.aggregation);
    let coordinator = Coordinator::new(client, policy, writer, frontier);

    let summary = coordinator
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!("\n✓ Harvest finished: {}", summary);
    println!("  Status ledger: {}", ledger.path().display());

    Ok(())
}
