//! Sitemap-Indexer main entry point
//!
//! This is the command-line interface for the sitemap indexing server.

use anyhow::Context;
use clap::Parser;
use sitemap_indexer::config::{load_config_with_hash, load_credential_blobs, Config};
use sitemap_indexer::credentials::CredentialPool;
use sitemap_indexer::job::{Orchestrator, ProgressEvent};
use sitemap_indexer::server::{self, AppState};
use sitemap_indexer::JobRequest;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sitemap-Indexer: submit a site's sitemap to the indexing API
///
/// By default the indexer serves HTTP: clients check a domain, then open a
/// WebSocket that runs the job and streams its progress. The `--check` and `--run`
/// modes do the same from the terminal.
#[derive(Parser, Debug)]
#[command(name = "sitemap-indexer")]
#[command(version = "1.0.0")]
#[command(about = "Submit a site's sitemap URLs to the indexing API", long_about = None)]
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

    /// Validate config and credentials, then exit
    #[arg(long, conflicts_with_all = ["check", "run"])]
    dry_run: bool,

    /// Count a domain's sitemap URLs against credential quotas and exit
    #[arg(long, value_name = "DOMAIN", conflicts_with_all = ["dry_run", "run"])]
    check: Option<String>,

    /// Index a domain from the terminal, printing progress events as JSON lines
    #[arg(long, value_name = "DOMAIN", conflicts_with_all = ["dry_run", "check"])]
    run: Option<String>,

    /// Pin `--run` to one credential slot (1-5) instead of rotating
    #[arg(long, requires = "run")]
    slot: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Credentials may live in a local .env file
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let blobs = load_credential_blobs(&config.credentials);
    let pool = Arc::new(CredentialPool::load(&blobs, &config.indexing)?);
    tracing::info!("Loaded {} credentials: {:?}", pool.len(), pool.slots());

    if cli.dry_run {
        handle_dry_run(&config, &pool);
        return Ok(());
    }

    let orchestrator = Orchestrator::from_config(&config, pool)?;

    if let Some(domain) = cli.check {
        handle_check(&orchestrator, &domain).await
    } else if let Some(domain) = cli.run {
        handle_run(&orchestrator, JobRequest::new(domain, cli.slot)).await
    } else {
        let state = AppState::new(orchestrator, &config.server);
        server::serve(&config.server, state)
            .await
            .context("server failed")
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemap_indexer=info,warn"),
            1 => EnvFilter::new("sitemap_indexer=debug,info"),
            2 => EnvFilter::new("sitemap_indexer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so `--run` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration and credentials
fn handle_dry_run(config: &Config, pool: &CredentialPool) {
    println!("=== Sitemap-Indexer Dry Run ===\n");

    println!("Server:");
    println!("  Bind address: {}", config.server.bind_address);
    println!("  Event buffer: {}", config.server.event_buffer);
    println!(
        "  Force secure WebSocket: {}",
        config.server.force_secure_websocket
    );

    println!("\nSitemap:");
    println!("  Candidate paths: {}", config.sitemap.paths.join(", "));
    println!("  Max depth: {}", config.sitemap.max_depth);
    println!("  Fetch timeout: {}s", config.sitemap.fetch_timeout_secs);

    println!("\nIndexing:");
    println!("  Endpoint: {}", config.indexing.endpoint);
    println!("  Max attempts: {}", config.indexing.max_attempts);
    println!(
        "  Backoff: {}ms doubling up to {}ms",
        config.indexing.base_backoff_ms, config.indexing.max_backoff_ms
    );
    println!("  Daily limit per credential: {}", config.indexing.daily_limit);

    println!("\nCredentials ({}):", pool.len());
    for report in pool.reports() {
        println!("  - {}", report.message());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --check mode: resolves the sitemap and reports which credentials fit
async fn handle_check(orchestrator: &Orchestrator, domain: &str) -> anyhow::Result<()> {
    let report = orchestrator.check(domain).await?;

    println!("Domain: {}", report.domain);
    println!("URLs in sitemap: {}", report.total);
    for line in report.details() {
        println!("  - {}", line);
    }

    if report.candidates.is_empty() {
        println!("\nNo single credential can cover the whole sitemap today");
    } else {
        let names: Vec<String> = report
            .candidates
            .iter()
            .map(|slot| sitemap_indexer::credentials::slot_name(*slot))
            .collect();
        println!("\nCredentials able to cover it: {}", names.join(", "));
    }

    Ok(())
}

/// Handles the --run mode: runs one job and prints its events; Ctrl-C cancels it
async fn handle_run(orchestrator: &Orchestrator, request: JobRequest) -> anyhow::Result<()> {
    let mut handle = orchestrator.start(request);

    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted; cancelling job");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.events.recv().await {
        print_event(&event)?;
    }

    let summary = handle.task.await?;
    tracing::info!("Job ended {}", summary.state);

    if summary.state == sitemap_indexer::JobState::Failed {
        anyhow::bail!("job for {} failed", summary.domain);
    }
    Ok(())
}

fn print_event(event: &ProgressEvent) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
