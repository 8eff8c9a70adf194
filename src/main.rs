//! Seo-Ripple main entry point
//!
//! This is the command-line interface for the Seo-Ripple crawler.

use anyhow::{bail, Context};
use clap::Parser;
use seo_ripple::config::{compute_config_hash, read_config, validate, CrawlConfig};
use seo_ripple::crawler::CrawlEngine;
use seo_ripple::output::{ConsoleSink, FanOut, MarkdownSink, ReportSink};
use seo_ripple::url::Scope;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Seo-Ripple: a polite on-page SEO crawler
///
/// Seo-Ripple crawls a site breadth-first from a seed URL while respecting
/// robots.txt, and reports meta, content, image, link, performance and
/// security findings for every page it fetches.
#[derive(Parser, Debug)]
#[command(name = "seo-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A polite on-page SEO crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from (overrides `seed` in the config file)
    #[arg(value_name = "SEED")]
    seed: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum hops from the seed (0 = seed only)
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Maximum number of pages to fetch
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Number of pages fetched at once
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Also write a markdown report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn has_overrides(&self) -> bool {
        self.seed.is_some()
            || self.max_depth.is_some()
            || self.max_pages.is_some()
            || self.concurrency.is_some()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = resolve_config(&cli)?;
    validate(&config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_crawl(config, config_hash, &cli).await?;
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
            0 => EnvFilter::new("seo_ripple=info,warn"),
            1 => EnvFilter::new("seo_ripple=debug,info"),
            2 => EnvFilter::new("seo_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the effective configuration from the optional file and CLI flags
///
/// The file hash is only reported when the file is used unmodified.
fn resolve_config(cli: &Cli) -> anyhow::Result<(CrawlConfig, Option<String>)> {
    let (mut config, file_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = read_config(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let hash = compute_config_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (CrawlConfig::new(String::new()), None),
    };

    if let Some(seed) = &cli.seed {
        config.seed = seed.clone();
    }
    if let Some(depth) = cli.max_depth {
        config.max_depth = depth;
    }
    if let Some(pages) = cli.max_pages {
        config.max_pages = pages;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }

    if config.seed.trim().is_empty() {
        bail!("No seed URL given; pass SEED or set `seed` in the config file");
    }

    let hash = if cli.has_overrides() { None } else { file_hash };
    Ok((config, hash))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &CrawlConfig) -> anyhow::Result<()> {
    let scope = Scope::from_config(config)?;

    println!("=== Seo-Ripple Dry Run ===\n");

    println!("Crawl:");
    println!("  Seed: {}", config.seed);
    println!("  Max depth: {}", config.max_depth);
    println!("  Max pages: {}", config.max_pages);
    println!("  Attempt ceiling: {}", config.attempt_ceiling());
    println!("  Concurrency: {}", config.concurrency);
    println!("  Request timeout: {:?}", config.request_timeout());
    if let Some(limit) = config.crawl_timeout() {
        println!("  Crawl timeout: {:?}", limit);
    }
    println!("  Politeness delay: {:?}", config.politeness_delay());
    println!("  Use sitemap: {}", config.use_sitemap);

    println!("\nScope:");
    println!("  Seed origin: {}", scope.seed_origin());
    println!("  Same origin only: {}", config.same_origin_only);
    for pattern in &config.allowed_domains {
        println!("  Also allowed: {}", pattern);
    }

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Backoff base: {}ms", config.retry.backoff_base_ms);
    println!("  Jitter: {}", config.retry.jitter);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: CrawlConfig,
    config_hash: Option<String>,
    cli: &Cli,
) -> anyhow::Result<()> {
    let mut engine = CrawlEngine::new(config)?;
    if let Some(hash) = config_hash {
        engine = engine.with_config_hash(hash);
    }

    let stop = engine.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            stop.stop();
        }
    });

    let mut console = ConsoleSink::new(cli.quiet);
    let mut markdown = cli.report.as_ref().map(MarkdownSink::new);
    let mut sinks: Vec<&mut dyn ReportSink> = Vec::new();
    sinks.push(&mut console);
    if let Some(markdown) = markdown.as_mut() {
        sinks.push(markdown);
    }
    let mut sink = FanOut::new(sinks);

    match engine.run_with_sink(&mut sink).await {
        Ok(summary) => {
            tracing::info!("Crawl completed ({})", summary.stop_reason.as_str());
            if let Some(path) = &cli.report {
                println!("\n✓ Report written to: {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
