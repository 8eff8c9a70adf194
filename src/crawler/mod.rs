//! Crawler module for web page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and manual redirects
//! - The frontier: pending work, visited set and budgets
//! - The engine that runs a bounded pool of workers over both

mod engine;
mod fetcher;
mod frontier;

pub use engine::{CrawlEngine, CrawlRun, StopSignal};
pub use fetcher::{
    build_http_client, is_html_content_type, FailureKind, FetchResult, FetchedPage, Fetcher,
    SkipReason, MAX_RETRY_AFTER,
};
pub use frontier::{Admission, DiscardCounts, Frontier, NextAction, StopReason};

use crate::config::CrawlConfig;
use crate::output::{CrawlSummary, PageReport};
use crate::RippleError;

/// Runs a complete crawl operation
///
/// This is the main entry point for a one-shot crawl. It will:
/// 1. Validate the configuration and build the HTTP client
/// 2. Load the seed site's robots.txt and sitemap
/// 3. Fetch and analyze pages breadth-first
/// 4. Return every page report and the summary
///
/// # Arguments
///
/// * `config` - The crawl configuration
///
/// # Returns
///
/// * `Ok((reports, summary))` - Crawl completed (possibly stopped early)
/// * `Err(RippleError)` - The crawl could not start
pub async fn crawl(config: CrawlConfig) -> Result<(Vec<PageReport>, CrawlSummary), RippleError> {
    CrawlEngine::new(config)?.run().await
}
