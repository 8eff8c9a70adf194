//! Seo-Ripple: a polite on-page SEO crawler
//!
//! This crate crawls a bounded set of pages reachable from a seed URL,
//! respecting robots.txt, runs a fixed battery of on-page SEO checks against
//! every fetched page, and hands the resulting per-page reports plus a crawl
//! summary to a report sink.

pub mod analyzer;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Seo-Ripple operations
///
/// Only conditions that prevent a crawl from starting surface as errors.
/// Everything that goes wrong for an individual URL is recorded in its
/// [`output::PageReport`] instead.
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::UrlState,
        to: state::UrlState,
    },

    #[error("Crawl task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Seo-Ripple operations
pub type Result<T> = std::result::Result<T, RippleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analyzer::{analyze, Analysis, Category, PageFinding, Severity};
pub use config::CrawlConfig;
pub use crawler::{CrawlEngine, CrawlRun, FetchResult, Fetcher, Frontier, StopSignal};
pub use output::{CrawlSummary, PageOutcome, PageReport, ReportSink};
pub use robots::{PolicyGate, RobotsPolicy};
pub use state::UrlState;
pub use crate::url::{normalize_url, Scope, UrlRef};
