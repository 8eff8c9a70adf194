use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for one crawl
///
/// Every field has a default so a crawl can be described by its seed alone.
/// The same structure is read from TOML files (kebab-case keys) and embedded
/// in the crawl summary as a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// URL the crawl starts from
    #[serde(default)]
    pub seed: String,

    /// Maximum hops from the seed (0 = seed only)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of successfully fetched pages
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Restrict the crawl to the seed's registrable domain
    #[serde(rename = "same-origin-only", default = "default_true")]
    pub same_origin_only: bool,

    /// Extra domain patterns (e.g. "*.example.com") treated as in scope
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// Number of concurrent workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum redirects followed for a single request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Bodies larger than this are truncated
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Hard ceiling on dispatched URLs, successful or not (defaults to 4 x max-pages)
    #[serde(rename = "max-total-attempts", default)]
    pub max_total_attempts: Option<usize>,

    /// Wall-clock limit for the whole crawl (seconds)
    #[serde(rename = "crawl-timeout-secs", default)]
    pub crawl_timeout_secs: Option<u64>,

    /// Minimum time between two requests to the same origin (milliseconds)
    #[serde(rename = "politeness-delay-ms", default)]
    pub politeness_delay_ms: u64,

    /// Merge sitemap entries into the frontier after the seed
    #[serde(rename = "use-sitemap", default = "default_true")]
    pub use_sitemap: bool,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub analyzer: AnalyzerThresholds,
}

/// Retry behaviour for transient fetch failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per URL, including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Add up to one base interval of random jitter to each backoff
    #[serde(default = "default_true")]
    pub jitter: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the product token matched against robots.txt groups
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

/// Limits used by the on-page checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerThresholds {
    #[serde(rename = "title-min-length", default = "default_title_min")]
    pub title_min_length: usize,

    #[serde(rename = "title-max-length", default = "default_title_max")]
    pub title_max_length: usize,

    #[serde(rename = "description-min-length", default = "default_description_min")]
    pub description_min_length: usize,

    #[serde(rename = "description-max-length", default = "default_description_max")]
    pub description_max_length: usize,

    #[serde(rename = "min-word-count", default = "default_min_word_count")]
    pub min_word_count: usize,

    /// Declared image width/height above this many pixels is flagged
    #[serde(rename = "max-image-dimension", default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    #[serde(rename = "slow-response-ms", default = "default_slow_response_ms")]
    pub slow_response_ms: u64,

    #[serde(rename = "max-page-bytes", default = "default_max_page_bytes")]
    pub max_page_bytes: usize,
}

impl CrawlConfig {
    /// Creates a configuration for the given seed with every other field defaulted
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            same_origin_only: true,
            allowed_domains: Vec::new(),
            concurrency: default_concurrency(),
            request_timeout_ms: default_request_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
            max_total_attempts: None,
            crawl_timeout_secs: None,
            politeness_delay_ms: 0,
            use_sitemap: true,
            retry: RetryPolicy::default(),
            user_agent: UserAgentConfig::default(),
            analyzer: AnalyzerThresholds::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout_secs.map(Duration::from_secs)
    }

    /// Upper bound on dispatched URLs regardless of outcome
    pub fn attempt_ceiling(&self) -> usize {
        self.max_total_attempts
            .unwrap_or_else(|| self.max_pages.saturating_mul(4))
            .max(self.max_pages)
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`, plus jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.min(16);
        let mut millis = self.backoff_base_ms.saturating_mul(factor);
        if self.jitter && self.backoff_base_ms > 0 {
            millis = millis.saturating_add(fastrand::u64(0..=self.backoff_base_ms));
        }
        Duration::from_millis(millis)
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            jitter: true,
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

impl Default for AnalyzerThresholds {
    fn default() -> Self {
        Self {
            title_min_length: default_title_min(),
            title_max_length: default_title_max(),
            description_min_length: default_description_min(),
            description_max_length: default_description_max(),
            min_word_count: default_min_word_count(),
            max_image_dimension: default_max_image_dimension(),
            slow_response_ms: default_slow_response_ms(),
            max_page_bytes: default_max_page_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_crawler_name() -> String {
    "SeoRipple".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_title_min() -> usize {
    30
}

fn default_title_max() -> usize {
    60
}

fn default_description_min() -> usize {
    70
}

fn default_description_max() -> usize {
    160
}

fn default_min_word_count() -> usize {
    300
}

fn default_max_image_dimension() -> u32 {
    4000
}

fn default_slow_response_ms() -> u64 {
    2000
}

fn default_max_page_bytes() -> usize {
    2 * 1024 * 1024
}
