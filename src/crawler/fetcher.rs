//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Retry logic with exponential backoff for transient failures
//! - Manual redirect handling with a hop cap and loop detection
//! - Content-Type gating and body size limits
//! - Error classification

use crate::config::{CrawlConfig, RetryPolicy, UserAgentConfig};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use url::Url;

/// Longest server-requested `Retry-After` that is honoured
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Result of a fetch operation
///
/// Closed set of outcomes; consumers match on every variant.
#[derive(Debug)]
pub enum FetchResult {
    /// An HTML page was retrieved
    Success(FetchedPage),

    /// The URL was deliberately not retrieved
    Skipped { reason: SkipReason },

    /// The URL could not be retrieved
    Failed {
        kind: FailureKind,
        /// Requests issued for this URL, redirects not counted
        attempts: u32,
        /// Last HTTP status seen, if any
        status: Option<u16>,
        message: String,
    },
}

/// A successfully retrieved HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// URL the content was served from after redirects
    pub final_url: Url,
    pub elapsed_ms: u64,
    /// Bytes of body retained
    pub body_bytes: usize,
    /// True when the body was cut off at the configured ceiling
    pub truncated: bool,
    pub content_type: Option<String>,
}

/// Why a URL was not retrieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Declared Content-Type is not HTML
    NonHtml { content_type: String },
    /// robots.txt forbids the URL
    RobotsDisallowed,
    /// A redirect pointed outside the crawl's scope or policy
    RedirectBlocked { target: String },
    /// A redirect landed on a URL the crawl already knows
    DuplicateRedirect { target: String },
}

impl SkipReason {
    /// Stable label used for per-kind counts
    pub fn label(&self) -> &'static str {
        match self {
            Self::NonHtml { .. } => "non_html",
            Self::RobotsDisallowed => "robots_disallowed",
            Self::RedirectBlocked { .. } => "redirect_blocked",
            Self::DuplicateRedirect { .. } => "duplicate_redirect",
        }
    }
}

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// DNS, TLS, connection or timeout errors
    Network,
    /// Non-success HTTP status
    Http,
    /// Too many redirects or a redirect cycle
    RedirectLoop,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Http => "http",
            Self::RedirectLoop => "redirect_loop",
        }
    }
}

/// What a single attempt produced
enum Attempt {
    Done(FetchResult),
    Retryable {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; [`Fetcher`] follows them itself so
/// every hop can be checked.
///
/// # Example
///
/// ```no_run
/// use seo_ripple::config::UserAgentConfig;
/// use seo_ripple::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs bounded HTTP retrievals
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
    max_redirects: usize,
    max_body_bytes: usize,
    stop: Option<watch::Receiver<bool>>,
}

impl Fetcher {
    pub fn new(client: Client, config: &CrawlConfig) -> Self {
        Self {
            client,
            timeout: config.request_timeout(),
            retry: config.retry.clone(),
            max_redirects: config.max_redirects,
            max_body_bytes: config.max_body_bytes,
            stop: None,
        }
    }

    /// Makes backoff sleeps end early once `stop` turns true
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Fetches `url`, following every redirect within the hop cap
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        self.fetch_guarded(url, |_| true).await
    }

    /// Fetches `url`; each redirect target must pass `guard`
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 5xx, 429 | Retry with backoff, honouring `Retry-After` |
    /// | Timeout, connection, DNS, TLS | Retry with backoff |
    /// | Other 4xx | Fail immediately |
    /// | Hop cap exceeded or cycle | Fail as `RedirectLoop` |
    /// | Guard refuses a hop | Skip as `RedirectBlocked` |
    pub async fn fetch_guarded<G>(&self, url: &Url, guard: G) -> FetchResult
    where
        G: Fn(&Url) -> bool,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let (status, message, retry_after) = match self.attempt(url, &guard, attempts).await {
                Attempt::Done(result) => return result,
                Attempt::Retryable {
                    status,
                    message,
                    retry_after,
                } => (status, message, retry_after),
            };

            let kind = if status.is_some() {
                FailureKind::Http
            } else {
                FailureKind::Network
            };
            let failed = |message: String| FetchResult::Failed {
                kind,
                attempts,
                status,
                message,
            };

            if attempts >= max_attempts {
                tracing::debug!("Giving up on {} after {} attempts: {}", url, attempts, message);
                return failed(message);
            }

            let mut delay = self.retry.backoff(attempts - 1);
            if let Some(requested) = retry_after {
                delay = delay.max(requested.min(MAX_RETRY_AFTER));
            }
            tracing::debug!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                attempts,
                url,
                message,
                delay
            );

            if !self.pause(delay).await {
                return failed(format!("{} (crawl stopped before retry)", message));
            }
        }
    }

    async fn attempt<G>(&self, url: &Url, guard: &G, attempts: u32) -> Attempt
    where
        G: Fn(&Url) -> bool,
    {
        let started = Instant::now();
        let mut current = url.clone();
        let mut chain: HashSet<String> = HashSet::new();
        chain.insert(current.as_str().to_string());
        let mut hops = 0usize;

        loop {
            let response = match self
                .client
                .get(current.clone())
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    return Attempt::Retryable {
                        status: None,
                        message: describe_error(&e),
                        retry_after: None,
                    }
                }
            };
            let status = response.status();

            if status.is_redirection() {
                let Some(next) = redirect_target(&current, &response) else {
                    return Attempt::Done(FetchResult::Failed {
                        kind: FailureKind::Http,
                        attempts,
                        status: Some(status.as_u16()),
                        message: format!("HTTP {} without usable Location", status.as_u16()),
                    });
                };

                hops += 1;
                if hops > self.max_redirects {
                    return Attempt::Done(FetchResult::Failed {
                        kind: FailureKind::RedirectLoop,
                        attempts,
                        status: Some(status.as_u16()),
                        message: format!("more than {} redirects", self.max_redirects),
                    });
                }

                if next.scheme() != "http" && next.scheme() != "https" {
                    return Attempt::Done(FetchResult::Skipped {
                        reason: SkipReason::RedirectBlocked {
                            target: next.to_string(),
                        },
                    });
                }
                if !chain.insert(next.as_str().to_string()) {
                    return Attempt::Done(FetchResult::Failed {
                        kind: FailureKind::RedirectLoop,
                        attempts,
                        status: Some(status.as_u16()),
                        message: format!("redirect cycle back to {}", next),
                    });
                }
                if !guard(&next) {
                    tracing::debug!("Redirect from {} to {} refused", current, next);
                    return Attempt::Done(FetchResult::Skipped {
                        reason: SkipReason::RedirectBlocked {
                            target: next.to_string(),
                        },
                    });
                }

                tracing::trace!("Following redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Attempt::Retryable {
                    status: Some(status.as_u16()),
                    message: format!("HTTP {}", status.as_u16()),
                    retry_after: retry_after(response.headers()),
                };
            }

            if !status.is_success() {
                return Attempt::Done(FetchResult::Failed {
                    kind: FailureKind::Http,
                    attempts,
                    status: Some(status.as_u16()),
                    message: format!("HTTP {}", status.as_u16()),
                });
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());

            if let Some(ct) = &content_type {
                if !is_html_content_type(ct) {
                    return Attempt::Done(FetchResult::Skipped {
                        reason: SkipReason::NonHtml {
                            content_type: ct.clone(),
                        },
                    });
                }
            }

            let headers = response.headers().clone();
            let (bytes, truncated) = match self.read_body(response).await {
                Ok(read) => read,
                Err(e) => {
                    return Attempt::Retryable {
                        status: None,
                        message: format!("body read failed: {}", describe_error(&e)),
                        retry_after: None,
                    }
                }
            };

            return Attempt::Done(FetchResult::Success(FetchedPage {
                status_code: status.as_u16(),
                headers,
                body_bytes: bytes.len(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
                final_url: current,
                elapsed_ms: started.elapsed().as_millis() as u64,
                truncated,
                content_type,
            }));
        }
    }

    /// Streams the body, stopping at the byte ceiling
    async fn read_body(&self, mut response: Response) -> Result<(Vec<u8>, bool), reqwest::Error> {
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes.saturating_sub(buf.len());
            if chunk.len() > room {
                buf.extend_from_slice(&chunk[..room]);
                return Ok((buf, true));
            }
            buf.extend_from_slice(&chunk);
        }
        Ok((buf, false))
    }

    /// Sleeps for `delay`; returns false if the stop signal fired first
    async fn pause(&self, delay: Duration) -> bool {
        let Some(stop) = &self.stop else {
            tokio::time::sleep(delay).await;
            return true;
        };
        let mut stop = stop.clone();
        let stopped = async move {
            loop {
                if *stop.borrow_and_update() {
                    return;
                }
                if stop.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = stopped => false,
        }
    }
}

/// True for `text/html` and `application/xhtml+xml`, ignoring parameters
pub fn is_html_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "text/html" || essence == "application/xhtml+xml"
}

fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let mut next = current.join(location.trim()).ok()?;
    next.set_fragment(None);
    Some(next)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
