//! Per-page reports and the crawl summary
//!
//! Both are plain serializable values so a consumer never needs to share
//! memory with the engine.

use crate::analyzer::{PageFinding, Severity};
use crate::config::CrawlConfig;
use crate::crawler::{DiscardCounts, FailureKind, FetchResult, SkipReason, StopReason};
use crate::state::UrlState;
use crate::url::UrlRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Fetch metadata for one URL, without the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    Fetched {
        status_code: u16,
        final_url: String,
        elapsed_ms: u64,
        body_bytes: usize,
        truncated: bool,
        content_type: Option<String>,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        kind: FailureKind,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },
}

impl PageOutcome {
    /// Terminal frontier state matching this outcome
    pub fn url_state(&self) -> UrlState {
        match self {
            Self::Fetched { .. } => UrlState::Fetched,
            Self::Skipped { .. } => UrlState::Skipped,
            Self::Failed { .. } => UrlState::Failed,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

impl From<&FetchResult> for PageOutcome {
    fn from(result: &FetchResult) -> Self {
        match result {
            FetchResult::Success(page) => Self::Fetched {
                status_code: page.status_code,
                final_url: page.final_url.to_string(),
                elapsed_ms: page.elapsed_ms,
                body_bytes: page.body_bytes,
                truncated: page.truncated,
                content_type: page.content_type.clone(),
            },
            FetchResult::Skipped { reason } => Self::Skipped {
                reason: reason.clone(),
            },
            FetchResult::Failed {
                kind,
                attempts,
                status,
                message,
            } => Self::Failed {
                kind: *kind,
                attempts: *attempts,
                status: *status,
                message: message.clone(),
            },
        }
    }
}

/// Everything known about one dispatched URL
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// Dequeue order across the crawl, starting at 0
    pub sequence: u64,
    pub url: UrlRef,
    pub outcome: PageOutcome,
    /// Empty unless the page was fetched
    pub findings: Vec<PageFinding>,
    /// In-scope links found on the page
    pub links_found: usize,
    /// Of those, how many the frontier accepted
    pub links_enqueued: usize,
}

impl PageReport {
    pub fn new(sequence: u64, url: UrlRef, outcome: PageOutcome) -> Self {
        Self {
            sequence,
            url,
            outcome,
            findings: Vec::new(),
            links_found: 0,
            links_enqueued: 0,
        }
    }

    pub fn depth(&self) -> u32 {
        self.url.depth()
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

/// Totals for a finished (or stopped) crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub seed: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub config: CrawlConfig,
    pub config_hash: String,

    pub pages_fetched: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    /// Skip counts keyed by reason label
    pub skipped_by_reason: BTreeMap<String, usize>,
    /// Failure counts keyed by kind label
    pub failed_by_kind: BTreeMap<String, usize>,
    pub discarded: DiscardCounts,
    /// Sites whose robots.txt or sitemap could not be read
    pub policy_unavailable: Vec<String>,
    pub findings_by_severity: BTreeMap<String, usize>,
    /// Linked pages that answered with an HTTP error, sorted by URL
    pub broken_links: Vec<BrokenLink>,
    pub stop_reason: StopReason,
}

/// A crawled URL that failed with an HTTP error status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    pub url: String,
    /// Last status seen
    pub status: Option<u16>,
    /// Pages linking to `url`, in discovery order
    pub linked_from: Vec<String>,
}

impl CrawlSummary {
    pub fn total_pages(&self) -> usize {
        self.pages_fetched + self.pages_skipped + self.pages_failed
    }

    /// Share of dispatched URLs that were fetched, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_pages();
        if total == 0 {
            return 0.0;
        }
        (self.pages_fetched as f64 / total as f64) * 100.0
    }
}

/// Running per-kind counts, fed one report at a time
#[derive(Debug, Clone, Default)]
pub struct SummaryTally {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub skipped_by_reason: BTreeMap<String, usize>,
    pub failed_by_kind: BTreeMap<String, usize>,
    pub findings_by_severity: BTreeMap<String, usize>,
    /// Keys and last status of URLs that failed with an HTTP error
    pub http_failures: Vec<(String, Option<u16>)>,
}

impl SummaryTally {
    /// Folds another worker's counts into this one
    pub fn merge(&mut self, other: SummaryTally) {
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.failed += other.failed;
        for (reason, count) in other.skipped_by_reason {
            *self.skipped_by_reason.entry(reason).or_insert(0) += count;
        }
        for (kind, count) in other.failed_by_kind {
            *self.failed_by_kind.entry(kind).or_insert(0) += count;
        }
        for (severity, count) in other.findings_by_severity {
            *self.findings_by_severity.entry(severity).or_insert(0) += count;
        }
        self.http_failures.extend(other.http_failures);
    }

    pub fn record(&mut self, report: &PageReport) {
        match &report.outcome {
            PageOutcome::Fetched { .. } => self.fetched += 1,
            PageOutcome::Skipped { reason } => {
                self.skipped += 1;
                *self
                    .skipped_by_reason
                    .entry(reason.label().to_string())
                    .or_insert(0) += 1;
            }
            PageOutcome::Failed { kind, status, .. } => {
                self.failed += 1;
                *self
                    .failed_by_kind
                    .entry(kind.label().to_string())
                    .or_insert(0) += 1;
                if *kind == FailureKind::Http {
                    self.http_failures
                        .push((report.url.key().to_string(), *status));
                }
            }
        }
        for finding in &report.findings {
            *self
                .findings_by_severity
                .entry(finding.severity.as_str().to_string())
                .or_insert(0) += 1;
        }
    }
}
