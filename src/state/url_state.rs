/// URL state definitions for tracking crawl progress
///
/// This module defines all possible states a URL can be in during the crawl process.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a URL in the crawl process
///
/// Every URL moves forward only:
/// `Discovered -> Enqueued -> Fetching -> Fetched | Skipped | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlState {
    // ===== Active States =====
    /// URL was proposed by the seed, a sitemap, or a page's links
    Discovered,

    /// URL passed admission and waits in the pending queue
    Enqueued,

    /// URL was dequeued and handed to a worker
    Fetching,

    // ===== Terminal States =====
    /// URL was fetched and analyzed; counts against the page budget
    Fetched,

    /// URL was deliberately not fetched (robots, non-HTML, blocked redirect)
    Skipped,

    /// URL could not be retrieved
    Failed,
}

impl UrlState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fetched | Self::Skipped | Self::Failed)
    }

    /// Returns true if this URL still occupies a slot in the frontier
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Enqueued | Self::Fetching)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        match (self, next) {
            (Self::Discovered, Self::Enqueued) => true,
            (Self::Enqueued, Self::Fetching) => true,
            (Self::Fetching, s) => s.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Enqueued => "enqueued",
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
