//! Crawl frontier: pending work, visited set and budget accounting
//!
//! The frontier is the only holder of crawl progress. It is owned by the
//! engine behind a single lock; every method here is synchronous and cheap.

use crate::config::CrawlConfig;
use crate::state::UrlState;
use crate::url::{Scope, UrlRef};
use crate::RippleError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// What a worker should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Fetch this URL; `sequence` orders dequeues across the crawl
    Dispatch { sequence: u64, url: UrlRef },
    /// Nothing dispatchable right now, but in-flight work may add more
    Wait,
    /// No further dispatches will happen
    Done,
}

/// Outcome of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Enqueued,
    Duplicate,
    TooDeep,
    OutOfScope,
    OverBudget,
}

/// URLs turned away at admission, by reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscardCounts {
    pub duplicate: usize,
    pub too_deep: usize,
    pub out_of_scope: usize,
    pub over_budget: usize,
}

impl DiscardCounts {
    pub fn total(&self) -> usize {
        self.duplicate + self.too_deep + self.out_of_scope + self.over_budget
    }
}

/// Why the crawl stopped dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FrontierDrained,
    PageLimit,
    AttemptLimit,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontierDrained => "frontier_drained",
            Self::PageLimit => "page_limit",
            Self::AttemptLimit => "attempt_limit",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Crawl state machine
///
/// Pending URLs are kept in one FIFO lane per depth and always served from
/// the shallowest lane. A URL at depth `h` is only dispatched while every
/// in-flight URL has depth `>= h - 1`, so no shallower URL can still appear
/// once a deeper one has been dequeued.
#[derive(Debug)]
pub struct Frontier {
    scope: Scope,
    max_depth: u32,
    max_pages: usize,
    attempt_ceiling: usize,

    visited: HashMap<String, UrlState>,
    pending: BTreeMap<u32, VecDeque<UrlRef>>,
    pending_len: usize,
    fetching: HashMap<String, u32>,
    in_flight_by_depth: BTreeMap<u32, usize>,
    referrers: HashMap<String, Vec<String>>,

    fetched: usize,
    skipped: usize,
    failed: usize,
    dispatched: usize,
    next_sequence: u64,
    discards: DiscardCounts,
    cancelled: bool,
}

impl Frontier {
    pub fn new(scope: Scope, max_depth: u32, max_pages: usize, attempt_ceiling: usize) -> Self {
        Self {
            scope,
            max_depth,
            max_pages,
            attempt_ceiling: attempt_ceiling.max(max_pages),
            visited: HashMap::new(),
            pending: BTreeMap::new(),
            pending_len: 0,
            fetching: HashMap::new(),
            in_flight_by_depth: BTreeMap::new(),
            referrers: HashMap::new(),
            fetched: 0,
            skipped: 0,
            failed: 0,
            dispatched: 0,
            next_sequence: 0,
            discards: DiscardCounts::default(),
            cancelled: false,
        }
    }

    pub fn from_config(config: &CrawlConfig, scope: Scope) -> Self {
        Self::new(
            scope,
            config.max_depth,
            config.max_pages,
            config.attempt_ceiling(),
        )
    }

    /// Proposes a discovered URL
    ///
    /// The URL is enqueued only if it is new, within depth, in scope, and the
    /// page budget still has room counting pending and in-flight work.
    /// Rejected URLs never enter the visited set.
    pub fn offer(&mut self, url: UrlRef) -> Admission {
        let admission = self.admit(&url);
        tracing::trace!("Offer {}: {:?}", url, admission);
        match admission {
            Admission::Enqueued => {
                self.visited.insert(url.key().to_string(), UrlState::Enqueued);
                self.pending_len += 1;
                self.pending.entry(url.depth()).or_default().push_back(url);
            }
            Admission::Duplicate => self.discards.duplicate += 1,
            Admission::TooDeep => self.discards.too_deep += 1,
            Admission::OutOfScope => self.discards.out_of_scope += 1,
            Admission::OverBudget => self.discards.over_budget += 1,
        }
        admission
    }

    /// Offers the links found on `from`, remembering `from` as a referrer of
    /// every link the crawl knows about; returns how many were enqueued
    pub fn offer_links<I>(&mut self, from: &UrlRef, links: I) -> usize
    where
        I: IntoIterator<Item = UrlRef>,
    {
        let mut enqueued = 0;
        for link in links {
            let key = link.key().to_string();
            match self.offer(link) {
                Admission::Enqueued => enqueued += 1,
                Admission::Duplicate => {}
                _ => continue,
            }
            let referrers = self.referrers.entry(key).or_default();
            if !referrers.iter().any(|r| r == from.key()) {
                referrers.push(from.key().to_string());
            }
        }
        enqueued
    }

    /// Pages that linked to `key`, in discovery order
    pub fn referrers_of(&self, key: &str) -> &[String] {
        self.referrers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Offers several URLs in order; returns how many were enqueued
    pub fn offer_many<I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = UrlRef>,
    {
        urls.into_iter()
            .map(|url| self.offer(url))
            .filter(|a| *a == Admission::Enqueued)
            .count()
    }

    fn admit(&self, url: &UrlRef) -> Admission {
        if self.visited.contains_key(url.key()) {
            return Admission::Duplicate;
        }
        if url.depth() > self.max_depth {
            return Admission::TooDeep;
        }
        if !self.scope.contains(url.url()) {
            return Admission::OutOfScope;
        }
        if self.fetched + self.pending_len + self.fetching.len() >= self.max_pages {
            return Admission::OverBudget;
        }
        Admission::Enqueued
    }

    /// Marks the final URL of a redirect as visited
    ///
    /// Returns false when the URL was already known, meaning the content
    /// belongs to another node.
    pub fn claim_redirect(&mut self, url: &UrlRef) -> bool {
        if self.visited.contains_key(url.key()) {
            return false;
        }
        self.visited.insert(url.key().to_string(), UrlState::Fetched);
        true
    }

    /// Dequeues the next URL if one may be dispatched now
    pub fn next_action(&mut self) -> NextAction {
        if self.cancelled
            || self.fetched >= self.max_pages
            || self.dispatched >= self.attempt_ceiling
        {
            return NextAction::Done;
        }

        let Some((&head_depth, _)) = self.pending.iter().find(|(_, lane)| !lane.is_empty()) else {
            return if self.fetching.is_empty() {
                NextAction::Done
            } else {
                NextAction::Wait
            };
        };

        if let Some((&shallowest, _)) = self.in_flight_by_depth.iter().next() {
            if shallowest + 1 < head_depth {
                tracing::trace!(
                    "Holding depth {} until depth {} finishes",
                    head_depth,
                    shallowest
                );
                return NextAction::Wait;
            }
        }

        let Some(url) = self
            .pending
            .get_mut(&head_depth)
            .and_then(|lane| lane.pop_front())
        else {
            return NextAction::Wait;
        };
        if self.pending.get(&head_depth).map_or(false, |l| l.is_empty()) {
            self.pending.remove(&head_depth);
        }
        self.pending_len -= 1;

        self.visited.insert(url.key().to_string(), UrlState::Fetching);
        self.fetching.insert(url.key().to_string(), url.depth());
        *self.in_flight_by_depth.entry(url.depth()).or_insert(0) += 1;
        self.dispatched += 1;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        NextAction::Dispatch { sequence, url }
    }

    /// Records the terminal state of a dispatched URL
    pub fn complete(&mut self, key: &str, state: UrlState) -> Result<(), RippleError> {
        let from = self.state_of(key).unwrap_or(UrlState::Discovered);
        if from != UrlState::Fetching || !from.can_transition_to(state) {
            return Err(RippleError::InvalidTransition { from, to: state });
        }

        if let Some(depth) = self.fetching.remove(key) {
            if let Some(count) = self.in_flight_by_depth.get_mut(&depth) {
                *count -= 1;
                if *count == 0 {
                    self.in_flight_by_depth.remove(&depth);
                }
            }
        }
        self.visited.insert(key.to_string(), state);

        match state {
            UrlState::Fetched => self.fetched += 1,
            UrlState::Skipped => self.skipped += 1,
            UrlState::Failed => self.failed += 1,
            _ => {}
        }
        Ok(())
    }

    /// Stops further dispatches; in-flight URLs may still complete
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// True once nothing is pending or in flight, or no more dispatches will happen
    pub fn is_finished(&self) -> bool {
        self.fetching.is_empty()
            && (self.pending_len == 0
                || self.cancelled
                || self.fetched >= self.max_pages
                || self.dispatched >= self.attempt_ceiling)
    }

    pub fn stop_reason(&self) -> StopReason {
        if self.cancelled {
            StopReason::Cancelled
        } else if self.fetched >= self.max_pages {
            StopReason::PageLimit
        } else if self.dispatched >= self.attempt_ceiling && self.pending_len > 0 {
            StopReason::AttemptLimit
        } else {
            StopReason::FrontierDrained
        }
    }

    pub fn state_of(&self, key: &str) -> Option<UrlState> {
        self.visited.get(key).copied()
    }

    pub fn fetched_count(&self) -> usize {
        self.fetched
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn discards(&self) -> &DiscardCounts {
        &self.discards
    }
}
