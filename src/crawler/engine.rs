//! Crawl engine - orchestrates the frontier, fetcher and policy gate
//!
//! A fixed pool of worker tasks pulls URLs from the shared [`Frontier`],
//! checks them against robots.txt, throttles per site, fetches, analyzes,
//! feeds discovered links back, and emits one [`PageReport`] per dispatched
//! URL. The frontier lock is never held across network I/O or analysis.

use super::fetcher::{build_http_client, FetchResult, FetchedPage, Fetcher, SkipReason};
use super::frontier::{Frontier, NextAction};
use crate::analyzer::{analyze, PageSnapshot};
use crate::config::{config_snapshot_hash, validate, CrawlConfig};
use crate::output::{
    BrokenLink, CrawlSummary, PageOutcome, PageReport, ReportSink, SummaryTally,
};
use crate::robots::PolicyGate;
use crate::state::OriginThrottle;
use crate::url::{Scope, UrlRef};
use crate::RippleError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};

/// Handle used to stop a running crawl
///
/// Stopping prevents new dispatches immediately; pages already in flight
/// finish and are reported.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A crawl in progress
///
/// `reports` yields every page report as it is produced and closes when the
/// last worker exits; `summary` resolves once the crawl is over.
pub struct CrawlRun {
    pub reports: mpsc::UnboundedReceiver<PageReport>,
    pub summary: JoinHandle<Result<CrawlSummary, RippleError>>,
}

impl CrawlRun {
    /// Feeds every report and then the summary to `sink`
    pub async fn drain_into(mut self, sink: &mut dyn ReportSink) -> Result<CrawlSummary, RippleError> {
        while let Some(report) = self.reports.recv().await {
            sink.on_page(&report)?;
        }
        let summary = self.summary.await??;
        sink.on_finish(&summary)?;
        Ok(summary)
    }

    /// Waits for the crawl and returns the reports in emission order
    pub async fn collect(mut self) -> Result<(Vec<PageReport>, CrawlSummary), RippleError> {
        let mut reports = Vec::new();
        while let Some(report) = self.reports.recv().await {
            reports.push(report);
        }
        let summary = self.summary.await??;
        Ok((reports, summary))
    }
}

/// State shared by every worker of one crawl
struct Shared {
    config: Arc<CrawlConfig>,
    scope: Scope,
    fetcher: Fetcher,
    gate: Arc<PolicyGate>,
    throttle: OriginThrottle,
    frontier: Mutex<Frontier>,
    wake: Notify,
}

/// Runs one crawl from a validated configuration
pub struct CrawlEngine {
    config: Arc<CrawlConfig>,
    scope: Scope,
    fetcher: Fetcher,
    gate: Arc<PolicyGate>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    config_hash: Option<String>,
}

impl CrawlEngine {
    /// Creates an engine for `config`
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid, the seed cannot be parsed,
    /// or the HTTP client cannot be built. Nothing is fetched here.
    pub fn new(config: CrawlConfig) -> Result<Self, RippleError> {
        validate(&config)?;
        UrlRef::new(&config.seed, 0)?;
        let scope = Scope::from_config(&config)?;

        let client = build_http_client(&config.user_agent, config.request_timeout())?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let fetcher = Fetcher::new(client.clone(), &config).with_stop(stop_rx.clone());
        let gate = PolicyGate::new(
            client,
            config.user_agent.crawler_name.clone(),
            config.request_timeout(),
        );

        Ok(Self {
            config: Arc::new(config),
            scope,
            fetcher,
            gate: Arc::new(gate),
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            config_hash: None,
        })
    }

    /// Reports `hash` in the summary instead of a hash of the in-memory config
    ///
    /// Used when the config came from a file whose bytes were hashed.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Starts the crawl in the background
    pub fn start(self) -> CrawlRun {
        let (tx, rx) = mpsc::unbounded_channel();
        let summary = tokio::spawn(self.drive(tx));
        CrawlRun {
            reports: rx,
            summary,
        }
    }

    /// Runs the crawl to completion, collecting every report
    pub async fn run(self) -> Result<(Vec<PageReport>, CrawlSummary), RippleError> {
        self.start().collect().await
    }

    /// Runs the crawl to completion, streaming into `sink`
    pub async fn run_with_sink(self, sink: &mut dyn ReportSink) -> Result<CrawlSummary, RippleError> {
        self.start().drain_into(sink).await
    }

    async fn drive(
        self,
        reports: mpsc::UnboundedSender<PageReport>,
    ) -> Result<CrawlSummary, RippleError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let seed = UrlRef::new(&self.config.seed, 0)?;

        tracing::info!(
            "Starting crawl of {} (max depth {}, max pages {}, concurrency {})",
            seed.as_str(),
            self.config.max_depth,
            self.config.max_pages,
            self.config.concurrency
        );

        let shared = Arc::new(Shared {
            config: Arc::clone(&self.config),
            scope: self.scope.clone(),
            fetcher: self.fetcher.clone(),
            gate: Arc::clone(&self.gate),
            throttle: OriginThrottle::new(),
            frontier: Mutex::new(Frontier::from_config(&self.config, self.scope.clone())),
            wake: Notify::new(),
        });

        let stop_watcher = tokio::spawn(watch_stop(Arc::clone(&shared), self.stop_rx.clone()));
        let timer = self.config.crawl_timeout().map(|limit| {
            let stop = self.stop_signal();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!("Crawl timeout of {:?} reached, stopping", limit);
                stop.stop();
            })
        });

        self.seed_frontier(&shared, seed).await;
        if *self.stop_rx.borrow() {
            shared.frontier.lock().await.cancel();
        }

        let mut workers = JoinSet::new();
        for id in 0..self.config.concurrency.max(1) {
            workers.spawn(worker(Arc::clone(&shared), reports.clone(), id));
        }
        drop(reports);

        let mut tally = SummaryTally::default();
        while let Some(joined) = workers.join_next().await {
            tally.merge(joined?);
        }

        stop_watcher.abort();
        if let Some(timer) = timer {
            timer.abort();
        }

        let frontier = shared.frontier.lock().await;
        let broken_links = broken_links(&frontier, &mut tally.http_failures);
        let summary = CrawlSummary {
            seed: self.config.seed.clone(),
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: clock.elapsed().as_millis() as u64,
            config: (*self.config).clone(),
            config_hash: self
                .config_hash
                .clone()
                .unwrap_or_else(|| config_snapshot_hash(&self.config)),
            pages_fetched: frontier.fetched_count(),
            pages_skipped: frontier.skipped_count(),
            pages_failed: frontier.failed_count(),
            skipped_by_reason: tally.skipped_by_reason,
            failed_by_kind: tally.failed_by_kind,
            discarded: frontier.discards().clone(),
            policy_unavailable: self.gate.unavailable_origins(),
            findings_by_severity: tally.findings_by_severity,
            broken_links,
            stop_reason: frontier.stop_reason(),
        };

        tracing::info!(
            "Crawl finished ({}): {} fetched, {} skipped, {} failed in {} ms",
            summary.stop_reason.as_str(),
            summary.pages_fetched,
            summary.pages_skipped,
            summary.pages_failed,
            summary.elapsed_ms
        );

        Ok(summary)
    }

    /// Enqueues the seed and, if enabled, the seed site's sitemap URLs
    async fn seed_frontier(&self, shared: &Shared, seed: UrlRef) {
        let site = seed.site_root();
        let policy = self.gate.load(&site).await;
        shared.frontier.lock().await.offer(seed);

        if !self.config.use_sitemap || self.config.max_depth == 0 {
            return;
        }

        let seeds = self.gate.seeds_from_sitemap(&policy, &site).await;
        let available = seeds.remaining();
        let enqueued = shared.frontier.lock().await.offer_many(seeds);
        tracing::info!(
            "Sitemap supplied {} URLs, {} enqueued at depth 1",
            available,
            enqueued
        );
    }
}

/// Ties each URL that failed with an HTTP error to the pages linking to it
fn broken_links(frontier: &Frontier, failures: &mut Vec<(String, Option<u16>)>) -> Vec<BrokenLink> {
    failures.sort();
    failures
        .drain(..)
        .filter_map(|(url, status)| {
            let linked_from = frontier.referrers_of(&url).to_vec();
            if linked_from.is_empty() {
                return None;
            }
            Some(BrokenLink {
                url,
                status,
                linked_from,
            })
        })
        .collect()
}

/// Cancels the frontier once the stop signal turns true
async fn watch_stop(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            break;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
    tracing::info!("Stop requested, finishing in-flight pages");
    shared.frontier.lock().await.cancel();
    shared.wake.notify_waiters();
}

/// One crawl worker; returns the counts of the reports it emitted
async fn worker(
    shared: Arc<Shared>,
    reports: mpsc::UnboundedSender<PageReport>,
    id: usize,
) -> SummaryTally {
    let mut tally = SummaryTally::default();

    loop {
        // Registered before the frontier is inspected so a completion
        // between the check and the await still wakes us.
        let notified = shared.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let action = shared.frontier.lock().await.next_action();
        match action {
            NextAction::Dispatch { sequence, url } => {
                let report = process(&shared, sequence, url).await;
                tally.record(&report);
                if reports.send(report).is_err() {
                    tracing::trace!("Worker {}: report receiver dropped", id);
                }
            }
            NextAction::Wait => notified.await,
            NextAction::Done => {
                shared.wake.notify_waiters();
                break;
            }
        }
    }

    tracing::debug!("Worker {} exiting", id);
    tally
}

/// Handles one dispatched URL from policy check to completion
async fn process(shared: &Shared, sequence: u64, url: UrlRef) -> PageReport {
    tracing::debug!("[{}] Processing {}", sequence, url);

    let result = fetch_checked(shared, &url).await;
    let mut report = PageReport::new(sequence, url.clone(), PageOutcome::from(&result));

    let mut links = Vec::new();
    if let FetchResult::Success(page) = &result {
        let analysis = analyze(
            &PageSnapshot::from_fetched(page),
            &shared.scope,
            &shared.config.analyzer,
        );
        report.findings = analysis.findings;
        links = analysis.links;
    }
    report.links_found = links.len();

    let child_depth = url.depth() + 1;
    {
        let mut frontier = shared.frontier.lock().await;
        report.links_enqueued = frontier.offer_links(
            &url,
            links
                .into_iter()
                .filter_map(|link| UrlRef::from_url(link, child_depth).ok()),
        );
        if let Err(e) = frontier.complete(url.key(), report.outcome.url_state()) {
            tracing::warn!("Could not complete {}: {}", url, e);
        }
    }
    shared.wake.notify_waiters();

    match &report.outcome {
        PageOutcome::Fetched { status_code, .. } => tracing::debug!(
            "[{}] {} -> {} ({} findings, {} links enqueued)",
            sequence,
            url,
            status_code,
            report.findings.len(),
            report.links_enqueued
        ),
        PageOutcome::Skipped { reason } => {
            tracing::debug!("[{}] {} skipped: {}", sequence, url, reason.label())
        }
        PageOutcome::Failed { kind, message, .. } => tracing::debug!(
            "[{}] {} failed ({}): {}",
            sequence,
            url,
            kind.label(),
            message
        ),
    }

    report
}

/// Robots check, throttle, fetch and redirect dedup for one URL
async fn fetch_checked(shared: &Shared, url: &UrlRef) -> FetchResult {
    let request = url.request_url();
    let policy = shared.gate.policy_for(request).await;
    if !shared.gate.is_allowed(&policy, request) {
        return FetchResult::Skipped {
            reason: SkipReason::RobotsDisallowed,
        };
    }

    let politeness = shared.config.politeness_delay();
    let delay = shared
        .gate
        .crawl_delay(&policy)
        .map_or(politeness, |d| d.max(politeness));
    shared.throttle.wait_turn(&url.site_root(), delay).await;

    let result = shared
        .fetcher
        .fetch_guarded(request, |hop| {
            shared.scope.contains(hop) && shared.gate.allows_cached(hop)
        })
        .await;

    match result {
        FetchResult::Success(page) if page.final_url != *request => {
            claim_redirect_target(shared, url, page).await
        }
        other => other,
    }
}

/// Attributes redirected content to the requested URL unless the final URL
/// is forbidden or already belongs to another node
async fn claim_redirect_target(shared: &Shared, url: &UrlRef, page: FetchedPage) -> FetchResult {
    let target = page.final_url.to_string();

    let policy = shared.gate.policy_for(&page.final_url).await;
    if !shared.gate.is_allowed(&policy, &page.final_url) {
        return FetchResult::Skipped {
            reason: SkipReason::RedirectBlocked { target },
        };
    }

    let Ok(final_ref) = UrlRef::from_url(page.final_url.clone(), url.depth()) else {
        return FetchResult::Skipped {
            reason: SkipReason::RedirectBlocked { target },
        };
    };
    // `/dir` -> `/dir/` lands on the node that was dispatched
    if final_ref == *url {
        return FetchResult::Success(page);
    }

    if shared.frontier.lock().await.claim_redirect(&final_ref) {
        FetchResult::Success(page)
    } else {
        tracing::debug!("{} redirected to known URL {}", url, target);
        FetchResult::Skipped {
            reason: SkipReason::DuplicateRedirect { target },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
    }

    fn test_config(seed: &str) -> CrawlConfig {
        let mut config = CrawlConfig::new(seed);
        config.use_sitemap = false;
        config.retry.backoff_base_ms = 1;
        config.retry.jitter = false;
        config
    }

    async fn server_without_robots() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = CrawlConfig::new("https://example.test/");
        config.max_pages = 0;
        assert!(CrawlEngine::new(config).is_err());

        assert!(CrawlEngine::new(CrawlConfig::new("ftp://example.test/")).is_err());
    }

    #[test]
    fn test_stop_signal_is_shared() {
        let engine = CrawlEngine::new(CrawlConfig::new("https://example.test/")).unwrap();
        let a = engine.stop_signal();
        let b = engine.stop_signal();
        assert!(!b.is_stopped());
        a.stop();
        assert!(b.is_stopped());
    }

    #[tokio::test]
    async fn test_seed_only_crawl() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(r#"<html><head><title>Home</title></head>
<body><a href="/next">Next</a></body></html>"#))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.max_depth = 0;
        let (reports, summary) = CrawlEngine::new(config).unwrap().run().await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].sequence, 0);
        assert_eq!(reports[0].links_found, 1);
        assert_eq!(reports[0].links_enqueued, 0);
        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(summary.discarded.too_deep, 1);
        assert_eq!(summary.stop_reason, crate::crawler::StopReason::FrontierDrained);
    }

    #[tokio::test]
    async fn test_redirect_to_known_url_is_not_reported_twice() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(r#"<a href="/a">A</a><a href="/old">Old</a>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html("<p>a</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/a", server.uri()).as_str()),
            )
            .mount(&server)
            .await;

        let (reports, summary) = CrawlEngine::new(test_config(&server.uri()))
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        let old = reports
            .iter()
            .find(|r| r.url.as_str().ends_with("/old"))
            .unwrap();
        assert!(matches!(
            old.outcome,
            PageOutcome::Skipped {
                reason: SkipReason::DuplicateRedirect { .. }
            }
        ));
        assert!(old.findings.is_empty());
        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.skipped_by_reason.get("duplicate_redirect"), Some(&1));
    }

    #[tokio::test]
    async fn test_stop_before_start_dispatches_nothing() {
        let server = server_without_robots().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html("<p>home</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let engine = CrawlEngine::new(test_config(&server.uri())).unwrap();
        engine.stop_signal().stop();
        let (reports, summary) = engine.run().await.unwrap();

        assert!(reports.is_empty());
        assert_eq!(summary.stop_reason, crate::crawler::StopReason::Cancelled);
    }
}
