//! Report sink trait and the in-memory sink
//!
//! A sink receives every `PageReport` as the crawl produces it and the
//! `CrawlSummary` once at the end.

use super::report::{CrawlSummary, PageReport};
use thiserror::Error;

/// Errors that can occur while consuming reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Consumer of the crawl's report stream
///
/// `on_page` is called in emission order, which is not necessarily crawl
/// order when `concurrency > 1`; use [`crawl_order`](super::crawl_order) to
/// reconstruct it. `on_finish` is called exactly once, after the last page.
pub trait ReportSink {
    /// Records one dispatched URL
    fn on_page(&mut self, report: &PageReport) -> OutputResult<()>;

    /// Records the final totals
    fn on_finish(&mut self, summary: &CrawlSummary) -> OutputResult<()>;
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub reports: Vec<PageReport>,
    pub summary: Option<CrawlSummary>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_parts(self) -> (Vec<PageReport>, Option<CrawlSummary>) {
        (self.reports, self.summary)
    }
}

impl ReportSink for CollectingSink {
    fn on_page(&mut self, report: &PageReport) -> OutputResult<()> {
        self.reports.push(report.clone());
        Ok(())
    }

    fn on_finish(&mut self, summary: &CrawlSummary) -> OutputResult<()> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}
