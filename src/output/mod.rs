//! Output module for crawl reports and summaries
//!
//! This module handles:
//! - The per-page report and crawl summary types
//! - The `ReportSink` trait through which the engine hands them out
//! - Console and markdown renderings of a finished crawl

pub mod markdown;
mod report;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_report, generate_markdown_report, MarkdownSink};
pub use report::{BrokenLink, CrawlSummary, PageOutcome, PageReport, SummaryTally};
pub use stats::{crawl_order, format_broken_link, format_page_line, print_summary, ConsoleSink};
pub use traits::{CollectingSink, OutputError, OutputResult, ReportSink};

/// Forwards every event to each sink in turn
pub struct FanOut<'a> {
    sinks: Vec<&'a mut dyn ReportSink>,
}

impl<'a> FanOut<'a> {
    pub fn new(sinks: Vec<&'a mut dyn ReportSink>) -> Self {
        Self { sinks }
    }
}

impl ReportSink for FanOut<'_> {
    fn on_page(&mut self, report: &PageReport) -> OutputResult<()> {
        for sink in self.sinks.iter_mut() {
            sink.on_page(report)?;
        }
        Ok(())
    }

    fn on_finish(&mut self, summary: &CrawlSummary) -> OutputResult<()> {
        for sink in self.sinks.iter_mut() {
            sink.on_finish(summary)?;
        }
        Ok(())
    }
}
