//! Console output for a crawl
//!
//! This module prints per-page lines as reports arrive and the plain-text
//! summary at the end.

use super::report::{BrokenLink, CrawlSummary, PageOutcome, PageReport};
use super::traits::{OutputResult, ReportSink};
use crate::analyzer::Severity;

/// Sorts reports into crawl order: by depth, then by dequeue sequence
pub fn crawl_order(reports: &mut [PageReport]) {
    reports.sort_by_key(|r| (r.depth(), r.sequence));
}

/// One line describing a report, e.g. `[200] https://x/ (depth 1) 2E 5W 1I`
pub fn format_page_line(report: &PageReport) -> String {
    let status = match &report.outcome {
        PageOutcome::Fetched { status_code, .. } => status_code.to_string(),
        PageOutcome::Skipped { reason } => format!("skip:{}", reason.label()),
        PageOutcome::Failed { kind, .. } => format!("fail:{}", kind.label()),
    };

    let mut line = format!("[{}] {}", status, report.url);
    if report.outcome.is_fetched() {
        line.push_str(&format!(
            " {}E {}W {}I",
            report.count_severity(Severity::Error),
            report.count_severity(Severity::Warn),
            report.count_severity(Severity::Info)
        ));
    }
    line
}

/// e.g. `[404] https://x/gone (linked from 2 pages)`
pub fn format_broken_link(broken: &BrokenLink) -> String {
    let status = broken
        .status
        .map_or_else(|| "error".to_string(), |s| s.to_string());
    let pages = broken.linked_from.len();
    format!(
        "[{}] {} (linked from {} page{})",
        status,
        broken.url,
        pages,
        if pages == 1 { "" } else { "s" }
    )
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Seed: {}", summary.seed);
    println!(
        "  Duration: {:.1}s (stopped: {})",
        summary.elapsed_ms as f64 / 1000.0,
        summary.stop_reason.as_str()
    );
    println!("  Config hash: {}", summary.config_hash);
    println!();

    println!("Pages:");
    println!("  Fetched: {}", summary.pages_fetched);
    println!("  Skipped: {}", summary.pages_skipped);
    for (reason, count) in &summary.skipped_by_reason {
        println!("    {}: {}", reason, count);
    }
    println!("  Failed: {}", summary.pages_failed);
    for (kind, count) in &summary.failed_by_kind {
        println!("    {}: {}", kind, count);
    }
    println!();

    let discarded = &summary.discarded;
    if discarded.total() > 0 {
        println!("URLs not enqueued ({}):", discarded.total());
        println!("  duplicate: {}", discarded.duplicate);
        println!("  too deep: {}", discarded.too_deep);
        println!("  out of scope: {}", discarded.out_of_scope);
        println!("  over page budget: {}", discarded.over_budget);
        println!();
    }

    if !summary.findings_by_severity.is_empty() {
        println!("Findings:");
        for (severity, count) in &summary.findings_by_severity {
            println!("  {}: {}", severity, count);
        }
        println!();
    }

    if !summary.broken_links.is_empty() {
        println!("Broken Links ({}):", summary.broken_links.len());
        for broken in &summary.broken_links {
            println!("  - {}", format_broken_link(broken));
        }
        println!();
    }

    if !summary.policy_unavailable.is_empty() {
        println!(
            "Policy Unavailable ({}):",
            summary.policy_unavailable.len()
        );
        for origin in &summary.policy_unavailable {
            println!("  - {}", origin);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages fetched)",
        summary.success_rate(),
        summary.pages_fetched,
        summary.total_pages()
    );
}

/// Prints each page as it arrives and the summary at the end
#[derive(Debug, Default)]
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ReportSink for ConsoleSink {
    fn on_page(&mut self, report: &PageReport) -> OutputResult<()> {
        if !self.quiet {
            println!("{}", format_page_line(report));
        }
        Ok(())
    }

    fn on_finish(&mut self, summary: &CrawlSummary) -> OutputResult<()> {
        if !self.quiet {
            println!();
        }
        print_summary(summary);
        Ok(())
    }
}
