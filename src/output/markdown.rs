//! Markdown report generation
//!
//! This module renders a finished crawl as a human-readable markdown
//! document: run information, page totals, and the findings of every page
//! in crawl order.

use super::report::{CrawlSummary, PageOutcome, PageReport};
use super::stats::crawl_order;
use super::traits::{OutputResult, ReportSink};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes a markdown report for a crawl
///
/// # Arguments
///
/// * `summary` - The crawl summary
/// * `reports` - Per-page reports, in any order
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_report(
    summary: &CrawlSummary,
    reports: &[PageReport],
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_report(summary, reports);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl as markdown
pub fn format_markdown_report(summary: &CrawlSummary, reports: &[PageReport]) -> String {
    let mut md = String::new();

    md.push_str("# Seo-Ripple Crawl Report\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", summary.seed));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        summary.finished_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        summary.elapsed_ms as f64 / 1000.0
    ));
    md.push_str(&format!(
        "- **Stop Reason**: {}\n",
        summary.stop_reason.as_str()
    ));
    md.push_str(&format!(
        "- **Limits**: depth {}, pages {}, concurrency {}\n",
        summary.config.max_depth, summary.config.max_pages, summary.config.concurrency
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Page Totals\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Fetched | {} |\n", summary.pages_fetched));
    for (reason, count) in &summary.skipped_by_reason {
        md.push_str(&format!("| Skipped ({}) | {} |\n", reason, count));
    }
    for (kind, count) in &summary.failed_by_kind {
        md.push_str(&format!("| Failed ({}) | {} |\n", kind, count));
    }
    md.push_str(&format!(
        "\n**Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    if !summary.findings_by_severity.is_empty() {
        md.push_str("## Findings by Severity\n\n");
        md.push_str("| Severity | Count |\n");
        md.push_str("|----------|-------|\n");
        for (severity, count) in &summary.findings_by_severity {
            md.push_str(&format!("| {} | {} |\n", severity, count));
        }
        md.push('\n');
    }

    if !summary.broken_links.is_empty() {
        md.push_str("## Broken Links\n\n");
        md.push_str("| URL | Status | Linked from |\n");
        md.push_str("|-----|--------|-------------|\n");
        for broken in &summary.broken_links {
            let status = broken
                .status
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                broken.url,
                status,
                broken.linked_from.join("<br>")
            ));
        }
        md.push('\n');
    }

    if !summary.policy_unavailable.is_empty() {
        md.push_str("## Policy Unavailable\n\n");
        md.push_str("robots.txt or sitemap could not be read; crawled permissively.\n\n");
        for origin in &summary.policy_unavailable {
            md.push_str(&format!("- {}\n", origin));
        }
        md.push('\n');
    }

    let mut ordered = reports.to_vec();
    crawl_order(&mut ordered);

    if !ordered.is_empty() {
        md.push_str("## Pages\n\n");
    }
    for report in &ordered {
        md.push_str(&format!(
            "### {} (depth {})\n\n",
            report.url.as_str(),
            report.depth()
        ));
        match &report.outcome {
            PageOutcome::Fetched {
                status_code,
                final_url,
                elapsed_ms,
                ..
            } => {
                md.push_str(&format!(
                    "HTTP {} in {} ms",
                    status_code, elapsed_ms
                ));
                if final_url != report.url.request_url().as_str() {
                    md.push_str(&format!(", served from {}", final_url));
                }
                md.push_str("\n\n");
            }
            PageOutcome::Skipped { reason } => {
                md.push_str(&format!("Skipped: {}\n\n", reason.label()));
                continue;
            }
            PageOutcome::Failed {
                kind,
                attempts,
                message,
                ..
            } => {
                md.push_str(&format!(
                    "Failed ({}) after {} attempt(s): {}\n\n",
                    kind.label(),
                    attempts,
                    message
                ));
                continue;
            }
        }

        if report.findings.is_empty() {
            md.push_str("No findings.\n\n");
            continue;
        }
        md.push_str("| Category | Severity | Code | Detail |\n");
        md.push_str("|----------|----------|------|--------|\n");
        for finding in &report.findings {
            let detail = match &finding.evidence {
                Some(evidence) => format!("{} (`{}`)", finding.message, evidence),
                None => finding.message.clone(),
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                finding.category.as_str(),
                finding.severity.as_str(),
                finding.code,
                escape_cell(&detail)
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Collects reports and writes the markdown file when the crawl finishes
#[derive(Debug)]
pub struct MarkdownSink {
    path: PathBuf,
    reports: Vec<PageReport>,
}

impl MarkdownSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reports: Vec::new(),
        }
    }
}

impl ReportSink for MarkdownSink {
    fn on_page(&mut self, report: &PageReport) -> OutputResult<()> {
        self.reports.push(report.clone());
        Ok(())
    }

    fn on_finish(&mut self, summary: &CrawlSummary) -> OutputResult<()> {
        generate_markdown_report(summary, &self.reports, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Category, PageFinding, Severity};
    use crate::config::CrawlConfig;
    use crate::output::BrokenLink;
    use crate::crawler::{DiscardCounts, SkipReason, StopReason};
    use crate::url::UrlRef;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn create_test_summary() -> CrawlSummary {
        let now = Utc::now();
        let mut skipped_by_reason = BTreeMap::new();
        skipped_by_reason.insert("robots_disallowed".to_string(), 1);
        CrawlSummary {
            seed: "https://example.test/".to_string(),
            started_at: now,
            finished_at: now,
            elapsed_ms: 1500,
            config: CrawlConfig::new("https://example.test/"),
            config_hash: "abc123".to_string(),
            pages_fetched: 1,
            pages_skipped: 1,
            pages_failed: 0,
            skipped_by_reason,
            failed_by_kind: BTreeMap::new(),
            discarded: DiscardCounts::default(),
            policy_unavailable: vec!["https://down.test".to_string()],
            findings_by_severity: BTreeMap::new(),
            broken_links: Vec::new(),
            stop_reason: StopReason::FrontierDrained,
        }
    }

    fn create_test_reports() -> Vec<PageReport> {
        let private = PageReport::new(
            1,
            UrlRef::new("https://example.test/private/", 1).unwrap(),
            PageOutcome::Skipped {
                reason: SkipReason::RobotsDisallowed,
            },
        );
        let mut home = PageReport::new(
            0,
            UrlRef::new("https://example.test/", 0).unwrap(),
            PageOutcome::Fetched {
                status_code: 200,
                final_url: "https://example.test/".to_string(),
                elapsed_ms: 42,
                body_bytes: 100,
                truncated: false,
                content_type: Some("text/html".to_string()),
            },
        );
        home.findings.push(
            PageFinding::new(Category::Meta, Severity::Error, "title_missing", "No <title>")
                .with_evidence("a|b"),
        );
        vec![private, home]
    }

    #[test]
    fn test_format_markdown_report() {
        let markdown = format_markdown_report(&create_test_summary(), &create_test_reports());

        assert!(markdown.contains("# Seo-Ripple Crawl Report"));
        assert!(markdown.contains("- **Config Hash**: abc123"));
        assert!(markdown.contains("| Skipped (robots_disallowed) | 1 |"));
        assert!(markdown.contains("## Policy Unavailable"));
        assert!(markdown.contains("https://down.test"));
    }

    #[test]
    fn test_broken_links_section() {
        let mut summary = create_test_summary();
        assert!(!format_markdown_report(&summary, &[]).contains("## Broken Links"));

        summary.broken_links.push(BrokenLink {
            url: "https://example.test/gone".to_string(),
            status: Some(404),
            linked_from: vec![
                "https://example.test/".to_string(),
                "https://example.test/about".to_string(),
            ],
        });
        let markdown = format_markdown_report(&summary, &[]);
        assert!(markdown.contains("## Broken Links"));
        assert!(markdown.contains(
            "| https://example.test/gone | 404 | https://example.test/<br>https://example.test/about |"
        ));
    }

    #[test]
    fn test_pages_rendered_in_crawl_order() {
        let markdown = format_markdown_report(&create_test_summary(), &create_test_reports());

        let home = markdown.find("### https://example.test/ (depth 0)").unwrap();
        let private = markdown
            .find("### https://example.test/private (depth 1)")
            .unwrap();
        assert!(home < private);
        assert!(markdown.contains("| meta | error | title_missing |"));
        assert!(markdown.contains("a\\|b"));
    }

    #[test]
    fn test_markdown_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let mut sink = MarkdownSink::new(&path);

        for report in create_test_reports() {
            sink.on_page(&report).unwrap();
        }
        sink.on_finish(&create_test_summary()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Skipped: robots_disallowed"));
    }
}
