use super::{clean_text, selector, Category, CheckResult, PageFinding, PageSnapshot, Severity};
use crate::config::AnalyzerThresholds;
use crate::url::registrable_domain;
use scraper::Html;

fn finding(severity: Severity, code: &'static str, message: impl Into<String>) -> PageFinding {
    PageFinding::new(Category::Meta, severity, code, message)
}

/// Title, meta description, canonical and robots directives
pub(super) fn check(
    document: &Html,
    page: &PageSnapshot<'_>,
    thresholds: &AnalyzerThresholds,
) -> CheckResult {
    let mut findings = Vec::new();
    check_title(document, thresholds, &mut findings)?;
    check_description(document, thresholds, &mut findings)?;
    check_canonical(document, page, &mut findings)?;
    check_robots(document, page, &mut findings)?;
    Ok(findings)
}

fn check_title(
    document: &Html,
    thresholds: &AnalyzerThresholds,
    findings: &mut Vec<PageFinding>,
) -> Result<(), super::AnalysisAnomaly> {
    let titles: Vec<String> = document
        .select(&selector("head title")?)
        .map(|t| clean_text(&t.text().collect::<String>()))
        .collect();

    let Some(title) = titles.first() else {
        findings.push(finding(Severity::Error, "title_missing", "Page has no <title>"));
        return Ok(());
    };

    if titles.len() > 1 {
        findings.push(
            finding(
                Severity::Warn,
                "title_multiple",
                format!("Page has {} <title> elements", titles.len()),
            )
            .with_evidence("title"),
        );
    }

    let len = title.chars().count();
    if len == 0 {
        findings.push(finding(Severity::Error, "title_empty", "<title> is empty").with_evidence("title"));
    } else if len < thresholds.title_min_length {
        findings.push(
            finding(
                Severity::Warn,
                "title_too_short",
                format!(
                    "Title is {} characters, below {}",
                    len, thresholds.title_min_length
                ),
            )
            .with_evidence(title.clone()),
        );
    } else if len > thresholds.title_max_length {
        findings.push(
            finding(
                Severity::Warn,
                "title_too_long",
                format!(
                    "Title is {} characters, above {}",
                    len, thresholds.title_max_length
                ),
            )
            .with_evidence(title.clone()),
        );
    }
    Ok(())
}

fn check_description(
    document: &Html,
    thresholds: &AnalyzerThresholds,
    findings: &mut Vec<PageFinding>,
) -> Result<(), super::AnalysisAnomaly> {
    let description = document
        .select(&selector("meta[name]")?)
        .find(|m| {
            m.value()
                .attr("name")
                .map_or(false, |n| n.trim().eq_ignore_ascii_case("description"))
        })
        .map(|m| clean_text(m.value().attr("content").unwrap_or("")));

    let Some(description) = description else {
        findings.push(finding(
            Severity::Warn,
            "description_missing",
            "Page has no meta description",
        ));
        return Ok(());
    };

    let len = description.chars().count();
    if len == 0 {
        findings.push(
            finding(Severity::Warn, "description_empty", "Meta description is empty")
                .with_evidence("meta[name=description]"),
        );
    } else if len < thresholds.description_min_length {
        findings.push(
            finding(
                Severity::Warn,
                "description_too_short",
                format!(
                    "Meta description is {} characters, below {}",
                    len, thresholds.description_min_length
                ),
            )
            .with_evidence("meta[name=description]"),
        );
    } else if len > thresholds.description_max_length {
        findings.push(
            finding(
                Severity::Warn,
                "description_too_long",
                format!(
                    "Meta description is {} characters, above {}",
                    len, thresholds.description_max_length
                ),
            )
            .with_evidence("meta[name=description]"),
        );
    }
    Ok(())
}

fn check_canonical(
    document: &Html,
    page: &PageSnapshot<'_>,
    findings: &mut Vec<PageFinding>,
) -> Result<(), super::AnalysisAnomaly> {
    let canonical = document
        .select(&selector("link[rel][href]")?)
        .find(|l| {
            l.value().attr("rel").map_or(false, |rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("canonical"))
            })
        })
        .and_then(|l| l.value().attr("href"))
        .map(str::trim);

    let Some(href) = canonical else {
        findings.push(finding(
            Severity::Warn,
            "canonical_missing",
            "Page has no canonical link",
        ));
        return Ok(());
    };

    match page.url.join(href) {
        Ok(target) if target.scheme() == "http" || target.scheme() == "https" => {
            if registrable_domain(&target) != registrable_domain(page.url) {
                findings.push(
                    finding(
                        Severity::Warn,
                        "canonical_cross_origin",
                        "Canonical URL points to another site",
                    )
                    .with_evidence(target.to_string()),
                );
            }
        }
        _ => findings.push(
            finding(
                Severity::Error,
                "canonical_invalid",
                "Canonical URL cannot be resolved",
            )
            .with_evidence(href.to_string()),
        ),
    }
    Ok(())
}

fn check_robots(
    document: &Html,
    page: &PageSnapshot<'_>,
    findings: &mut Vec<PageFinding>,
) -> Result<(), super::AnalysisAnomaly> {
    let mut directives: Vec<(String, &'static str)> = document
        .select(&selector("meta[name][content]")?)
        .filter(|m| {
            m.value()
                .attr("name")
                .map_or(false, |n| n.trim().eq_ignore_ascii_case("robots"))
        })
        .filter_map(|m| m.value().attr("content"))
        .flat_map(|content| content.split(','))
        .map(|d| (d.trim().to_ascii_lowercase(), "meta[name=robots]"))
        .collect();

    if let Some(header) = page.header("x-robots-tag") {
        directives.extend(
            header
                .split(',')
                .map(|d| (d.trim().to_ascii_lowercase(), "X-Robots-Tag")),
        );
    }

    let mut seen_noindex = false;
    let mut seen_nofollow = false;
    for (directive, source) in directives {
        let (noindex, nofollow) = match directive.as_str() {
            "noindex" => (true, false),
            "nofollow" => (false, true),
            "none" => (true, true),
            _ => (false, false),
        };
        if noindex && !seen_noindex {
            seen_noindex = true;
            findings.push(
                finding(
                    Severity::Warn,
                    "robots_noindex",
                    "Page asks search engines not to index it",
                )
                .with_evidence(source),
            );
        }
        if nofollow && !seen_nofollow {
            seen_nofollow = true;
            findings.push(
                finding(
                    Severity::Warn,
                    "robots_nofollow",
                    "Page asks search engines not to follow its links",
                )
                .with_evidence(source),
            );
        }
    }
    Ok(())
}
