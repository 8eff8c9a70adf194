use super::{selector, Category, CheckResult, PageFinding, Severity};
use crate::config::AnalyzerThresholds;
use scraper::Html;
use std::collections::BTreeSet;

/// Elements whose text is never shown to readers
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template"];

/// Word count and heading structure
pub(super) fn check(document: &Html, thresholds: &AnalyzerThresholds) -> CheckResult {
    let mut findings = Vec::new();

    let words = visible_word_count(document);
    if words < thresholds.min_word_count {
        findings.push(
            PageFinding::new(
                Category::Content,
                Severity::Warn,
                "thin_content",
                format!(
                    "Page has {} words of visible text, below {}",
                    words, thresholds.min_word_count
                ),
            )
            .with_evidence(format!("{} words", words)),
        );
    }

    let levels: Vec<u8> = document
        .select(&selector("h1, h2, h3, h4, h5, h6")?)
        .filter_map(|h| h.value().name().strip_prefix('h')?.parse().ok())
        .collect();

    let h1_count = levels.iter().filter(|l| **l == 1).count();
    if h1_count == 0 {
        findings.push(PageFinding::new(
            Category::Content,
            Severity::Error,
            "h1_missing",
            "Page has no <h1>",
        ));
    } else if h1_count > 1 {
        findings.push(
            PageFinding::new(
                Category::Content,
                Severity::Warn,
                "h1_multiple",
                format!("Page has {} <h1> elements", h1_count),
            )
            .with_evidence("h1"),
        );
    }

    let mut skips = BTreeSet::new();
    for pair in levels.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next > prev + 1 && skips.insert((prev, next)) {
            findings.push(
                PageFinding::new(
                    Category::Content,
                    Severity::Warn,
                    "heading_level_skipped",
                    format!("Heading jumps from h{} to h{}", prev, next),
                )
                .with_evidence(format!("h{} -> h{}", prev, next)),
            );
        }
    }

    Ok(findings)
}

/// Counts words in text nodes outside script, style and similar elements
pub(crate) fn visible_word_count(document: &Html) -> usize {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map_or(false, |e| INVISIBLE.contains(&e.name()))
            });
            (!hidden).then(|| {
                text.split_whitespace()
                    .filter(|w| w.chars().any(char::is_alphanumeric))
                    .count()
            })
        })
        .sum()
}
