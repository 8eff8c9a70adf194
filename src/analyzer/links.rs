use super::{selector, Category, PageFinding, PageSnapshot, Severity};
use crate::url::{normalize_parsed, registrable_domain, Scope};
use scraper::Html;
use std::collections::HashSet;
use url::Url;

pub(super) struct LinkReport {
    pub findings: Vec<PageFinding>,
    pub followable: Vec<Url>,
}

/// Where an `href` leads
#[derive(Debug, PartialEq, Eq)]
enum LinkTarget {
    Empty,
    Script,
    /// mailto:, tel:, data: and in-page anchors
    NotNavigable,
    Web(Url),
    Unresolvable,
}

/// Classifies anchors and collects the in-scope ones for the frontier
///
/// Followable links keep the form they were written in, minus the fragment,
/// and are unique by normalized URL. `<a download>` targets are counted but
/// not followed. `rel="nofollow"` links are followed.
pub(super) fn check(
    document: &Html,
    page: &PageSnapshot<'_>,
    scope: &Scope,
) -> Result<LinkReport, super::AnalysisAnomaly> {
    let base = document
        .select(&selector("base[href]")?)
        .next()
        .and_then(|b| b.value().attr("href"))
        .and_then(|href| page.url.join(href.trim()).ok())
        .unwrap_or_else(|| page.url.clone());
    let page_origin = registrable_domain(page.url);

    let mut findings = Vec::new();
    let mut followable = Vec::new();
    let mut seen = HashSet::new();
    let (mut internal, mut external) = (0usize, 0usize);

    for anchor in document.select(&selector("a[href]")?) {
        let href = anchor.value().attr("href").unwrap_or("");

        match resolve_link(href, &base) {
            LinkTarget::Empty => findings.push(
                PageFinding::new(
                    Category::Links,
                    Severity::Warn,
                    "link_empty_href",
                    "Link has an empty target",
                )
                .with_evidence(anchor_label(&anchor)),
            ),
            LinkTarget::Script => findings.push(
                PageFinding::new(
                    Category::Links,
                    Severity::Warn,
                    "link_javascript_href",
                    "Link target is a javascript: URL",
                )
                .with_evidence(anchor_label(&anchor)),
            ),
            LinkTarget::Unresolvable => findings.push(
                PageFinding::new(
                    Category::Links,
                    Severity::Warn,
                    "link_unresolvable",
                    "Link target is not a valid URL",
                )
                .with_evidence(href.trim().to_string()),
            ),
            LinkTarget::NotNavigable => {}
            LinkTarget::Web(target) => {
                let target_origin = registrable_domain(&target);
                let is_internal = target_origin == page_origin
                    || target_origin
                        .as_deref()
                        .map_or(false, |o| scope.is_internal_origin(o));
                if is_internal {
                    internal += 1;
                } else {
                    external += 1;
                }

                if anchor.value().attr("download").is_some() || !scope.contains(&target) {
                    continue;
                }
                let Ok(key) = normalize_parsed(target.clone()) else {
                    continue;
                };
                if seen.insert(key.as_str().to_string()) {
                    let mut target = target;
                    target.set_fragment(None);
                    followable.push(target);
                }
            }
        }
    }

    findings.insert(
        0,
        PageFinding::new(
            Category::Links,
            Severity::Info,
            "links_summary",
            format!("{} internal and {} external links", internal, external),
        ),
    );

    Ok(LinkReport {
        findings,
        followable,
    })
}

fn resolve_link(href: &str, base: &Url) -> LinkTarget {
    let href = href.trim();
    if href.is_empty() {
        return LinkTarget::Empty;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") {
        return LinkTarget::Script;
    }
    if href.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return LinkTarget::NotNavigable;
    }

    match base.join(href) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => LinkTarget::Web(url),
        Ok(_) => LinkTarget::NotNavigable,
        Err(_) => LinkTarget::Unresolvable,
    }
}

fn anchor_label(anchor: &scraper::ElementRef<'_>) -> String {
    let text = super::clean_text(&anchor.text().collect::<String>());
    if text.is_empty() {
        "a".to_string()
    } else {
        format!("a \"{}\"", text.chars().take(60).collect::<String>())
    }
}
