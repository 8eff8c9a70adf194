use super::{selector, Category, CheckResult, PageFinding, PageSnapshot, Severity};
use scraper::Html;
use std::collections::BTreeSet;

/// Subresource attributes that load content into the page
const RESOURCE_SELECTORS: &[(&str, &str)] = &[
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("iframe[src]", "src"),
    ("source[src]", "src"),
    ("video[src]", "src"),
    ("audio[src]", "src"),
    ("embed[src]", "src"),
    ("object[data]", "data"),
    ("link[rel~=\"stylesheet\"][href]", "href"),
];

fn finding(severity: Severity, code: &'static str, message: impl Into<String>) -> PageFinding {
    PageFinding::new(Category::Security, severity, code, message)
}

/// Transport security and response hardening headers
pub(super) fn check(document: &Html, page: &PageSnapshot<'_>) -> CheckResult {
    let mut findings = Vec::new();
    let https = page.url.scheme() == "https";

    if !https {
        findings.push(
            finding(Severity::Error, "not_https", "Page is served over plain HTTP")
                .with_evidence(page.url.to_string()),
        );
    } else {
        let mut insecure = BTreeSet::new();
        for (css, attr) in RESOURCE_SELECTORS {
            for element in document.select(&selector(css)?) {
                if let Some(value) = element.value().attr(attr) {
                    let value = value.trim();
                    if value
                        .get(..7)
                        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("http://"))
                    {
                        insecure.insert(value.to_string());
                    }
                }
            }
        }
        for resource in insecure {
            findings.push(
                finding(
                    Severity::Warn,
                    "mixed_content",
                    "HTTPS page loads a resource over HTTP",
                )
                .with_evidence(resource),
            );
        }

        if page.header("strict-transport-security").is_none() {
            findings.push(
                finding(
                    Severity::Warn,
                    "hsts_missing",
                    "Strict-Transport-Security header is missing",
                )
                .with_evidence("Strict-Transport-Security"),
            );
        }
    }

    let csp = page.header("content-security-policy");
    if csp.is_none() {
        findings.push(
            finding(
                Severity::Warn,
                "csp_missing",
                "Content-Security-Policy header is missing",
            )
            .with_evidence("Content-Security-Policy"),
        );
    }

    let nosniff = page
        .header("x-content-type-options")
        .map_or(false, |v| v.eq_ignore_ascii_case("nosniff"));
    if !nosniff {
        findings.push(
            finding(
                Severity::Warn,
                "content_type_options_missing",
                "X-Content-Type-Options: nosniff is not set",
            )
            .with_evidence("X-Content-Type-Options"),
        );
    }

    let frame_ancestors = csp.map_or(false, |policy| {
        policy
            .split(';')
            .any(|d| d.trim().to_ascii_lowercase().starts_with("frame-ancestors"))
    });
    if page.header("x-frame-options").is_none() && !frame_ancestors {
        findings.push(
            finding(
                Severity::Warn,
                "frame_options_missing",
                "Neither X-Frame-Options nor CSP frame-ancestors restricts framing",
            )
            .with_evidence("X-Frame-Options"),
        );
    }

    if page.header("referrer-policy").is_none() {
        findings.push(
            finding(
                Severity::Info,
                "referrer_policy_missing",
                "Referrer-Policy header is missing",
            )
            .with_evidence("Referrer-Policy"),
        );
    }

    Ok(findings)
}
