//! On-page SEO analysis
//!
//! [`analyze`] is a pure function from one fetched page to a list of
//! findings plus the followable links found on it. The HTML is parsed once;
//! every category check then runs on its own. A check that trips over the
//! document reports a single low-confidence finding instead of failing the
//! page.

mod content;
mod images;
mod links;
mod meta;
mod performance;
mod security;

use crate::config::AnalyzerThresholds;
use crate::crawler::FetchedPage;
use crate::url::Scope;
use reqwest::header::HeaderMap;
use scraper::{Html, Selector};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Check category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Meta,
    Content,
    Images,
    Links,
    Performance,
    Security,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Content => "content",
            Self::Images => "images",
            Self::Links => "links",
            Self::Performance => "performance",
            Self::Security => "security",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// One reported issue or observation about a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFinding {
    pub category: Category,
    pub severity: Severity,
    /// Stable machine-readable identifier, e.g. `title_missing`
    pub code: &'static str,
    pub message: String,
    /// Where on the page the finding points (tag, attribute, header, URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// Set when the check could not fully inspect the page
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub low_confidence: bool,
}

impl PageFinding {
    pub fn new(
        category: Category,
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            code,
            message: message.into(),
            evidence: None,
            low_confidence: false,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// A check could not inspect part of the document
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AnalysisAnomaly(pub String);

impl AnalysisAnomaly {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub(crate) type CheckResult = Result<Vec<PageFinding>, AnalysisAnomaly>;

/// Everything the analyzer looks at for one page
#[derive(Debug, Clone, Copy)]
pub struct PageSnapshot<'a> {
    pub url: &'a Url,
    pub body: &'a str,
    pub headers: &'a HeaderMap,
    pub elapsed_ms: u64,
    pub body_bytes: usize,
    pub truncated: bool,
}

impl<'a> PageSnapshot<'a> {
    pub fn from_fetched(page: &'a FetchedPage) -> Self {
        Self {
            url: &page.final_url,
            body: &page.body,
            headers: &page.headers,
            elapsed_ms: page.elapsed_ms,
            body_bytes: page.body_bytes,
            truncated: page.truncated,
        }
    }

    pub(crate) fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    }
}

/// Result of analyzing one page
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Findings in category order, then document order
    pub findings: Vec<PageFinding>,
    /// In-scope, followable links in document order, unique by normalized form
    pub links: Vec<Url>,
}

/// Runs every check against `page`
///
/// Deterministic: the same input always yields the same findings in the same
/// order.
pub fn analyze(page: &PageSnapshot<'_>, scope: &Scope, thresholds: &AnalyzerThresholds) -> Analysis {
    let document = Html::parse_document(page.body);
    let mut analysis = Analysis::default();

    let meta = meta::check(&document, page, thresholds);
    absorb(&mut analysis.findings, Category::Meta, meta);

    let content = content::check(&document, thresholds);
    absorb(&mut analysis.findings, Category::Content, content);

    let images = images::check(&document, thresholds);
    absorb(&mut analysis.findings, Category::Images, images);

    match links::check(&document, page, scope) {
        Ok(report) => {
            analysis.findings.extend(report.findings);
            analysis.links = report.followable;
        }
        Err(anomaly) => analysis
            .findings
            .push(anomaly_finding(Category::Links, &anomaly)),
    }

    let performance = performance::check(page, thresholds);
    absorb(&mut analysis.findings, Category::Performance, performance);

    let security = security::check(&document, page);
    absorb(&mut analysis.findings, Category::Security, security);

    analysis
}

fn absorb(findings: &mut Vec<PageFinding>, category: Category, result: CheckResult) {
    match result {
        Ok(found) => findings.extend(found),
        Err(anomaly) => findings.push(anomaly_finding(category, &anomaly)),
    }
}

fn anomaly_finding(category: Category, anomaly: &AnalysisAnomaly) -> PageFinding {
    tracing::warn!("{} check incomplete: {}", category.as_str(), anomaly);
    PageFinding {
        category,
        severity: Severity::Info,
        code: "analysis_anomaly",
        message: format!("{} checks could not fully inspect this page", category.as_str()),
        evidence: Some(anomaly.to_string()),
        low_confidence: true,
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector, AnalysisAnomaly> {
    Selector::parse(css)
        .map_err(|e| AnalysisAnomaly::new(format!("selector `{}` rejected: {:?}", css, e)))
}

/// Collapses internal whitespace and trims
pub(crate) fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
