use super::{Category, CheckResult, PageFinding, PageSnapshot, Severity};
use crate::config::AnalyzerThresholds;

/// Response time, page weight and truncation
pub(super) fn check(page: &PageSnapshot<'_>, thresholds: &AnalyzerThresholds) -> CheckResult {
    let mut findings = Vec::new();

    if page.elapsed_ms > thresholds.slow_response_ms {
        findings.push(
            PageFinding::new(
                Category::Performance,
                Severity::Warn,
                "slow_response",
                format!(
                    "Page took {} ms to load, above {} ms",
                    page.elapsed_ms, thresholds.slow_response_ms
                ),
            )
            .with_evidence(format!("{} ms", page.elapsed_ms)),
        );
    }

    if page.body_bytes > thresholds.max_page_bytes {
        findings.push(
            PageFinding::new(
                Category::Performance,
                Severity::Warn,
                "page_too_large",
                format!(
                    "HTML is {} bytes, above {}",
                    page.body_bytes, thresholds.max_page_bytes
                ),
            )
            .with_evidence(format!("{} bytes", page.body_bytes)),
        );
    }

    if page.truncated {
        findings.push(
            PageFinding::new(
                Category::Performance,
                Severity::Error,
                "body_truncated",
                "Response body exceeded the download limit and was cut off; later checks saw a partial page",
            )
            .with_evidence(format!("{} bytes kept", page.body_bytes)),
        );
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn codes(elapsed_ms: u64, body_bytes: usize, truncated: bool) -> Vec<&'static str> {
        let url = Url::parse("https://example.test/").unwrap();
        let headers = HeaderMap::new();
        let page = PageSnapshot {
            url: &url,
            body: "",
            headers: &headers,
            elapsed_ms,
            body_bytes,
            truncated,
        };
        let thresholds = AnalyzerThresholds {
            slow_response_ms: 1000,
            max_page_bytes: 10_000,
            ..AnalyzerThresholds::default()
        };
        check(&page, &thresholds)
            .unwrap()
            .into_iter()
            .map(|f| f.code)
            .collect()
    }

    #[test]
    fn test_fast_small_page() {
        assert!(codes(200, 5_000, false).is_empty());
    }

    #[test]
    fn test_slow_and_heavy_page() {
        assert_eq!(codes(1500, 20_000, false), vec!["slow_response", "page_too_large"]);
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        assert_eq!(codes(10, 10_000, true), vec!["body_truncated"]);
    }
}
