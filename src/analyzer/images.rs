use super::{selector, Category, CheckResult, PageFinding, Severity};
use crate::config::AnalyzerThresholds;
use scraper::Html;

/// Alternative text and declared dimensions of every `<img>`
pub(super) fn check(document: &Html, thresholds: &AnalyzerThresholds) -> CheckResult {
    let mut findings = Vec::new();

    for (index, img) in document.select(&selector("img")?).enumerate() {
        let element = img.value();
        let locator = element
            .attr("src")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("img #{}", index + 1));

        let alt_missing = element.attr("alt").map_or(true, |alt| alt.trim().is_empty());
        if alt_missing {
            findings.push(
                PageFinding::new(
                    Category::Images,
                    Severity::Warn,
                    "image_alt_missing",
                    "Image has no alternative text",
                )
                .with_evidence(locator.clone()),
            );
        }

        let oversized = ["width", "height"].iter().find_map(|attr| {
            let value = parse_dimension(element.attr(attr)?)?;
            (value > thresholds.max_image_dimension).then_some((*attr, value))
        });
        if let Some((attr, value)) = oversized {
            findings.push(
                PageFinding::new(
                    Category::Images,
                    Severity::Warn,
                    "image_oversized",
                    format!(
                        "Image declares {}={} px, above {}",
                        attr, value, thresholds.max_image_dimension
                    ),
                )
                .with_evidence(locator),
            );
        }
    }

    Ok(findings)
}

/// Parses `640` or `640px`; percentages and junk are ignored
fn parse_dimension(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value.strip_suffix("px").unwrap_or(value).trim();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(body: &str) -> Vec<PageFinding> {
        check(&Html::parse_document(body), &AnalyzerThresholds::default()).unwrap()
    }

    #[test]
    fn test_alt_missing_once_per_image() {
        let found = findings(r#"<img src="/a.png"><img src="/b.png" alt="  "><img src="/c.png" alt="Chart">"#);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|f| f.code == "image_alt_missing"));
        assert_eq!(found[0].evidence.as_deref(), Some("/a.png"));
        assert_eq!(found[1].evidence.as_deref(), Some("/b.png"));
    }

    #[test]
    fn test_image_without_src_gets_positional_evidence() {
        let found = findings(r#"<img alt="x"><img>"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].evidence.as_deref(), Some("img #2"));
    }

    #[test]
    fn test_oversized_dimensions() {
        let found = findings(r#"<img src="/big.jpg" alt="Big" width="6000px" height="100">"#);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "image_oversized");

        let found = findings(r#"<img src="/ok.jpg" alt="Fine" width="100%" height="400">"#);
        assert!(found.is_empty());
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("640"), Some(640));
        assert_eq!(parse_dimension(" 640px "), Some(640));
        assert_eq!(parse_dimension("50%"), None);
        assert_eq!(parse_dimension("auto"), None);
    }
}
