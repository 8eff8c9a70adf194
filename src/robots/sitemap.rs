//! Sitemap parsing and seed iteration

use crate::url::UrlRef;
use std::collections::{HashSet, VecDeque};

/// Most sitemap documents read for one origin
pub const MAX_SITEMAP_DOCUMENTS: usize = 8;

/// Most `<loc>` entries kept from all documents of one origin
pub const MAX_SITEMAP_LOCS: usize = 5000;

/// Extracts every `<loc>` value from a sitemap or sitemap index document
pub fn extract_locs(xml: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while let Some(open_idx) = xml[start..].find("<loc>") {
        let open = start + open_idx + "<loc>".len();
        let Some(close_rel) = xml[open..].find("</loc>") else {
            break;
        };
        let close = open + close_rel;
        let value = unescape_xml(strip_cdata(xml[open..close].trim()));
        if !value.is_empty() {
            out.push(value);
        }
        start = close + "</loc>".len();
    }
    out
}

/// True when the document lists other sitemaps rather than pages
pub fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

fn strip_cdata(value: &str) -> &str {
    value
        .strip_prefix("<![CDATA[")
        .and_then(|v| v.strip_suffix("]]>"))
        .map(str::trim)
        .unwrap_or(value)
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Lazy, finite sequence of sitemap URLs
///
/// Entries are normalized on demand; invalid or repeated ones are skipped.
/// Every yielded URL sits at depth 1, one hop from the seed.
#[derive(Debug, Default)]
pub struct SitemapSeeds {
    locs: VecDeque<String>,
    seen: HashSet<String>,
}

impl SitemapSeeds {
    pub fn new(locs: impl IntoIterator<Item = String>) -> Self {
        Self {
            locs: locs.into_iter().take(MAX_SITEMAP_LOCS).collect(),
            seen: HashSet::new(),
        }
    }

    /// Entries not yet consumed (before normalization and dedup)
    pub fn remaining(&self) -> usize {
        self.locs.len()
    }
}

impl Iterator for SitemapSeeds {
    type Item = UrlRef;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(raw) = self.locs.pop_front() {
            match UrlRef::new(&raw, 1) {
                Ok(url) => {
                    if self.seen.insert(url.key().to_string()) {
                        return Some(url);
                    }
                }
                Err(e) => tracing::trace!("Ignoring sitemap entry {}: {}", raw, e),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.locs.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_locs() {
        let xml = r#"<?xml version="1.0"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc> https://example.test/a </loc></url>
  <url><loc>https://example.test/b?x=1&amp;y=2</loc></url>
  <url><loc></loc></url>
</urlset>"#;
        assert_eq!(
            extract_locs(xml),
            vec![
                "https://example.test/a".to_string(),
                "https://example.test/b?x=1&y=2".to_string()
            ]
        );
        assert!(!is_sitemap_index(xml));
    }

    #[test]
    fn test_extract_cdata_and_unclosed() {
        let xml = "<loc><![CDATA[https://example.test/c]]></loc><loc>https://example.test/d";
        assert_eq!(extract_locs(xml), vec!["https://example.test/c".to_string()]);
    }

    #[test]
    fn test_detect_index() {
        let xml = "<sitemapindex><sitemap><loc>https://example.test/s1.xml</loc></sitemap></sitemapindex>";
        assert!(is_sitemap_index(xml));
    }

    #[test]
    fn test_seeds_are_lazy_normalized_and_deduped() {
        let mut seeds = SitemapSeeds::new(vec![
            "https://example.test/a/".to_string(),
            "not a url".to_string(),
            "https://example.test/a#top".to_string(),
            "https://example.test/b".to_string(),
        ]);
        assert_eq!(seeds.remaining(), 4);

        let first = seeds.next().unwrap();
        assert_eq!(first.as_str(), "https://example.test/a");
        assert_eq!(first.depth(), 1);
        assert_eq!(seeds.remaining(), 3);

        let rest: Vec<String> = seeds.map(|u| u.as_str().to_string()).collect();
        assert_eq!(rest, vec!["https://example.test/b".to_string()]);
    }

    #[test]
    fn test_seed_count_capped() {
        let locs = (0..MAX_SITEMAP_LOCS + 10).map(|i| format!("https://example.test/p{}", i));
        let seeds = SitemapSeeds::new(locs);
        assert_eq!(seeds.remaining(), MAX_SITEMAP_LOCS);
    }
}
