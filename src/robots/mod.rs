//! Robots.txt handling module
//!
//! This module fetches, parses and caches robots.txt files, answers whether a
//! URL may be fetched, and turns sitemap listings into supplemental seeds.

mod cache;
mod parser;
mod sitemap;

pub use cache::PolicyCache;
pub use parser::{PolicySource, RobotsPolicy, MAX_CRAWL_DELAY};
pub use sitemap::{
    extract_locs, is_sitemap_index, SitemapSeeds, MAX_SITEMAP_DOCUMENTS, MAX_SITEMAP_LOCS,
};

use crate::url::site_root;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Redirect hops followed when fetching robots.txt or a sitemap
const POLICY_MAX_REDIRECTS: usize = 5;

/// robots.txt bodies are cut off here
const MAX_ROBOTS_BYTES: usize = 512 * 1024;

/// Gatekeeper consulted before every fetch
///
/// Holds one [`RobotsPolicy`] per site root for the duration of a crawl.
pub struct PolicyGate {
    client: Client,
    cache: PolicyCache,
    product_token: String,
    timeout: Duration,
    sitemap_failures: Mutex<BTreeSet<String>>,
}

enum TextFetch {
    Body(String),
    Status(StatusCode),
}

impl PolicyGate {
    /// Creates a gate that identifies itself as `product_token` in group matching
    pub fn new(client: Client, product_token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            cache: PolicyCache::new(),
            product_token: product_token.into(),
            timeout,
            sitemap_failures: Mutex::new(BTreeSet::new()),
        }
    }

    /// Loads the policy for a site root such as `https://example.com`
    ///
    /// Fetched at most once per crawl. A 4xx answer means "no restrictions"; a
    /// 5xx, timeout or network error is also permissive but recorded as
    /// unavailable.
    pub async fn load(&self, site: &str) -> Arc<RobotsPolicy> {
        self.cache
            .get_or_load(site, || self.fetch_policy(site))
            .await
    }

    /// Policy governing `url`, loading it if needed
    pub async fn policy_for(&self, url: &Url) -> Arc<RobotsPolicy> {
        match site_root(url) {
            Some(site) => self.load(&site).await,
            None => Arc::new(RobotsPolicy::permissive(PolicySource::Missing { status: 0 })),
        }
    }

    /// Policy governing `url` if it was already loaded
    pub fn cached(&self, url: &Url) -> Option<Arc<RobotsPolicy>> {
        site_root(url).and_then(|site| self.cache.get(&site))
    }

    pub fn is_allowed(&self, policy: &RobotsPolicy, url: &Url) -> bool {
        policy.is_allowed(url, &self.product_token)
    }

    /// Checks `url` against an already loaded policy; unknown sites pass
    pub fn allows_cached(&self, url: &Url) -> bool {
        self.cached(url)
            .map_or(true, |policy| self.is_allowed(&policy, url))
    }

    pub fn crawl_delay(&self, policy: &RobotsPolicy) -> Option<Duration> {
        policy.crawl_delay(&self.product_token)
    }

    /// Sites whose robots.txt or declared sitemap could not be retrieved
    pub fn unavailable_origins(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = self.cache.unavailable_sites().into_iter().collect();
        if let Ok(failures) = self.sitemap_failures.lock() {
            all.extend(failures.iter().cloned());
        }
        all.into_iter().collect()
    }

    /// Sitemap URLs of `site`, as a lazy sequence of depth-1 seeds
    ///
    /// Uses the sitemaps declared by `policy`, or `{site}/sitemap.xml` when it
    /// declares none. Sitemap index files are followed one level deep.
    pub async fn seeds_from_sitemap(&self, policy: &RobotsPolicy, site: &str) -> SitemapSeeds {
        let declared = !policy.sitemaps().is_empty();
        let mut sources: Vec<String> = if declared {
            policy.sitemaps().to_vec()
        } else {
            vec![format!("{}/sitemap.xml", site.trim_end_matches('/'))]
        };
        sources.truncate(MAX_SITEMAP_DOCUMENTS);

        let mut documents = 0usize;
        let mut locs = Vec::new();
        let mut pending_children = Vec::new();

        for source in sources {
            documents += 1;
            let Some(xml) = self.fetch_sitemap(&source, declared).await else {
                continue;
            };
            if is_sitemap_index(&xml) {
                pending_children.extend(extract_locs(&xml));
            } else {
                locs.extend(extract_locs(&xml));
            }
        }

        for child in pending_children {
            if documents >= MAX_SITEMAP_DOCUMENTS || locs.len() >= MAX_SITEMAP_LOCS {
                break;
            }
            documents += 1;
            if let Some(xml) = self.fetch_sitemap(&child, true).await {
                // Nested indexes are not followed
                if !is_sitemap_index(&xml) {
                    locs.extend(extract_locs(&xml));
                }
            }
        }

        tracing::debug!("Sitemap for {} listed {} URLs", site, locs.len());
        SitemapSeeds::new(locs)
    }

    async fn fetch_policy(&self, site: &str) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", site.trim_end_matches('/'));
        tracing::debug!("Fetching {}", robots_url);

        match self.fetch_text(&robots_url).await {
            Ok(TextFetch::Body(mut body)) => {
                if body.len() > MAX_ROBOTS_BYTES {
                    let mut cut = MAX_ROBOTS_BYTES;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                RobotsPolicy::from_content(&body)
            }
            Ok(TextFetch::Status(status)) if status.is_server_error() => {
                tracing::warn!(
                    "robots.txt for {} unavailable (HTTP {}), crawling without restrictions",
                    site,
                    status.as_u16()
                );
                RobotsPolicy::permissive(PolicySource::Unavailable {
                    reason: format!("HTTP {}", status.as_u16()),
                })
            }
            Ok(TextFetch::Status(status)) => {
                tracing::debug!("No robots.txt for {} (HTTP {})", site, status.as_u16());
                RobotsPolicy::permissive(PolicySource::Missing {
                    status: status.as_u16(),
                })
            }
            Err(e) => {
                tracing::warn!(
                    "robots.txt for {} unavailable ({}), crawling without restrictions",
                    site,
                    e
                );
                RobotsPolicy::permissive(PolicySource::Unavailable {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn fetch_sitemap(&self, url: &str, declared: bool) -> Option<String> {
        match self.fetch_text(url).await {
            Ok(TextFetch::Body(body)) => Some(body),
            Ok(TextFetch::Status(status)) => {
                tracing::debug!("Sitemap {} returned HTTP {}", url, status.as_u16());
                if declared && status.is_server_error() {
                    self.record_sitemap_failure(url);
                }
                None
            }
            Err(e) => {
                tracing::warn!("Sitemap {} unavailable: {}", url, e);
                if declared {
                    self.record_sitemap_failure(url);
                }
                None
            }
        }
    }

    fn record_sitemap_failure(&self, url: &str) {
        let site = Url::parse(url)
            .ok()
            .and_then(|u| site_root(&u))
            .unwrap_or_else(|| url.to_string());
        if let Ok(mut failures) = self.sitemap_failures.lock() {
            failures.insert(site);
        }
    }

    /// GET following a few redirects; non-2xx final answers return their status
    async fn fetch_text(&self, url: &str) -> Result<TextFetch, reqwest::Error> {
        let mut current = url.to_string();
        for _ in 0..=POLICY_MAX_REDIRECTS {
            let response = self
                .client
                .get(&current)
                .timeout(self.timeout)
                .send()
                .await?;
            let status = response.status();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| Url::parse(&current).ok()?.join(loc).ok());
                match next {
                    Some(next) => {
                        current = next.to_string();
                        continue;
                    }
                    None => return Ok(TextFetch::Status(status)),
                }
            }

            if !status.is_success() {
                return Ok(TextFetch::Status(status));
            }
            return Ok(TextFetch::Body(response.text().await?));
        }
        Ok(TextFetch::Status(StatusCode::LOOP_DETECTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate() -> PolicyGate {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        PolicyGate::new(client, "testbot", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_robots_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gate = gate();
        let url = Url::parse(&format!("{}/private/page", server.uri())).unwrap();
        let policy = gate.policy_for(&url).await;
        assert!(!gate.is_allowed(&policy, &url));

        let other = Url::parse(&format!("{}/public", server.uri())).unwrap();
        let policy = gate.policy_for(&other).await;
        assert!(gate.is_allowed(&policy, &other));
        assert!(!gate.allows_cached(&url));
        assert_eq!(*policy.source(), PolicySource::Fetched);
    }

    #[tokio::test]
    async fn test_missing_robots_is_permissive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gate = gate();
        let policy = gate.load(&server.uri()).await;
        assert_eq!(*policy.source(), PolicySource::Missing { status: 404 });
        assert!(gate.unavailable_origins().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gate = gate();
        let policy = gate.load(&server.uri()).await;
        assert!(policy.is_unavailable());
        let url = Url::parse(&format!("{}/anything", server.uri())).unwrap();
        assert!(gate.is_allowed(&policy, &url));
        assert_eq!(gate.unavailable_origins(), vec![server.uri()]);
    }

    #[tokio::test]
    async fn test_sitemap_fallback_location() {
        let server = MockServer::start().await;
        let xml = format!(
            "<urlset><url><loc>{0}/a</loc></url><url><loc>{0}/b</loc></url></urlset>",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xml))
            .mount(&server)
            .await;

        let gate = gate();
        let policy = RobotsPolicy::permissive(PolicySource::Missing { status: 404 });
        let seeds: Vec<String> = gate
            .seeds_from_sitemap(&policy, &server.uri())
            .await
            .map(|u| u.as_str().to_string())
            .collect();
        assert_eq!(seeds, vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())]);
    }

    #[tokio::test]
    async fn test_sitemap_index_followed_one_level() {
        let server = MockServer::start().await;
        let robots = format!("User-agent: *\nDisallow:\nSitemap: {}/index.xml", server.uri());
        let index = format!(
            "<sitemapindex><sitemap><loc>{}/pages.xml</loc></sitemap></sitemapindex>",
            server.uri()
        );
        let pages = format!("<urlset><url><loc>{}/deep</loc></url></urlset>", server.uri());

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pages.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(pages))
            .mount(&server)
            .await;

        let gate = gate();
        let policy = gate.load(&server.uri()).await;
        let seeds: Vec<_> = gate.seeds_from_sitemap(&policy, &server.uri()).await.collect();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].as_str(), format!("{}/deep", server.uri()));
        assert_eq!(seeds[0].depth(), 1);
    }
}
