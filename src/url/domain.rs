use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_ripple::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable domain used for scope decisions
///
/// The host is lowercased and a single leading `www.` label is dropped, so
/// `www.example.com` and `example.com` belong to the same site. Ports are
/// ignored.
///
/// ```
/// use url::Url;
/// use seo_ripple::url::registrable_domain;
///
/// let url = Url::parse("https://www.Example.com:8443/a").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => Some(rest.to_string()),
        _ => Some(host),
    }
}

/// Returns `scheme://host[:port]`, the base that robots.txt and sitemap
/// locations are resolved against
pub fn site_root(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Checks if a domain matches a pattern
///
/// `example.com` matches only itself; `*.example.com` matches the bare domain
/// and any subdomain of it.
pub fn matches_domain_pattern(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || (candidate.len() > base.len()
                    && candidate.ends_with(base)
                    && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
        }
        None => candidate == pattern,
    }
}
