//! URL handling module for Seo-Ripple
//!
//! This module provides URL normalization, domain extraction, the immutable
//! [`UrlRef`] carried through the crawl, and the [`Scope`] policy that decides
//! which discovered URLs the crawl may follow.

mod domain;
mod normalize;

use crate::config::CrawlConfig;
use crate::UrlError;
use serde::{Serialize, Serializer};
use std::hash::{Hash, Hasher};
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, matches_domain_pattern, registrable_domain, site_root};
pub use normalize::{normalize_parsed, normalize_url};

/// A discovered URL together with its distance from the seed
///
/// Equality and hashing only consider the normalized URL, so the same page
/// reached at two different depths, or with and without a trailing slash,
/// is still one node. The URL as discovered is kept for the request itself:
/// servers treat `/dir` and `/dir/` as different resources.
#[derive(Debug, Clone)]
pub struct UrlRef {
    url: Url,
    request: Url,
    depth: u32,
    origin: String,
}

impl UrlRef {
    /// Parses `raw` and wraps it at the given depth
    pub fn new(raw: &str, depth: u32) -> Result<Self, UrlError> {
        let parsed = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(parsed, depth)
    }

    /// Wraps an already parsed URL; the dedup key is its normalized form
    pub fn from_url(mut request: Url, depth: u32) -> Result<Self, UrlError> {
        request.set_fragment(None);
        let url = normalize_parsed(request.clone())?;
        let origin = registrable_domain(&url).ok_or(UrlError::MissingDomain)?;
        Ok(Self {
            url,
            request,
            depth,
            origin,
        })
    }

    /// The normalized URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL to put on the wire, as discovered minus its fragment
    pub fn request_url(&self) -> &Url {
        &self.request
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The dedup key: the normalized URL string
    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Registrable domain (lowercase host, leading `www.` removed)
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// `scheme://host[:port]` of this URL
    pub fn site_root(&self) -> String {
        site_root(&self.url).unwrap_or_else(|| self.origin.clone())
    }
}

impl PartialEq for UrlRef {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for UrlRef {}

impl Hash for UrlRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.as_str().hash(state);
    }
}

impl Serialize for UrlRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("UrlRef", 3)?;
        s.serialize_field("url", self.url.as_str())?;
        s.serialize_field("depth", &self.depth)?;
        s.serialize_field("origin", &self.origin)?;
        s.end()
    }
}

impl std::fmt::Display for UrlRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (depth {})", self.url, self.depth)
    }
}

/// Decides which URLs belong to the crawl
///
/// With `same_origin_only` set, a URL is in scope when its registrable domain
/// equals the seed's or matches one of the extra allowed patterns. Without it,
/// every http(s) URL is in scope.
#[derive(Debug, Clone)]
pub struct Scope {
    seed_origin: String,
    same_origin_only: bool,
    allowed: Vec<String>,
}

impl Scope {
    pub fn new(seed_origin: impl Into<String>, same_origin_only: bool) -> Self {
        Self {
            seed_origin: seed_origin.into(),
            same_origin_only,
            allowed: Vec::new(),
        }
    }

    /// Adds extra domain patterns (`example.com` or `*.example.com`)
    pub fn with_allowed<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed
            .extend(patterns.into_iter().map(|p| p.into().to_lowercase()));
        self
    }

    /// Builds the scope of a crawl from its configuration
    pub fn from_config(config: &CrawlConfig) -> Result<Self, UrlError> {
        let seed = normalize_url(&config.seed)?;
        let origin = registrable_domain(&seed).ok_or(UrlError::MissingDomain)?;
        Ok(Self::new(origin, config.same_origin_only).with_allowed(config.allowed_domains.iter()))
    }

    pub fn seed_origin(&self) -> &str {
        &self.seed_origin
    }

    /// True when `url` is an http(s) URL the crawl may follow
    pub fn contains(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        let Some(origin) = registrable_domain(url) else {
            return false;
        };
        if !self.same_origin_only {
            return true;
        }
        self.is_internal_origin(&origin)
    }

    /// True when `origin` is the seed's origin or an allowed one
    pub fn is_internal_origin(&self, origin: &str) -> bool {
        if origin == self.seed_origin {
            return true;
        }
        let host = origin.to_lowercase();
        self.allowed
            .iter()
            .any(|pattern| matches_domain_pattern(pattern, &host))
    }
}
