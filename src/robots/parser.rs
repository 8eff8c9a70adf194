//! Robots.txt parser implementation
//!
//! Tokenizing is delegated to the robotstxt crate's callback parser; this
//! module collects the callbacks into user-agent groups and evaluates them.

use chrono::{DateTime, Utc};
use robotstxt::{parse_robotstxt, RobotsParseHandler};
use std::time::Duration;
use url::Url;

/// Longest `Crawl-delay` honoured, whatever the site asks for
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(10);

/// Where a policy came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// robots.txt was fetched and parsed
    Fetched,
    /// The server answered with a 4xx; nothing is restricted
    Missing { status: u16 },
    /// 5xx, timeout or network error; nothing is restricted
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Allow,
    Disallow,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RuleKind,
    pattern: String,
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

/// Parsed exclusion rules for one origin
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    groups: Vec<Group>,
    sitemaps: Vec<String>,
    source: PolicySource,
    fetched_at: DateTime<Utc>,
}

impl RobotsPolicy {
    /// Parses robots.txt content; unparseable lines are ignored
    pub fn from_content(content: &str) -> Self {
        let mut collector = GroupCollector::default();
        parse_robotstxt(content, &mut collector);
        collector.finish();

        Self {
            groups: collector.groups,
            sitemaps: collector.sitemaps,
            source: PolicySource::Fetched,
            fetched_at: Utc::now(),
        }
    }

    /// A policy that allows everything, recording why
    pub fn permissive(source: PolicySource) -> Self {
        Self {
            groups: Vec::new(),
            sitemaps: Vec::new(),
            source,
            fetched_at: Utc::now(),
        }
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.source, PolicySource::Unavailable { .. })
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Sitemap URLs declared with `Sitemap:` lines, in file order
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Checks whether `url` may be fetched by the crawler identified by `product_token`
    ///
    /// The most specific matching user-agent group applies, falling back to `*`.
    /// Within it the longest matching pattern wins and a disallow beats an allow
    /// of the same length.
    pub fn is_allowed(&self, url: &Url, product_token: &str) -> bool {
        let mut path = url.path().to_string();
        if path == "/robots.txt" {
            return true;
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let groups = self.select_groups(product_token);
        let mut best: Option<(usize, RuleKind)> = None;

        for rule in groups.iter().flat_map(|g| g.rules.iter()) {
            // Empty Disallow means allow everything
            if rule.pattern.is_empty() {
                continue;
            }
            if !pattern_matches(&rule.pattern, &path) {
                continue;
            }
            let len = rule.pattern.len();
            best = match best {
                Some((best_len, _)) if len > best_len => Some((len, rule.kind)),
                Some((best_len, RuleKind::Allow))
                    if len == best_len && rule.kind == RuleKind::Disallow =>
                {
                    Some((len, RuleKind::Disallow))
                }
                None => Some((len, rule.kind)),
                keep => keep,
            };
        }

        !matches!(best, Some((_, RuleKind::Disallow)))
    }

    /// `Crawl-delay` of the applicable group, capped at [`MAX_CRAWL_DELAY`]
    pub fn crawl_delay(&self, product_token: &str) -> Option<Duration> {
        self.select_groups(product_token)
            .iter()
            .find_map(|g| g.crawl_delay)
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(|secs| Duration::from_secs_f64(secs.min(MAX_CRAWL_DELAY.as_secs_f64())))
    }

    /// Groups naming the crawler's product token exactly, else the `*` groups
    fn select_groups(&self, crawler: &str) -> Vec<&Group> {
        let token = product_token(crawler);

        let named: Vec<&Group> = self
            .groups
            .iter()
            .filter(|g| !token.is_empty() && g.agents.iter().any(|a| *a == token))
            .collect();
        if !named.is_empty() {
            return named;
        }

        self.groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == "*"))
            .collect()
    }
}

/// Collects parser callbacks into groups
///
/// Consecutive `User-agent` lines share one group; the first rule line closes
/// the agent list so the next `User-agent` starts a new group.
#[derive(Default)]
struct GroupCollector {
    groups: Vec<Group>,
    sitemaps: Vec<String>,
    current: Option<Group>,
    seen_rule: bool,
}

impl GroupCollector {
    fn finish(&mut self) {
        if let Some(group) = self.current.take() {
            self.groups.push(group);
        }
    }

    fn push_rule(&mut self, kind: RuleKind, value: &str) {
        if let Some(group) = self.current.as_mut() {
            group.rules.push(Rule {
                kind,
                pattern: value.trim().to_string(),
            });
            self.seen_rule = true;
        }
    }
}

impl RobotsParseHandler for GroupCollector {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {
        self.finish();
    }

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if self.seen_rule {
            self.finish();
            self.seen_rule = false;
        }
        let token = product_token(user_agent);
        if token.is_empty() {
            return;
        }
        self.current.get_or_insert_with(Group::default).agents.push(token);
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        self.push_rule(RuleKind::Allow, value);
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        self.push_rule(RuleKind::Disallow, value);
    }

    fn handle_sitemap(&mut self, _line_num: u32, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.sitemaps.push(value.to_string());
        }
    }

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        if !action.trim().eq_ignore_ascii_case("crawl-delay") {
            return;
        }
        if let (Some(group), Ok(delay)) = (self.current.as_mut(), value.trim().parse::<f64>()) {
            group.crawl_delay = Some(delay);
            self.seen_rule = true;
        }
    }
}

/// Leading product token of a `User-agent` value, lowercased
fn product_token(value: &str) -> String {
    let value = value.trim();
    if value.starts_with('*') {
        return "*".to_string();
    }
    value
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Matches a robots pattern against a path, honouring `*` and a trailing `$`
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or("");
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    let rest: Vec<&str> = pieces.collect();

    if rest.is_empty() {
        return !anchored || pos == path.len();
    }

    for (i, piece) in rest.iter().enumerate() {
        let is_last = i == rest.len() - 1;
        if is_last && anchored {
            return path.len() >= pos + piece.len() && path.ends_with(piece);
        }
        match path[pos..].find(piece) {
            Some(found) => pos += found + piece.len(),
            None => return false,
        }
    }
    true
}
