use crate::config::types::{AnalyzerThresholds, CrawlConfig, RetryPolicy, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// This is the only place a crawl can be rejected outright; everything after
/// validation is recorded per URL instead of aborting.
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_seed(&config.seed)?;
    validate_limits(config)?;
    validate_retry_policy(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_thresholds(&config.analyzer)?;
    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }
    Ok(())
}

/// Validates the seed URL
fn validate_seed(seed: &str) -> Result<(), ConfigError> {
    if seed.trim().is_empty() {
        return Err(ConfigError::Validation("seed URL cannot be empty".to_string()));
    }

    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use HTTP or HTTPS",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

/// Validates crawl limits
fn validate_limits(config: &CrawlConfig) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_body_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_body_bytes must be > 0".to_string(),
        ));
    }

    if config.crawl_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "crawl_timeout_secs must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Length bounds must not be inverted
fn validate_thresholds(thresholds: &AnalyzerThresholds) -> Result<(), ConfigError> {
    if thresholds.title_min_length > thresholds.title_max_length {
        return Err(ConfigError::Validation(format!(
            "title-min-length ({}) exceeds title-max-length ({})",
            thresholds.title_min_length, thresholds.title_max_length
        )));
    }
    if thresholds.description_min_length > thresholds.description_max_length {
        return Err(ConfigError::Validation(format!(
            "description-min-length ({}) exceeds description-max-length ({})",
            thresholds.description_min_length, thresholds.description_max_length
        )));
    }
    Ok(())
}

/// Validates retry policy
fn validate_retry_policy(policy: &RetryPolicy) -> Result<(), ConfigError> {
    if policy.max_attempts < 1 || policy.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "retry max_attempts must be between 1 and 10, got {}",
            policy.max_attempts
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(domain)
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
