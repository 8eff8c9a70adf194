//! Configuration module for Seo-Ripple
//!
//! This module handles loading, parsing, and validating crawl configuration,
//! either built in code from a seed URL or read from a TOML file.
//!
//! # Example
//!
//! ```no_run
//! use seo_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AnalyzerThresholds, CrawlConfig, RetryPolicy, UserAgentConfig};

// Re-export parser functions
pub use parser::{
    compute_config_hash, config_snapshot_hash, load_config, load_config_with_hash, read_config,
};
pub use validation::validate;
