//! Robots.txt caching implementation
//!
//! One policy per site root for the lifetime of a crawl. Loads are
//! single-flight: concurrent callers for the same site wait on one fetch.

use crate::robots::RobotsPolicy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type PolicyCell = Arc<OnceCell<Arc<RobotsPolicy>>>;

#[derive(Debug, Default)]
pub struct PolicyCache {
    entries: Mutex<HashMap<String, PolicyCell>>,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, site: &str) -> PolicyCell {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .entry(site.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Returns the cached policy for `site`, running `load` exactly once if absent
    pub async fn get_or_load<F, Fut>(&self, site: &str, load: F) -> Arc<RobotsPolicy>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RobotsPolicy>,
    {
        let cell = self.cell(site);
        cell.get_or_init(|| async { Arc::new(load().await) })
            .await
            .clone()
    }

    /// Returns the policy for `site` if it has already been loaded
    pub fn get(&self, site: &str) -> Option<Arc<RobotsPolicy>> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(site).and_then(|cell| cell.get().cloned())
    }

    /// Sites whose robots.txt could not be retrieved, sorted
    pub fn unavailable_sites(&self) -> Vec<String> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut sites: Vec<String> = entries
            .iter()
            .filter(|(_, cell)| cell.get().map_or(false, |p| p.is_unavailable()))
            .map(|(site, _)| site.clone())
            .collect();
        sites.sort();
        sites
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
