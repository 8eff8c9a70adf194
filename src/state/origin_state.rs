use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-origin request bookkeeping used for politeness throttling
#[derive(Debug, Clone, Default)]
pub struct OriginState {
    /// Number of requests made to this origin in the current crawl
    pub request_count: u32,

    /// Earliest instant the next request to this origin may start
    pub next_slot: Option<Instant>,
}

impl OriginState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the next request slot and returns how long to wait for it
    ///
    /// The slot after this one is pushed `delay` further out, so concurrent
    /// workers targeting the same origin queue up instead of bursting.
    pub fn reserve(&mut self, delay: Duration, now: Instant) -> Duration {
        let slot = match self.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_slot = Some(slot + delay);
        self.request_count += 1;
        slot.saturating_duration_since(now)
    }
}

/// Throttle shared by all workers of one crawl
///
/// The lock is only held while a slot is computed; callers sleep afterwards.
#[derive(Debug, Default)]
pub struct OriginThrottle {
    origins: Mutex<HashMap<String, OriginState>>,
}

impl OriginThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a slot for `origin` spaced `delay` from the previous one
    pub fn reserve(&self, origin: &str, delay: Duration) -> Duration {
        let now = Instant::now();
        match self.origins.lock() {
            Ok(mut origins) => origins
                .entry(origin.to_string())
                .or_default()
                .reserve(delay, now),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(origin.to_string())
                .or_default()
                .reserve(delay, now),
        }
    }

    /// Waits until `origin` may be contacted again
    pub async fn wait_turn(&self, origin: &str, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        let wait = self.reserve(origin, delay);
        if !wait.is_zero() {
            tracing::trace!("Throttling {} for {:?}", origin, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests made so far to `origin`
    pub fn request_count(&self, origin: &str) -> u32 {
        self.origins
            .lock()
            .map(|origins| origins.get(origin).map_or(0, |s| s.request_count))
            .unwrap_or(0)
    }
}
