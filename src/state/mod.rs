//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlState`: Lifecycle of a single URL (discovered, enqueued, fetching, terminal)
//! - `OriginThrottle`: Per-origin request spacing shared by all workers

mod origin_state;
mod url_state;

// Re-export main types
pub use origin_state::{OriginState, OriginThrottle};
pub use url_state::UrlState;
