//! Pipeline state machines
//!
//! [`CrawlState`] is the discovery engine's mutable state object; [`ItemState`]
//! and [`RetryPolicy`] drive the extractor's retry/backoff decisions without
//! touching the network, so timing and terminal conditions are testable in
//! isolation.

mod crawl_state;
mod extract_state;

pub use crawl_state::CrawlState;
pub use extract_state::{ItemState, RetryPolicy};
