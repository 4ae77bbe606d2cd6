//! Shared state for crawl runs
//!
//! This module contains the state shared between all workers of a crawl:
//! the frontier, the visited set, the page queue, counters, and the crawl
//! lifecycle phase.

mod crawl_state;
mod phase;

pub use crawl_state::{CrawlState, FetchedPage};
pub use phase::CrawlPhase;
