//! Crawler module - the download/extract pipeline
//!
//! This module contains the two worker pools and the coordinator that runs
//! them:
//!
//! - [`fetcher`] - HTTP client construction, fetch outcomes, and the
//!   downloader worker loop
//! - [`extractor`] - link discovery, selector-driven field extraction, and
//!   the extractor worker loop
//! - [`coordinator`] - seeding, pool startup, and drain/join handling

pub mod coordinator;
pub mod extractor;
pub mod fetcher;

pub use coordinator::{run_crawl, CrawlSummary};
pub use extractor::ExtractError;
pub use fetcher::{build_http_client, fetch_url, FetchOutcome};
