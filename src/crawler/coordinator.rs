//! Crawl coordinator
//!
//! Wires a run together: resolves the selected site's rules, opens the
//! output sink, seeds the frontier with the root URL, launches the
//! downloader and extractor pools, and waits for them to drain.
//!
//! Termination is cooperative. The shared state detects the drained
//! condition (both queues empty, nothing in flight) and signals every
//! worker; the coordinator only joins the tasks and reports the outcome.
//! There is no timeout and no forced cancellation; a crawl ends when the
//! reachable link graph is exhausted, or early if the output sink fails.

use std::path::Path;
use std::sync::Arc;

use chrono::FixedOffset;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::crawler::extractor::run_extractor;
use crate::crawler::fetcher::{build_http_client, run_downloader};
use crate::state::{CrawlPhase, CrawlState};
use crate::storage::RecordWriter;
use crate::url::normalize_root;
use crate::{ConfigError, CrawlError, Result};

/// Totals reported after a completed crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Pages fetched with a 200 response
    pub downloaded: u64,

    /// Records written to the output file
    pub parsed: u64,

    /// Distinct URLs scheduled over the run
    pub visited: usize,
}

/// Runs a crawl of the given site to completion
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `site_id` - Which `[sites.<id>]` rule table to crawl
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The crawl drained naturally
/// * `Err(CrawlError)` - Startup failed, or the output sink failed mid-run
pub async fn run_crawl(config: Config, site_id: &str) -> Result<CrawlSummary> {
    let rules = config
        .site(site_id)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownSite(site_id.to_string()))?;

    let root = normalize_root(&rules.root_url)?;
    let tz: FixedOffset = rules
        .timezone
        .parse()
        .map_err(|_| ConfigError::Validation(format!("invalid timezone '{}'", rules.timezone)))?;

    let writer = RecordWriter::create(Path::new(&config.output.directory))?;
    tracing::info!(site = site_id, output = %writer.path().display(), "output sink ready");

    let state = Arc::new(CrawlState::new(writer));
    let client = build_http_client(&config.crawler)?;
    let rules = Arc::new(rules);

    // Idle -> Seeded: the root URL enters the visited set and frontier
    state.push_urls(vec![root.clone()]);
    state.advance(CrawlPhase::Seeded);
    tracing::info!(site = site_id, %root, "frontier seeded");

    // Seeded -> Running: launch both pools
    let mut downloaders: Vec<JoinHandle<()>> = Vec::new();
    for id in 0..config.crawler.downloaders {
        downloaders.push(tokio::spawn(run_downloader(
            id,
            Arc::clone(&state),
            client.clone(),
        )));
    }

    let mut extractors: Vec<JoinHandle<Result<()>>> = Vec::new();
    for id in 0..config.crawler.extractors {
        extractors.push(tokio::spawn(run_extractor(
            id,
            Arc::clone(&state),
            Arc::clone(&rules),
            root.clone(),
            tz,
        )));
    }

    state.advance(CrawlPhase::Running);
    tracing::info!(
        downloaders = config.crawler.downloaders,
        extractors = config.crawler.extractors,
        "worker pools running"
    );

    // Running -> Draining happens inside the shared state when the last
    // in-flight item completes with both queues empty. Here we only wait.
    for handle in downloaders {
        handle.await?;
    }
    let mut failure: Option<CrawlError> = None;
    for handle in extractors {
        if let Err(e) = handle.await? {
            // First failure wins; the rest drained on the same stop signal
            failure.get_or_insert(e);
        }
    }

    state.advance(CrawlPhase::Stopped);

    if let Some(e) = failure {
        return Err(e);
    }

    let summary = CrawlSummary {
        downloaded: state.downloaded_total(),
        parsed: state.parsed_total(),
        visited: state.visited_count(),
    };
    tracing::info!(
        downloaded = summary.downloaded,
        parsed = summary.parsed,
        visited = summary.visited,
        "crawl complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlerConfig, OutputConfig, SelectorSet, SiteRules};
    use std::collections::BTreeMap;

    fn test_config(output_dir: &str) -> Config {
        let mut sites = BTreeMap::new();
        sites.insert(
            "example".to_string(),
            SiteRules {
                root_url: "https://news.example.test/".to_string(),
                forbidden_prefixes: vec![],
                selectors: SelectorSet {
                    created_at: "span.date".to_string(),
                    title: "h1".to_string(),
                    description: "div.body".to_string(),
                    image: "img.lead".to_string(),
                },
                date_format: "%d %B, %Y, %I:%M %p".to_string(),
                timezone: "+06:00".to_string(),
                fallback_image: "https://news.example.test/default.png".to_string(),
            },
        );
        Config {
            crawler: CrawlerConfig {
                downloaders: 1,
                extractors: 1,
                user_agent: "newsgrab-test/0.1".to_string(),
                timeout_secs: 5,
            },
            output: OutputConfig {
                directory: output_dir.to_string(),
            },
            sites,
        }
    }

    #[tokio::test]
    async fn test_unknown_site_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = test_config(tmp.path().to_str().unwrap());
        let result = run_crawl(config, "nosuch").await;
        assert!(matches!(
            result,
            Err(CrawlError::Config(ConfigError::UnknownSite(_)))
        ));
    }

    // Full crawl behavior is covered by the wiremock scenarios in
    // tests/crawl_tests.rs
}
