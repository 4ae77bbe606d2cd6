use std::collections::BTreeMap;

use serde::Deserialize;

/// Main configuration structure for newsgrab
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    /// Per-site extraction rules, keyed by site identifier
    #[serde(default)]
    pub sites: BTreeMap<String, SiteRules>,
}

impl Config {
    /// Looks up the extraction rules for a site identifier
    pub fn site(&self, id: &str) -> Option<&SiteRules> {
        self.sites.get(id)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent downloader workers
    pub downloaders: usize,

    /// Number of concurrent extractor workers
    pub extractors: usize,

    /// User-Agent header for HTTP requests
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory where the record file is written (created if absent)
    pub directory: String,
}

/// Extraction rules for a single site
///
/// Immutable after loading; the crawl shares one copy read-only across all
/// extractor workers.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteRules {
    /// Root URL the crawl is seeded with; discovered links resolve against it
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// URLs containing any of these substrings are never crawled
    #[serde(rename = "forbidden-prefixes", default)]
    pub forbidden_prefixes: Vec<String>,

    /// CSS selectors for the article fields
    pub selectors: SelectorSet,

    /// chrono format string the publish-time text must match
    #[serde(rename = "date-format")]
    pub date_format: String,

    /// Fixed UTC offset attached to parsed publish times, e.g. "+06:00"
    pub timezone: String,

    /// Image URL substituted when the image selector or attribute is missing
    #[serde(rename = "fallback-image")]
    pub fallback_image: String,
}

/// The four named selectors an article record is built from
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSet {
    #[serde(rename = "created-at")]
    pub created_at: String,
    pub title: String,
    pub description: String,
    pub image: String,
}
