//! HTTP fetching and the downloader worker pool
//!
//! Downloaders pull URLs from the frontier, fetch them, and hand successful
//! responses to the extractors via the page queue. Any non-200 status or
//! transport error drops the URL permanently: no retry, no requeue. The
//! crawl treats both failure kinds identically.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::CrawlerConfig;
use crate::state::{CrawlState, FetchedPage};

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 response with a body
    Success { status: u16, body: String },

    /// Response arrived but with a non-200 status
    HttpStatus { status: u16 },

    /// Transport-level failure (timeout, connection refused, TLS, ...)
    Transport { error: String },
}

/// Builds the HTTP client shared by all downloader workers
///
/// # Example
///
/// ```no_run
/// use newsgrab::config::CrawlerConfig;
/// use newsgrab::crawler::build_http_client;
///
/// let config = CrawlerConfig {
///     downloaders: 4,
///     extractors: 2,
///     user_agent: "newsgrab/0.1".to_string(),
///     timeout_secs: 30,
/// };
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a single URL
///
/// Transport errors and non-200 statuses are both returned as data, not as
/// `Err`: the downloader loop handles every outcome the same way and never
/// aborts the crawl over one URL.
pub async fn fetch_url(client: &Client, url: &str) -> FetchOutcome {
    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status != 200 {
                return FetchOutcome::HttpStatus { status };
            }
            match response.text().await {
                Ok(body) => FetchOutcome::Success { status, body },
                Err(e) => FetchOutcome::Transport {
                    error: e.to_string(),
                },
            }
        }
        Err(e) => FetchOutcome::Transport {
            error: e.to_string(),
        },
    }
}

/// Downloader worker loop
///
/// Exits when [`CrawlState::pop_url`] reports that no more work will arrive.
pub async fn run_downloader(id: usize, state: Arc<CrawlState>, client: Client) {
    tracing::info!(worker = id, "downloader started");

    while let Some(url) = state.pop_url().await {
        tracing::debug!(worker = id, %url, "downloading");

        match fetch_url(&client, url.as_str()).await {
            FetchOutcome::Success { status, body } => {
                let total = state.record_downloaded();
                tracing::info!(worker = id, %url, total, "downloaded");
                state.push_page(FetchedPage { url, status, body });
            }
            FetchOutcome::HttpStatus { status } => {
                tracing::warn!(worker = id, %url, status, "dropping URL: non-200 status");
            }
            FetchOutcome::Transport { error } => {
                tracing::warn!(worker = id, %url, %error, "dropping URL: fetch failed");
            }
        }

        state.finish_item();
    }

    tracing::info!(worker = id, "downloader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            downloaders: 1,
            extractors: 1,
            user_agent: "newsgrab-test/0.1".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let client = build_http_client(&test_config()).unwrap();
        let outcome = fetch_url(&client, &format!("{}/page", server.uri())).await;

        match outcome {
            FetchOutcome::Success { status, body } => {
                assert_eq!(status, 200);
                assert_eq!(body, "<html>hi</html>");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_non_200_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = build_http_client(&test_config()).unwrap();
        let outcome = fetch_url(&client, &format!("{}/gone", server.uri())).await;

        assert!(matches!(outcome, FetchOutcome::HttpStatus { status: 404 }));
    }

    #[tokio::test]
    async fn test_fetch_connection_error() {
        let client = build_http_client(&test_config()).unwrap();
        // Port 1 is never listening
        let outcome = fetch_url(&client, "http://127.0.0.1:1/").await;
        assert!(matches!(outcome, FetchOutcome::Transport { .. }));
    }
}
