//! Extractor worker pool
//!
//! Extractors pull fetched pages off the page queue and do two independent
//! things with each one:
//!
//! 1. **Link discovery**: collect every crawlable same-site link and push
//!    the batch into the frontier (the shared state deduplicates).
//! 2. **Field extraction**: run the site's four selectors against the
//!    document and append an [`ExtractedRecord`] to the output file.
//!
//! A page whose fields cannot be extracted still contributes its links; the
//! two steps only share the parsed document. All extraction failures are
//! page-local. The one exception is an output-sink IO error, which aborts
//! the whole crawl: continuing would silently lose records.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use crate::config::SiteRules;
use crate::state::{CrawlState, FetchedPage};
use crate::storage::ExtractedRecord;
use crate::url::{is_forbidden, resolve_link, strip_to_path};

/// Why a page produced no record
///
/// All of these are recovered locally: the page is logged and skipped, the
/// crawl continues.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("selector for {field} matched no nodes")]
    SelectorMiss { field: &'static str },

    #[error("invalid {field} selector: {message}")]
    InvalidSelector {
        field: &'static str,
        message: String,
    },

    #[error("publish time '{raw}' does not match format '{format}'")]
    DateParse { raw: String, format: String },
}

/// Extractor worker loop
///
/// Exits when [`CrawlState::pop_page`] reports that no more work will
/// arrive. Returns an error only on output-sink failure, after requesting a
/// crawl-wide stop.
pub async fn run_extractor(
    id: usize,
    state: Arc<CrawlState>,
    rules: Arc<SiteRules>,
    root: Url,
    tz: FixedOffset,
) -> crate::Result<()> {
    tracing::info!(worker = id, "extractor started");

    while let Some(page) = state.pop_page().await {
        tracing::debug!(worker = id, url = %page.url, "extracting");

        let result = process_page(&state, &rules, &root, tz, &page);
        state.finish_item();
        if let Err(e) = result {
            tracing::error!(worker = id, error = %e, "output sink failed, aborting crawl");
            state.request_stop();
            return Err(e);
        }
    }

    tracing::info!(worker = id, "extractor stopped");
    Ok(())
}

/// Handles one fetched page: link discovery, then field extraction
///
/// Synchronous on purpose: the parsed document never crosses an await point,
/// so worker futures stay `Send`.
fn process_page(
    state: &CrawlState,
    rules: &SiteRules,
    root: &Url,
    tz: FixedOffset,
    page: &FetchedPage,
) -> crate::Result<()> {
    let document = Html::parse_document(&page.body);

    let links = discover_links(&document, root, &rules.forbidden_prefixes, state);
    if !links.is_empty() {
        let fresh = state.push_urls(links);
        tracing::debug!(url = %page.url, fresh, "discovered links");
    }

    match extract_record(&document, &page.url, rules, root, tz) {
        Ok(record) => {
            state.append_record(&record)?;
            let total = state.record_parsed();
            tracing::info!(url = %page.url, total, "record written");
        }
        Err(e) => {
            tracing::warn!(url = %page.url, reason = %e, "page skipped, no record");
        }
    }

    Ok(())
}

/// Collects the crawlable links of a document
///
/// A link survives if its href is a root-relative path, resolves and
/// normalizes against the site root, contains no forbidden prefix, is not
/// already in the visited set, and was not already collected from this page.
/// The returned batch goes through one `push_urls` call, whose atomic
/// check-and-insert is the real duplicate gate; the visited check here just
/// keeps already-seen URLs out of the batch.
fn discover_links(
    document: &Html,
    root: &Url,
    forbidden: &[String],
    state: &CrawlState,
) -> Vec<Url> {
    let mut candidates = Vec::new();
    let mut page_seen = HashSet::new();

    if let Ok(anchors) = Selector::parse("a[href]") {
        for element in document.select(&anchors) {
            let href = match element.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            let url = match resolve_link(root, href) {
                Ok(u) => u,
                Err(_) => continue,
            };
            if is_forbidden(&url, forbidden) {
                continue;
            }
            if state.is_visited(&url) {
                continue;
            }
            if !page_seen.insert(url.as_str().to_string()) {
                continue;
            }
            candidates.push(url);
        }
    }

    candidates
}

/// Builds the article record for a page
fn extract_record(
    document: &Html,
    page_url: &Url,
    rules: &SiteRules,
    root: &Url,
    tz: FixedOffset,
) -> Result<ExtractedRecord, ExtractError> {
    let created_raw = select_text(document, &rules.selectors.created_at, "created-at")?;
    let title = select_text(document, &rules.selectors.title, "title")?;
    let description = select_text(document, &rules.selectors.description, "description")?;
    let created_at = format_publish_time(&created_raw, &rules.date_format, tz)?;
    let image = extract_image(document, rules, root);

    Ok(ExtractedRecord {
        created_at,
        url: page_url.as_str().to_string(),
        title,
        description,
        image,
    })
}

/// First match of a selector, as trimmed printable-ASCII text
fn select_text(
    document: &Html,
    selector: &str,
    field: &'static str,
) -> Result<String, ExtractError> {
    let sel = Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        field,
        message: format!("{:?}", e),
    })?;
    let element = document
        .select(&sel)
        .next()
        .ok_or(ExtractError::SelectorMiss { field })?;
    let text: String = element.text().collect();
    Ok(sanitize_ascii(text.trim()))
}

/// Drops every character outside the printable-ASCII range
///
/// Deliberately lossy: source pages mix scripts, and the output schema wants
/// a restricted character set, not a transcoding.
fn sanitize_ascii(text: &str) -> String {
    text.chars().filter(|c| (' '..='~').contains(c)).collect()
}

/// Parses the publish-time text and formats it with the site's UTC offset
fn format_publish_time(
    raw: &str,
    format: &str,
    tz: FixedOffset,
) -> Result<String, ExtractError> {
    let date_err = || ExtractError::DateParse {
        raw: raw.to_string(),
        format: format.to_string(),
    };
    let naive = NaiveDateTime::parse_from_str(raw, format).map_err(|_| date_err())?;
    let stamped = tz.from_local_datetime(&naive).single().ok_or_else(date_err)?;
    Ok(stamped.format("%Y-%m-%dT%H:%M:%S%:z").to_string())
}

/// Resolves the lead image URL, falling back to the site's default
///
/// Reads the `data-src` attribute of the first image-selector match (the
/// sites these rules target lazy-load their lead images). A missing match,
/// missing attribute, or unresolvable value all yield the fallback; the
/// record itself is never abandoned over the image.
fn extract_image(document: &Html, rules: &SiteRules, root: &Url) -> String {
    let sel = match Selector::parse(&rules.selectors.image) {
        Ok(s) => s,
        Err(_) => return rules.fallback_image.clone(),
    };
    let src = document
        .select(&sel)
        .next()
        .and_then(|element| element.value().attr("data-src"));

    match src {
        Some(src) => {
            let src = sanitize_ascii(src.trim());
            resolve_image_url(&src, root).unwrap_or_else(|| rules.fallback_image.clone())
        }
        None => rules.fallback_image.clone(),
    }
}

fn resolve_image_url(src: &str, root: &Url) -> Option<String> {
    let mut url = match Url::parse(src) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => root.join(src).ok()?,
        Err(_) => return None,
    };
    strip_to_path(&mut url);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorSet;
    use crate::storage::RecordWriter;
    use tempfile::TempDir;

    fn test_rules() -> SiteRules {
        SiteRules {
            root_url: "https://site.test/".to_string(),
            forbidden_prefixes: vec!["/bangla/".to_string()],
            selectors: SelectorSet {
                created_at: "span.date".to_string(),
                title: "h1.title".to_string(),
                description: "div.body".to_string(),
                image: "img.lead".to_string(),
            },
            date_format: "%d %B, %Y, %I:%M %p".to_string(),
            timezone: "+06:00".to_string(),
            fallback_image: "https://site.test/default.png".to_string(),
        }
    }

    fn root() -> Url {
        Url::parse("https://site.test/").unwrap()
    }

    fn tz() -> FixedOffset {
        "+06:00".parse().unwrap()
    }

    fn test_state() -> (CrawlState, TempDir) {
        let tmp = TempDir::new().unwrap();
        let writer = RecordWriter::create(tmp.path()).unwrap();
        (CrawlState::new(writer), tmp)
    }

    const ARTICLE: &str = r#"
        <html><body>
            <span class="date">05 August, 2022, 01:30 PM</span>
            <h1 class="title">Budget  passes</h1>
            <div class="body">The budget passed today.</div>
            <img class="lead" data-src="https://site.test/img/lead.jpg?w=800#x" />
            <a href="/economy/1">More</a>
            <a href="/bangla/economy/1">Bangla</a>
            <a href="https://other.test/x">Offsite</a>
            <a href="/economy/1#comments">Dup after normalize</a>
        </body></html>
    "#;

    #[test]
    fn test_extract_full_record() {
        let doc = Html::parse_document(ARTICLE);
        let page_url = Url::parse("https://site.test/economy/0").unwrap();
        let record = extract_record(&doc, &page_url, &test_rules(), &root(), tz()).unwrap();

        assert_eq!(record.created_at, "2022-08-05T13:30:00+06:00");
        assert_eq!(record.url, "https://site.test/economy/0");
        assert_eq!(record.title, "Budget  passes");
        assert_eq!(record.description, "The budget passed today.");
        assert_eq!(record.image, "https://site.test/img/lead.jpg");
    }

    #[test]
    fn test_title_selector_miss_abandons_record() {
        let html = r#"<html><body>
            <span class="date">05 August, 2022, 01:30 PM</span>
            <div class="body">text</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let page_url = Url::parse("https://site.test/x").unwrap();
        let result = extract_record(&doc, &page_url, &test_rules(), &root(), tz());

        assert!(matches!(
            result,
            Err(ExtractError::SelectorMiss { field: "title" })
        ));
    }

    #[test]
    fn test_unparseable_date_abandons_record() {
        let html = r#"<html><body>
            <span class="date">sometime last week</span>
            <h1 class="title">t</h1>
            <div class="body">d</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let page_url = Url::parse("https://site.test/x").unwrap();
        let result = extract_record(&doc, &page_url, &test_rules(), &root(), tz());

        assert!(matches!(result, Err(ExtractError::DateParse { .. })));
    }

    #[test]
    fn test_missing_image_uses_fallback() {
        let html = r#"<html><body>
            <span class="date">05 August, 2022, 01:30 PM</span>
            <h1 class="title">t</h1>
            <div class="body">d</div>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let page_url = Url::parse("https://site.test/x").unwrap();
        let record = extract_record(&doc, &page_url, &test_rules(), &root(), tz()).unwrap();

        assert_eq!(record.image, "https://site.test/default.png");
    }

    #[test]
    fn test_image_without_data_src_uses_fallback() {
        let html = r#"<html><body>
            <span class="date">05 August, 2022, 01:30 PM</span>
            <h1 class="title">t</h1>
            <div class="body">d</div>
            <img class="lead" src="https://site.test/eager.jpg" />
        </body></html>"#;
        let doc = Html::parse_document(html);
        let page_url = Url::parse("https://site.test/x").unwrap();
        let record = extract_record(&doc, &page_url, &test_rules(), &root(), tz()).unwrap();

        assert_eq!(record.image, "https://site.test/default.png");
    }

    #[test]
    fn test_relative_image_resolves_against_root() {
        let html = r#"<html><body>
            <span class="date">05 August, 2022, 01:30 PM</span>
            <h1 class="title">t</h1>
            <div class="body">d</div>
            <img class="lead" data-src="/img/lead.jpg" />
        </body></html>"#;
        let doc = Html::parse_document(html);
        let page_url = Url::parse("https://site.test/x").unwrap();
        let record = extract_record(&doc, &page_url, &test_rules(), &root(), tz()).unwrap();

        assert_eq!(record.image, "https://site.test/img/lead.jpg");
    }

    #[test]
    fn test_sanitize_drops_non_ascii_and_controls() {
        assert_eq!(sanitize_ascii("বাজেট Budget\tpasses"), " Budgetpasses");
        assert_eq!(sanitize_ascii("plain text"), "plain text");
        assert_eq!(sanitize_ascii("৫০%"), "%");
    }

    #[test]
    fn test_format_publish_time() {
        let formatted =
            format_publish_time("05 August, 2022, 01:30 PM", "%d %B, %Y, %I:%M %p", tz()).unwrap();
        assert_eq!(formatted, "2022-08-05T13:30:00+06:00");
    }

    #[test]
    fn test_discover_links_filters_and_dedups() {
        let (state, _tmp) = test_state();
        let doc = Html::parse_document(ARTICLE);

        let links = discover_links(&doc, &root(), &["/bangla/".to_string()], &state);

        // Offsite and forbidden dropped; the two /economy/1 hrefs collapse
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].as_str(), "https://site.test/economy/1");
    }

    #[test]
    fn test_discover_links_skips_visited() {
        let (state, _tmp) = test_state();
        state.push_urls(vec![Url::parse("https://site.test/economy/1").unwrap()]);

        let doc = Html::parse_document(ARTICLE);
        let links = discover_links(&doc, &root(), &["/bangla/".to_string()], &state);
        assert!(links.is_empty());
    }

    #[test]
    fn test_selector_miss_still_discovers_links() {
        // No title node, but the link should still survive discovery
        let html = r#"<html><body>
            <a href="/economy/2">More</a>
        </body></html>"#;
        let (state, _tmp) = test_state();
        let doc = Html::parse_document(html);

        let links = discover_links(&doc, &root(), &[], &state);
        assert_eq!(links.len(), 1);

        let page_url = Url::parse("https://site.test/x").unwrap();
        assert!(extract_record(&doc, &page_url, &test_rules(), &root(), tz()).is_err());
    }
}
