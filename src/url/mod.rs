//! URL handling for the crawl
//!
//! Discovered hrefs go through three steps before they are allowed near the
//! frontier: resolve against the site root, strip down to a path-only URL,
//! and check the forbidden-prefix list. The stripped string form is also the
//! visited-set key, so every URL must take the same path through here.

use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a discovered href against the site root URL
///
/// Only root-relative paths (`/news/123`) are crawlable: anything else is an
/// off-site or non-navigational link. Protocol-relative hrefs (`//host/x`)
/// would resolve to a different host, so they are rejected with the rest.
///
/// The result is normalized with [`strip_to_path`]: query and fragment are
/// removed, keeping only scheme, host, and path.
///
/// # Examples
///
/// ```
/// use newsgrab::url::resolve_link;
/// use url::Url;
///
/// let root = Url::parse("https://site.test/").unwrap();
/// let url = resolve_link(&root, "/news/123?ref=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://site.test/news/123");
/// ```
pub fn resolve_link(root: &Url, href: &str) -> UrlResult<Url> {
    let href = href.trim();

    if !href.starts_with('/') || href.starts_with("//") {
        return Err(UrlError::NotRootRelative(href.to_string()));
    }

    let mut url = root
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
    strip_to_path(&mut url);
    Ok(url)
}

/// Normalizes a URL in place to its path-only form
///
/// Removes the query string and fragment. Applied to every crawl target,
/// including the seed, so visited-set comparisons are exact string matches.
pub fn strip_to_path(url: &mut Url) {
    url.set_query(None);
    url.set_fragment(None);
}

/// Parses and normalizes the configured root URL into the crawl seed
pub fn normalize_root(root_url: &str) -> UrlResult<Url> {
    let mut url = Url::parse(root_url).map_err(|e| UrlError::Parse(format!("{}: {}", root_url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    strip_to_path(&mut url);
    Ok(url)
}

/// Returns true if the URL contains any of the forbidden prefixes
///
/// Substring match over the full URL string, as the rule tables describe
/// site sections by path fragments like `/bangla/`.
pub fn is_forbidden(url: &Url, prefixes: &[String]) -> bool {
    let s = url.as_str();
    prefixes.iter().any(|p| s.contains(p.as_str()))
}
