use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteRules};
use crate::ConfigError;
use chrono::FixedOffset;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;

    if config.sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [sites.<id>] table is required".to_string(),
        ));
    }
    for (id, rules) in &config.sites {
        validate_site_rules(id, rules)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.downloaders < 1 || config.downloaders > 64 {
        return Err(ConfigError::Validation(format!(
            "downloaders must be between 1 and 64, got {}",
            config.downloaders
        )));
    }

    if config.extractors < 1 || config.extractors > 64 {
        return Err(ConfigError::Validation(format!(
            "extractors must be between 1 and 64, got {}",
            config.extractors
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates a single site's extraction rules
///
/// Everything a worker would otherwise discover at crawl time is rejected
/// here instead: unparseable root URL, malformed CSS selectors, a timezone
/// chrono cannot represent, a fallback image that is not an absolute URL.
fn validate_site_rules(id: &str, rules: &SiteRules) -> Result<(), ConfigError> {
    let root = Url::parse(&rules.root_url).map_err(|e| {
        ConfigError::Validation(format!("site '{}': invalid root-url: {}", id, e))
    })?;
    if root.scheme() != "http" && root.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "site '{}': root-url must be http or https, got '{}'",
            id,
            root.scheme()
        )));
    }

    for prefix in &rules.forbidden_prefixes {
        if prefix.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}': forbidden-prefixes entries cannot be empty",
                id
            )));
        }
    }

    validate_selector(id, "created-at", &rules.selectors.created_at)?;
    validate_selector(id, "title", &rules.selectors.title)?;
    validate_selector(id, "description", &rules.selectors.description)?;
    validate_selector(id, "image", &rules.selectors.image)?;

    if rules.date_format.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "site '{}': date-format cannot be empty",
            id
        )));
    }

    rules.timezone.parse::<FixedOffset>().map_err(|_| {
        ConfigError::Validation(format!(
            "site '{}': timezone must be a fixed UTC offset like '+06:00', got '{}'",
            id, rules.timezone
        ))
    })?;

    Url::parse(&rules.fallback_image).map_err(|e| {
        ConfigError::Validation(format!("site '{}': invalid fallback-image: {}", id, e))
    })?;

    Ok(())
}

fn validate_selector(site: &str, field: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map_err(|e| {
        ConfigError::Validation(format!(
            "site '{}': invalid {} selector '{}': {:?}",
            site, field, selector, e
        ))
    })?;
    Ok(())
}
