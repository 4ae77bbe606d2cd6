//! Newsgrab main entry point
//!
//! Command-line interface for the newsgrab single-site news crawler.

use clap::Parser;
use newsgrab::config::{load_config_with_hash, Config};
use newsgrab::crawler::run_crawl;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Newsgrab: a single-site news crawler
///
/// Newsgrab crawls one website from its root URL, extracts article fields
/// using the site's selector rules, and appends the records to a
/// newline-delimited JSON file.
#[derive(Parser, Debug)]
#[command(name = "newsgrab")]
#[command(version)]
#[command(about = "A single-site news crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Site identifier to crawl (may be omitted when only one is configured)
    #[arg(short, long)]
    site: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the site rules without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let site_id = select_site(&cli, &config)?;

    if cli.dry_run {
        handle_dry_run(&config, &site_id, &config_hash)?;
    } else {
        handle_crawl(config, &site_id).await?;
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("newsgrab=info,warn"),
            1 => EnvFilter::new("newsgrab=debug,info"),
            2 => EnvFilter::new("newsgrab=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves which site to crawl from the CLI flag and the configuration
fn select_site(cli: &Cli, config: &Config) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(site) = &cli.site {
        if config.site(site).is_none() {
            return Err(format!("no site named '{}' in configuration", site).into());
        }
        return Ok(site.clone());
    }

    let mut ids = config.sites.keys();
    match (ids.next(), ids.next()) {
        (Some(only), None) => Ok(only.clone()),
        _ => Err("multiple sites configured; pick one with --site".into()),
    }
}

/// Handles the --dry-run mode: shows the resolved site rules
fn handle_dry_run(
    config: &Config,
    site_id: &str,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let rules = config
        .site(site_id)
        .ok_or_else(|| format!("no site named '{}'", site_id))?;

    println!("=== Newsgrab Dry Run ===\n");

    println!("Config hash: {}", config_hash);

    println!("\nCrawler:");
    println!("  Downloader workers: {}", config.crawler.downloaders);
    println!("  Extractor workers: {}", config.crawler.extractors);
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Timeout: {}s", config.crawler.timeout_secs);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);

    println!("\nSite '{}':", site_id);
    println!("  Root URL: {}", rules.root_url);
    println!("  Forbidden prefixes ({}):", rules.forbidden_prefixes.len());
    for prefix in &rules.forbidden_prefixes {
        println!("    - {}", prefix);
    }
    println!("  Selectors:");
    println!("    created-at: {}", rules.selectors.created_at);
    println!("    title: {}", rules.selectors.title);
    println!("    description: {}", rules.selectors.description);
    println!("    image: {}", rules.selectors.image);
    println!("  Date format: {}", rules.date_format);
    println!("  Timezone: {}", rules.timezone);
    println!("  Fallback image: {}", rules.fallback_image);

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} starting at {}", site_id, rules.root_url);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, site_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting crawl of site '{}'", site_id);

    match run_crawl(config, site_id).await {
        Ok(summary) => {
            println!(
                "Crawl complete: {} pages downloaded, {} records written, {} URLs visited",
                summary.downloaded, summary.parsed, summary.visited
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
