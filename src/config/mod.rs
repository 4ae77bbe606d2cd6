//! Configuration module for newsgrab
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, including the per-site selector rule tables.
//!
//! # Example
//!
//! ```no_run
//! use newsgrab::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Sites configured: {}", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, SelectorSet, SiteRules};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
