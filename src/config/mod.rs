//! Configuration module for Catalog-Ripple
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file. All defaults live in `types.rs`.
//!
//! # Example
//!
//! ```no_run
//! use catalog_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling {} pages", config.crawler.end_page);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BypassConfig, ClassificationConfig, Config, CrawlerConfig, FetchConfig, HistoryBackendKind,
    HistoryConfig, ParserConfig, ProxyConfig, ProxyEntry, ProxyMode, SignatureConfig, SweepConfig,
    PROXY_MODULES,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
