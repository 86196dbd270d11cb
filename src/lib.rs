//! Catalog-Ripple: an incremental catalog crawler for hostile networks
//!
//! This crate crawls a paginated content catalog that sits behind rate
//! limiting, challenge pages and IP bans. It rotates a pool of proxies with
//! persistent ban bookkeeping, escalates blocked requests through a ladder of
//! fetch strategies, and keeps a history of captured variants so each run only
//! processes entries that can still gain something.

pub mod config;
pub mod crawler;
pub mod fetch;
pub mod history;
pub mod output;
pub mod proxy;
pub mod state;
pub mod storage;
pub mod sweep;

use thiserror::Error;

/// Main error type for Catalog-Ripple operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTML parse error for {url}: {message}")]
    HtmlParse { url: String, message: String },

    /// A proxy was banned during the run; the source identity is flagged
    #[error("Proxy '{proxy_name}' was banned during the run, stopping")]
    ProxyBanned { proxy_name: String },

    #[error("Sweep error: {0}")]
    Sweep(#[from] sweep::SweepError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Catalog-Ripple operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetch::{FetchOrchestrator, FetchReport, RequestMode};
pub use history::{HistoryStore, TorrentVariant, VariantSet};
pub use proxy::{ProxyBanManager, ProxyPool};
pub use state::{FetchMode, FetchOutcome, LadderState};
