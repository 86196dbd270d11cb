use crate::config::types::{
    BypassConfig, Config, CrawlerConfig, FetchConfig, ParserConfig, ProxyConfig, ProxyEntry,
    ProxyMode, SweepConfig, PROXY_MODULES,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_bypass_config(&config.bypass)?;
    validate_proxy_config(&config.proxy)?;
    validate_parser_config(&config.parser)?;
    validate_sweep_config(&config.sweep)?;

    if config.history.max_records == 0 {
        return Err(ConfigError::Validation(
            "history max_records must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if !config.listing_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "listing_path must start with '/', got '{}'",
            config.listing_path
        )));
    }

    if config.start_page < 1 || config.end_page < config.start_page {
        return Err(ConfigError::Validation(format!(
            "page range must satisfy 1 <= start_page <= end_page, got {}..{}",
            config.start_page, config.end_page
        )));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_failures must be >= 1".to_string(),
        ));
    }

    if config.page_sleep == 0 || config.detail_sleep == 0 {
        tracing::warn!("Request pacing is disabled; the target may start blocking this crawler");
    }

    Ok(())
}

/// Validates fetch limits
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.direct_timeout == 0 || config.bypass_timeout == 0 || config.refresh_timeout == 0 {
        return Err(ConfigError::Validation(
            "fetch timeouts must be >= 1 second".to_string(),
        ));
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates bypass service settings
fn validate_bypass_config(config: &BypassConfig) -> Result<(), ConfigError> {
    if config.enabled && config.port == 0 {
        return Err(ConfigError::Validation(
            "bypass port must be non-zero when bypass is enabled".to_string(),
        ));
    }

    if config.host.is_empty() {
        return Err(ConfigError::Validation(
            "bypass host cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the proxy pool configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.max_failures_before_cooldown < 1 {
        return Err(ConfigError::Validation(
            "max_failures_before_cooldown must be >= 1".to_string(),
        ));
    }

    if config.cooldown_seconds < 0 {
        return Err(ConfigError::Validation(format!(
            "cooldown_seconds must be >= 0, got {}",
            config.cooldown_seconds
        )));
    }

    if let Some(unknown) = config
        .proxy_modules
        .iter()
        .find(|m| !PROXY_MODULES.contains(&m.as_str()))
    {
        return Err(ConfigError::Validation(format!(
            "Unknown proxy module '{}', expected one of {:?}",
            unknown, PROXY_MODULES
        )));
    }

    if config.mode == ProxyMode::Pool && config.entries.len() < 2 {
        tracing::warn!(
            "Proxy mode 'pool' with {} entries cannot fail over",
            config.entries.len()
        );
    }

    for entry in &config.entries {
        validate_proxy_entry(entry)?;
    }

    Ok(())
}

fn validate_proxy_entry(entry: &ProxyEntry) -> Result<(), ConfigError> {
    if entry.http.is_none() && entry.https.is_none() {
        return Err(ConfigError::Validation(format!(
            "Proxy '{}' has neither an http nor an https endpoint",
            entry.name.as_deref().unwrap_or("unnamed")
        )));
    }

    for endpoint in [&entry.http, &entry.https].into_iter().flatten() {
        let url = Url::parse(endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid endpoint for proxy '{}': {}",
                entry.name.as_deref().unwrap_or("unnamed"),
                e
            ))
        })?;
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Proxy endpoint has no host: {}",
                entry.name.as_deref().unwrap_or("unnamed")
            )));
        }
    }

    Ok(())
}

/// Validates every parser selector compiles
fn validate_parser_config(config: &ParserConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.listing_item,
        &config.listing_link,
        &config.listing_code,
        &config.listing_title,
        &config.listing_score,
        &config.listing_tag,
        &config.detail_code,
        &config.torrent_item,
        &config.torrent_link,
        &config.torrent_name,
        &config.torrent_size,
        &config.torrent_time,
        &config.torrent_tag,
    ] {
        validate_selector(selector)?;
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn validate_sweep_config(config: &SweepConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "sweep workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.size_threshold_ratio < 1.0 {
        return Err(ConfigError::Validation(format!(
            "size_threshold_ratio must be >= 1.0, got {}",
            config.size_threshold_ratio
        )));
    }

    Ok(())
}
