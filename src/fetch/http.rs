//! HTTP fetcher implementation
//!
//! This module provides the reqwest-backed `PageFetcher`:
//! - One client per proxy, built lazily and reused
//! - Browser-like default headers
//! - Per-request timeouts
//! - Error classification into `FetchError`

use crate::config::FetchConfig;
use crate::fetch::{FetchError, FetchRequest, PageFetcher, PageResponse};
use crate::proxy::{mask_proxy_url, ProxyEndpoints};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Builds the browser-like header set sent on direct fetches
pub fn browser_headers(config: &FetchConfig) -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), config.user_agent.clone()),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
        ),
        ("Accept-Language".to_string(), config.accept_language.clone()),
        ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
        ("Sec-Fetch-Dest".to_string(), "document".to_string()),
        ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
        ("Sec-Fetch-Site".to_string(), "none".to_string()),
        ("Sec-Fetch-User".to_string(), "?1".to_string()),
        ("Cache-Control".to_string(), "max-age=0".to_string()),
    ]
}

/// Builds an HTTP client, optionally routed through a proxy
///
/// # Arguments
///
/// * `proxy` - Proxy endpoints to route through, if any
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError)` - Invalid proxy URL or client build failure
pub fn build_http_client(proxy: Option<&ProxyEndpoints>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .no_proxy()
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(endpoints) = proxy {
        if let Some(https) = &endpoints.https {
            let p = Proxy::https(https.as_str())
                .map_err(|_| FetchError::InvalidProxy(mask_proxy_url(https)))?;
            builder = builder.proxy(p);
        }
        if let Some(http) = &endpoints.http {
            let p = Proxy::http(http.as_str())
                .map_err(|_| FetchError::InvalidProxy(mask_proxy_url(http)))?;
            builder = builder.proxy(p);
        }
    }

    builder.build().map_err(FetchError::ClientBuild)
}

fn to_header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::debug!("Dropping invalid header {}", name),
        }
    }
    map
}

/// `PageFetcher` over reqwest
#[derive(Default)]
pub struct HttpFetcher {
    clients: Mutex<HashMap<String, Client>>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoints>) -> Result<Client, FetchError> {
        let key = proxy.map(|p| p.name.clone()).unwrap_or_default();
        let mut clients = self.clients.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        let client = build_http_client(proxy)?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PageResponse, FetchError> {
        let client = self.client_for(request.proxy.as_ref())?;

        let response = client
            .get(&request.url)
            .headers(to_header_map(&request.headers))
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        tracing::debug!(
            "GET {} -> HTTP {} ({} bytes)",
            request.url,
            status,
            body.len()
        );

        Ok(PageResponse { status, body })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            source: error,
        }
    }
}
