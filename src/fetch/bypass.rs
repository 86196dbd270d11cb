//! Bypass service request building
//!
//! The bypass service solves challenge pages on behalf of the crawler. It is
//! reached at `http://{host}:{port}` where `host` is the proxy host when a
//! proxy is in play, so the solved page comes from the same egress address.

use crate::config::BypassConfig;
use url::Url;

/// Header asking the service to drop its cached solution
pub const REFRESH_HEADER: &str = "x-bypass-cache";

/// Header naming the target host in mirror form
pub const MIRROR_HOST_HEADER: &str = "x-hostname";

/// A resolved request against the bypass service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Builds bypass-service URLs for a given service host
#[derive(Debug, Clone)]
pub struct BypassEndpoint {
    host: String,
    port: u16,
    mirror: bool,
}

impl BypassEndpoint {
    pub fn new(host: impl Into<String>, port: u16, mirror: bool) -> Self {
        Self {
            host: host.into(),
            port,
            mirror,
        }
    }

    /// Endpoint on the proxy host, or on the configured local host without one
    pub fn for_host(config: &BypassConfig, proxy_host: Option<&str>) -> Self {
        let host = proxy_host.unwrap_or(config.host.as_str());
        Self::new(host, config.port, config.mirror)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// `GET {base}/html?url={percent-encoded target}`
    pub fn html_url(&self, target: &str) -> String {
        format!("{}/html?url={}", self.base(), urlencoding::encode(target))
    }

    /// Mirror form: the target's path and query on the service, plus the target host header
    ///
    /// Returns `None` when the target is not an absolute URL with a host.
    pub fn mirror_request(&self, target: &str) -> Option<BypassRequest> {
        let parsed = Url::parse(target).ok()?;
        let target_host = parsed.host_str()?.to_string();

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Some(BypassRequest {
            url: format!("{}{}", self.base(), path),
            headers: vec![(MIRROR_HOST_HEADER.to_string(), target_host)],
        })
    }

    /// Request for fetching `target` in the configured form
    pub fn request(&self, target: &str) -> BypassRequest {
        if self.mirror {
            if let Some(request) = self.mirror_request(target) {
                return request;
            }
            tracing::warn!("Cannot mirror {}, using html form", target);
        }
        BypassRequest {
            url: self.html_url(target),
            headers: Vec::new(),
        }
    }

    /// Same request with the cache-refresh header added
    pub fn refresh_request(&self, target: &str) -> BypassRequest {
        let mut request = self.request(target);
        request
            .headers
            .push((REFRESH_HEADER.to_string(), "true".to_string()));
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_url_encodes_target() {
        let endpoint = BypassEndpoint::new("127.0.0.1", 8000, false);
        assert_eq!(
            endpoint.html_url("https://catalog.example/v/abc?x=1"),
            "http://127.0.0.1:8000/html?url=https%3A%2F%2Fcatalog.example%2Fv%2Fabc%3Fx%3D1"
        );
    }

    #[test]
    fn test_for_host_prefers_proxy_host() {
        let config = BypassConfig::default();
        assert_eq!(BypassEndpoint::for_host(&config, Some("10.0.0.7")).host(), "10.0.0.7");
        assert_eq!(BypassEndpoint::for_host(&config, None).host(), "127.0.0.1");
    }

    #[test]
    fn test_mirror_request() {
        let endpoint = BypassEndpoint::new("10.0.0.7", 8000, true);
        let request = endpoint.request("https://catalog.example/?page=2");
        assert_eq!(request.url, "http://10.0.0.7:8000/?page=2");
        assert_eq!(
            request.headers,
            vec![("x-hostname".to_string(), "catalog.example".to_string())]
        );
    }

    #[test]
    fn test_refresh_request_adds_header() {
        let endpoint = BypassEndpoint::new("127.0.0.1", 8000, false);
        let request = endpoint.refresh_request("https://catalog.example/");
        assert!(request.url.contains("/html?url="));
        assert_eq!(
            request.headers,
            vec![("x-bypass-cache".to_string(), "true".to_string())]
        );
    }
}
