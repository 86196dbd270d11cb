//! HTTP fetcher and bypass service contract tests
//!
//! These tests use wiremock to stand in for both the catalog and the
//! bypass service.

use crate::padded;
use catalog_ripple::config::{parse_config, Config};
use catalog_ripple::fetch::{
    BypassEndpoint, FetchError, FetchOrchestrator, FetchRequest, HttpFetcher, PageFetcher,
    RequestMode,
};
use catalog_ripple::state::{FetchMode, LadderState};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTENT: &str = "<html><body><div class=\"movie-list\"></div></body></html>";

fn request(url: String) -> FetchRequest {
    FetchRequest {
        url,
        proxy: None,
        headers: vec![("User-Agent".to_string(), "TestAgent/1.0".to_string())],
        timeout: Duration::from_secs(5),
    }
}

/// Config whose bypass service is the mock server
fn bypass_config(server: &MockServer, mirror: bool) -> Config {
    let port = server.address().port();
    let toml = format!(
        "[crawler]\nbase-url = \"https://catalog.example\"\n\
         [fetch]\nfallback-cooldown = 0\nturnstile-cooldown = 0\n\
         [bypass]\nenabled = true\nhost = \"127.0.0.1\"\nport = {}\nmirror = {}\n",
        port, mirror
    );
    parse_config(&toml).expect("valid test config")
}

#[tokio::test]
async fn test_http_fetcher_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new();
    let response = fetcher
        .fetch(&request(format!("{}/page", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");
    assert!(response.is_success());
}

#[tokio::test]
async fn test_http_fetcher_returns_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new();
    let response = fetcher
        .fetch(&request(format!("{}/blocked", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status, 403);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_http_fetcher_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new();
    let mut slow = request(format!("{}/slow", server.uri()));
    slow.timeout = Duration::from_millis(200);

    let result = fetcher.fetch(&slow).await;

    assert!(matches!(result, Err(FetchError::Timeout { .. })));
}

#[tokio::test]
async fn test_ladder_reaches_bypass_service() {
    let server = MockServer::start().await;
    let target = format!("{}/list", server.uri());

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .and(query_param("url", target.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(padded(CONTENT)))
        .expect(1)
        .mount(&server)
        .await;

    let config = bypass_config(&server, false);
    let orchestrator = FetchOrchestrator::new(Arc::new(HttpFetcher::new()), None, &config);

    let report = orchestrator
        .fetch(&target, RequestMode::new(false, false))
        .await;

    assert!(report.is_success());
    let winner = report.winning_attempt().unwrap();
    assert_eq!(winner.state, LadderState::ProxyBypass);
    assert_eq!(winner.mode, FetchMode::BypassLocal);
}

#[tokio::test]
async fn test_refresh_bypass_cache_contract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .and(query_param("url", "https://catalog.example/big"))
        .and(header("x-bypass-cache", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(padded(CONTENT)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .and(query_param("url", "https://catalog.example/small"))
        .and(header("x-bypass-cache", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONTENT))
        .mount(&server)
        .await;

    let config = bypass_config(&server, false);
    let orchestrator = FetchOrchestrator::new(Arc::new(HttpFetcher::new()), None, &config);

    assert!(
        orchestrator
            .refresh_bypass_cache("https://catalog.example/big", None)
            .await
    );
    assert!(
        !orchestrator
            .refresh_bypass_cache("https://catalog.example/small", None)
            .await
    );
}

#[tokio::test]
async fn test_mirror_form_sends_target_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/abc"))
        .and(query_param("x", "1"))
        .and(header("x-hostname", "catalog.example"))
        .respond_with(ResponseTemplate::new(200).set_body_string("mirrored"))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = BypassEndpoint::new("127.0.0.1", server.address().port(), true);
    let bypass = endpoint.request("https://catalog.example/v/abc?x=1");

    let fetcher = HttpFetcher::new();
    let response = fetcher
        .fetch(&FetchRequest {
            url: bypass.url,
            proxy: None,
            headers: bypass.headers,
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();

    assert_eq!(response.body, "mirrored");
}
