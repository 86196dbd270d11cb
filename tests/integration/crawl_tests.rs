//! Integration tests for the crawler
//!
//! These tests use wiremock to create a mock catalog and run the full
//! two-phase crawl end-to-end.

use crate::padded;
use catalog_ripple::config::{parse_config, Config};
use catalog_ripple::crawler::Coordinator;
use catalog_ripple::{CrawlError, HistoryStore, TorrentVariant};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"
<html><body>
<div class="movie-list">
  <div class="item">
    <a href="/v/abc1" class="box" title="First">
      <div class="video-title"><strong>ABC-123</strong> First Title</div>
      <div class="score"><span class="value">4.47分, 由595人評價</span></div>
      <div class="tags has-addons"><span class="tag">含中字磁鏈</span></div>
    </a>
  </div>
  <div class="item">
    <a href="/v/def2" class="box" title="Second">
      <div class="video-title"><strong>DEF-456</strong> Second Title</div>
      <div class="score"><span class="value">4.5分, 由200人評價</span></div>
    </a>
  </div>
  <div class="item">
    <a href="/v/low3" class="box" title="Third">
      <div class="video-title"><strong>LOW-789</strong> Third Title</div>
      <div class="score"><span class="value">2.1分, 由5人評價</span></div>
    </a>
  </div>
</div>
</body></html>
"#;

const EMPTY_LISTING: &str =
    r#"<html><body><div class="empty-message">No content yet</div></body></html>"#;

const DETAIL_ABC: &str = r#"
<html><body>
<div class="video-detail"><h2><strong class="current-title">ABC-123</strong></h2></div>
<div id="magnets-content">
  <div class="item columns">
    <div class="magnet-name"><a href="magnet:?xt=urn:btih:abcsub">
      <span class="name">ABC-123-C</span><span class="meta">5.47GB, 1個文件</span>
      <div class="tags"><span class="tag">字幕</span></div>
    </a></div>
    <div class="date"><span class="time">2024-03-01</span></div>
  </div>
  <div class="item columns">
    <div class="magnet-name"><a href="magnet:?xt=urn:btih:abchacked">
      <span class="name">ABC-123-UC</span><span class="meta">6.2GB, 1個文件</span>
    </a></div>
    <div class="date"><span class="time">2024-03-02</span></div>
  </div>
  <div class="item columns">
    <div class="magnet-name"><a href="magnet:?xt=urn:btih:abcplain">
      <span class="name">ABC-123</span><span class="meta">4.1GB, 1個文件</span>
    </a></div>
    <div class="date"><span class="time">2024-02-01</span></div>
  </div>
</div>
</body></html>
"#;

const DETAIL_DEF: &str = r#"
<html><body>
<div class="video-detail"><h2><strong class="current-title">DEF-456</strong></h2></div>
<div id="magnets-content">
  <div class="item columns">
    <div class="magnet-name"><a href="magnet:?xt=urn:btih:defplain">
      <span class="name">DEF-456</span><span class="meta">2.0GB</span>
    </a></div>
    <div class="date"><span class="time">2024-01-15</span></div>
  </div>
</div>
</body></html>
"#;

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(base_url: &str, history: &Path, end_page: u32) -> Config {
    let toml = format!(
        "[crawler]\nbase-url = \"{}\"\nend-page = {}\n\
         page-sleep = 0\ndetail-sleep = 0\nphase-transition-sleep = 0\n\
         session-cookie = \"over18=1\"\n\
         [fetch]\nfallback-cooldown = 0\nturnstile-cooldown = 0\n\
         [bypass]\nenabled = false\n\
         [history]\npath = \"{}\"\n",
        base_url,
        end_page,
        history.display()
    );
    parse_config(&toml).expect("valid test config")
}

async fn mount_page(server: &MockServer, route: &str, page: Option<&str>, body: String) {
    let mut mock = Mock::given(method("GET")).and(path(route));
    if let Some(page) = page {
        mock = mock.and(query_param("page", page));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer) {
    mount_page(server, "/", Some("1"), padded(LISTING)).await;
    mount_page(server, "/", Some("2"), EMPTY_LISTING.to_string()).await;

    Mock::given(method("GET"))
        .and(path("/v/abc1"))
        .and(header("cookie", "over18=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(padded(DETAIL_ABC)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v/def2"))
        .and(header("cookie", "over18=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(padded(DETAIL_DEF)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_two_phase_crawl() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let history_path = dir.path().join("history.csv");
    let config = create_test_config(&server.uri(), &history_path, 5);

    let mut coordinator = Coordinator::from_config(config.clone()).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.phases.len(), 2);

    let phase1 = &report.phases[0];
    assert_eq!(phase1.pages_fetched, 2);
    assert_eq!(phase1.entries_seen, 3);
    assert_eq!(phase1.entries_selected, 1);
    assert_eq!(phase1.captured.len(), 1);
    assert_eq!(phase1.captured[0].label, "ABC-123");
    assert!(phase1.captured[0].variants.contains(&TorrentVariant::Subtitle));
    assert!(phase1.captured[0].variants.contains(&TorrentVariant::NoSubtitle));
    assert!(phase1.captured[0]
        .variants
        .contains(&TorrentVariant::HackedWithSubtitle));

    let phase2 = &report.phases[1];
    assert_eq!(phase2.entries_selected, 1);
    assert_eq!(phase2.captured.len(), 1);
    assert_eq!(phase2.captured[0].label, "DEF-456");

    let mut history = HistoryStore::open(&config.history).unwrap();
    let entries = history.load(None);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["/v/abc1"].phase, 1);
    assert!(entries["/v/abc1"].links.subtitle.ends_with("magnet:?xt=urn:btih:abcsub"));
    assert_eq!(entries["/v/def2"].phase, 2);
    assert!(entries["/v/def2"].links.no_subtitle.ends_with("magnet:?xt=urn:btih:defplain"));
}

#[tokio::test]
async fn test_rerun_skips_complete_entries() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir.path().join("history.csv"), 5);

    let mut first = Coordinator::from_config(config.clone()).unwrap();
    assert_eq!(first.run().await.unwrap().captured(), 2);

    let mut second = Coordinator::from_config(config).unwrap();
    let report = second.run().await.unwrap();

    // Both preferred variants held: no detail request at all
    assert!(report.phases[0].captured.is_empty());
    assert_eq!(report.phases[0].skipped, 1);

    // Still missing preferred variants: refreshed, but not new
    assert_eq!(report.phases[1].captured.len(), 1);
    assert!(!report.phases[1].captured[0].is_new);
}

#[tokio::test]
async fn test_dry_run_writes_no_history() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let history_path = dir.path().join("history.csv");
    let config = create_test_config(&server.uri(), &history_path, 5);

    let mut coordinator = Coordinator::from_config(config).unwrap().with_dry_run(true);
    let report = coordinator.run().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.captured(), 2);
    assert!(!history_path.exists());
}

#[tokio::test]
async fn test_blocked_catalog_aborts_phase_after_tolerance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir.path().join("history.csv"), 10);

    let mut coordinator = Coordinator::from_config(config).unwrap();
    let report = coordinator.run_phases(&[1]).await.unwrap();

    assert_eq!(report.phases[0].pages_failed, 3);
    assert_eq!(report.phases[0].pages_fetched, 0);
}

#[tokio::test]
async fn test_proxy_ban_stops_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let toml = format!(
        "[crawler]\nbase-url = \"{}\"\nend-page = 3\nuse-proxy = true\n\
         page-sleep = 0\ndetail-sleep = 0\nphase-transition-sleep = 0\n\
         [fetch]\nfallback-cooldown = 0\nturnstile-cooldown = 0\n\
         [bypass]\nenabled = false\n\
         [history]\npath = \"{}\"\n\
         [proxy]\nmode = \"single\"\nmax-failures-before-cooldown = 1\nban-ledger = \"{}\"\n\
         [[proxy.entries]]\nname = \"edge\"\nhttp = \"{}\"\n",
        server.uri(),
        dir.path().join("history.csv").display(),
        dir.path().join("bans.csv").display(),
        server.uri()
    );
    let config = parse_config(&toml).unwrap();

    let mut coordinator = Coordinator::from_config(config).unwrap();
    let result = coordinator.run().await;

    assert!(matches!(
        result,
        Err(CrawlError::ProxyBanned { proxy_name }) if proxy_name == "edge"
    ));
    let pool = coordinator.orchestrator().pool().unwrap();
    assert!(pool.ban_manager().is_banned("edge"));
}
