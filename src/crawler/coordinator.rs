//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the other subsystems
//! together:
//! - Walking the paginated listing with explicit pacing
//! - Selecting entries per phase
//! - Fetching and classifying detail pages
//! - Consulting and updating the history ledger
//! - Stopping the run when a proxy gets banned

use crate::config::Config;
use crate::crawler::parser::{CatalogEntry, PageParser, SelectorParser};
use crate::fetch::{FetchOrchestrator, FetchReport, HttpFetcher, PageFetcher, PageSignatures, RequestMode};
use crate::history::{
    determine_variants, has_complete_preferred, should_process, ClassificationRules, HistoryEntry,
    HistoryStore, VariantSet,
};
use crate::proxy::{ProxyBanManager, ProxyPool};
use crate::CrawlError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// `proxy-modules` name of listing page requests
const LISTING_MODULE: &str = "listing";

/// `proxy-modules` name of detail page requests
const DETAIL_MODULE: &str = "detail";

/// An entry whose variants were written to the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEntry {
    pub href: String,
    pub label: String,
    pub variants: VariantSet,
    /// First time this entry was captured
    pub is_new: bool,
}

/// Counters for one phase
#[derive(Debug, Clone, Default)]
pub struct PhaseReport {
    pub phase: u8,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub entries_seen: usize,
    pub entries_selected: usize,
    pub captured: Vec<CapturedEntry>,
    pub skipped: usize,
    pub failed_details: usize,
}

/// Counters for a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
    pub dry_run: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn pages_fetched(&self) -> usize {
        self.phases.iter().map(|p| p.pages_fetched).sum()
    }

    pub fn captured(&self) -> usize {
        self.phases.iter().map(|p| p.captured.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.phases.iter().map(|p| p.skipped).sum()
    }

    pub fn failed_details(&self) -> usize {
        self.phases.iter().map(|p| p.failed_details).sum()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    orchestrator: Arc<FetchOrchestrator>,
    parser: Box<dyn PageParser>,
    history: HistoryStore,
    rules: ClassificationRules,
    signatures: PageSignatures,
    dry_run: bool,
}

impl Coordinator {
    /// Creates a coordinator from already built parts
    pub fn new(
        config: Config,
        orchestrator: Arc<FetchOrchestrator>,
        parser: Box<dyn PageParser>,
        history: HistoryStore,
    ) -> Self {
        let rules = ClassificationRules::from_config(&config.classification);
        let signatures = PageSignatures::from_config(&config.signatures);
        Self {
            config: Arc::new(config),
            orchestrator,
            parser,
            history,
            rules,
            signatures,
            dry_run: false,
        }
    }

    /// Builds every collaborator from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - Invalid selectors or unopenable history ledger
    pub fn from_config(config: Config) -> Result<Self, CrawlError> {
        let bans = Arc::new(ProxyBanManager::new(config.proxy.ban_ledger.clone()));
        let pool = if config.proxy.entries.is_empty() {
            None
        } else {
            Some(Arc::new(ProxyPool::from_config(&config.proxy, bans)))
        };

        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new());
        let orchestrator = Arc::new(FetchOrchestrator::new(fetcher, pool, &config));
        let parser = Box::new(SelectorParser::from_config(&config.parser)?);
        let history = HistoryStore::open(&config.history)?;

        Ok(Self::new(config, orchestrator, parser, history))
    }

    /// Runs without writing to the history ledger
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.orchestrator
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Runs phase 1, waits, then runs phase 2
    pub async fn run(&mut self) -> Result<RunReport, CrawlError> {
        self.run_phases(&[1, 2]).await
    }

    /// Runs the given phases in order with the transition sleep between them
    pub async fn run_phases(&mut self, phases: &[u8]) -> Result<RunReport, CrawlError> {
        let start = Instant::now();
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..RunReport::default()
        };

        for (i, phase) in phases.iter().enumerate() {
            if i > 0 {
                tracing::info!(
                    "Waiting {}s before phase {}",
                    self.config.crawler.phase_transition_sleep,
                    phase
                );
                sleep_secs(self.config.crawler.phase_transition_sleep).await;
            }
            report.phases.push(self.run_phase(*phase).await?);
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            "Run completed: {} pages, {} captured, {} skipped, {} failed details in {:?}",
            report.pages_fetched(),
            report.captured(),
            report.skipped(),
            report.failed_details(),
            report.elapsed
        );
        Ok(report)
    }

    /// Crawls the configured listing range for one phase
    ///
    /// Phase 1 takes entries advertising subtitles, phase 2 the remaining
    /// entries that pass the rating and comment thresholds. The phase stops
    /// early on a valid empty listing page or after
    /// `max_consecutive_failures` failed or empty pages in a row. An entry
    /// listed on several pages is handled once per phase.
    pub async fn run_phase(&mut self, phase: u8) -> Result<PhaseReport, CrawlError> {
        let crawler = self.config.crawler.clone();
        let mut history = self.history.load(if phase == 1 { Some(1) } else { None });
        let mut handled: HashSet<String> = HashSet::new();
        let mut report = PhaseReport {
            phase,
            ..PhaseReport::default()
        };

        tracing::info!(
            "Phase {}: pages {}..={} of {}",
            phase,
            crawler.start_page,
            crawler.end_page,
            crawler.base_url
        );

        let mut consecutive_failures = 0;
        for page in crawler.start_page..=crawler.end_page {
            if page > crawler.start_page {
                sleep_secs(crawler.page_sleep).await;
            }

            let url = self.listing_url(page);
            let fetched = self
                .orchestrator
                .fetch(&url, self.request_mode(LISTING_MODULE))
                .await;
            check_bans(&fetched)?;

            let entries = match fetched.content {
                Some(html) => {
                    report.pages_fetched += 1;
                    match self.parser.parse_listing(&html) {
                        Ok(entries) if !entries.is_empty() => Some(entries),
                        Ok(_) if self.signatures.is_valid_empty(&html) => {
                            tracing::info!("Page {} is empty, end of listing", page);
                            break;
                        }
                        Ok(_) => {
                            tracing::warn!("No entries on page {}", page);
                            None
                        }
                        Err(message) => {
                            let e = CrawlError::HtmlParse { url: url.clone(), message };
                            tracing::warn!("{}", e);
                            None
                        }
                    }
                }
                None => {
                    tracing::error!("Failed to fetch listing page {}", page);
                    report.pages_failed += 1;
                    None
                }
            };

            let entries = match entries {
                Some(entries) => entries,
                None => {
                    consecutive_failures += 1;
                    if consecutive_failures >= crawler.max_consecutive_failures {
                        tracing::error!(
                            "{} consecutive listing pages failed, stopping phase {}",
                            consecutive_failures,
                            phase
                        );
                        break;
                    }
                    continue;
                }
            };
            consecutive_failures = 0;

            report.entries_seen += entries.len();
            let selected: Vec<CatalogEntry> = entries
                .into_iter()
                .filter(|e| self.selected_for_phase(e, phase))
                .collect();
            report.entries_selected += selected.len();
            tracing::info!("Page {}: {} entries selected for phase {}", page, selected.len(), phase);

            for entry in &selected {
                if !handled.insert(entry.href.clone()) {
                    tracing::debug!("{} already handled in phase {}", entry.href, phase);
                    report.skipped += 1;
                    continue;
                }
                self.process_entry(phase, entry, &mut history, &mut report).await?;
            }
        }

        tracing::info!(
            "Phase {} done: {} pages, {} captured, {} skipped, {} failed details",
            phase,
            report.pages_fetched,
            report.captured.len(),
            report.skipped,
            report.failed_details
        );
        Ok(report)
    }

    /// Fetches, classifies and records one selected entry
    async fn process_entry(
        &mut self,
        phase: u8,
        entry: &CatalogEntry,
        history: &mut HashMap<String, HistoryEntry>,
        report: &mut PhaseReport,
    ) -> Result<(), CrawlError> {
        if has_complete_preferred(&entry.href, history) {
            tracing::debug!("{} already has every preferred variant, skipping", entry.href);
            report.skipped += 1;
            return Ok(());
        }

        let detail_url = self.detail_url(&entry.href)?;
        let fetched = self
            .orchestrator
            .fetch(
                detail_url.as_str(),
                self.request_mode(DETAIL_MODULE).with_cookie(),
            )
            .await;
        let outcome = self.record_detail(phase, entry, history, fetched.content.as_deref(), report);
        check_bans(&fetched)?;
        sleep_secs(self.config.crawler.detail_sleep).await;
        outcome
    }

    fn record_detail(
        &mut self,
        phase: u8,
        entry: &CatalogEntry,
        history: &mut HashMap<String, HistoryEntry>,
        html: Option<&str>,
        report: &mut PhaseReport,
    ) -> Result<(), CrawlError> {
        let html = match html {
            Some(html) => html,
            None => {
                tracing::error!("Failed to fetch detail page {}", entry.href);
                report.failed_details += 1;
                return Ok(());
            }
        };

        let detail = match self.parser.parse_detail(html) {
            Ok(detail) => detail,
            Err(message) => {
                let e = CrawlError::HtmlParse {
                    url: entry.href.clone(),
                    message,
                };
                tracing::warn!("{}", e);
                report.failed_details += 1;
                return Ok(());
            }
        };

        let links = self.rules.classify(&detail.torrents);
        if links.is_empty() {
            tracing::debug!("{} has no usable torrents", entry.href);
            report.skipped += 1;
            return Ok(());
        }

        let current = determine_variants(&links);
        let (process, existing) = should_process(&entry.href, &*history, phase, &current);
        if !process {
            report.skipped += 1;
            return Ok(());
        }

        let label = if detail.label.is_empty() {
            entry.code.clone()
        } else {
            detail.label
        };

        if self.dry_run {
            tracing::info!("[dry run] Would record {} {:?}", label, current);
        } else {
            let saved = self.history.save(&entry.href, phase, &label, &links)?;
            history.insert(entry.href.clone(), saved);
            tracing::info!("Recorded {} {:?}", label, current);
        }

        report.captured.push(CapturedEntry {
            href: entry.href.clone(),
            label,
            variants: current,
            is_new: existing.is_none(),
        });
        Ok(())
    }

    fn selected_for_phase(&self, entry: &CatalogEntry, phase: u8) -> bool {
        match phase {
            1 => entry.has_subtitle,
            2 => {
                !entry.has_subtitle
                    && entry.rating.unwrap_or(0.0) >= self.config.crawler.phase2_min_rate
                    && entry.comments.unwrap_or(0) >= self.config.crawler.phase2_min_comments
            }
            _ => false,
        }
    }

    /// Requested mode for a request of kind `module`
    ///
    /// Proxies are used only when `use-proxy` is set and `proxy-modules`
    /// covers the module.
    fn request_mode(&self, module: &str) -> RequestMode {
        let use_proxy = self.config.crawler.use_proxy && self.config.proxy.proxies_module(module);
        RequestMode::new(use_proxy, self.config.crawler.use_bypass)
    }

    /// `{base_url}{listing_path}?page=N`
    pub fn listing_url(&self, page: u32) -> String {
        let crawler = &self.config.crawler;
        let separator = if crawler.listing_path.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}page={}",
            crawler.base_url.trim_end_matches('/'),
            crawler.listing_path,
            separator,
            page
        )
    }

    fn detail_url(&self, href: &str) -> Result<Url, CrawlError> {
        let base = Url::parse(&self.config.crawler.base_url)?;
        Ok(base.join(href)?)
    }
}

/// A proxy banned during a fetch ends the run
fn check_bans(report: &FetchReport) -> Result<(), CrawlError> {
    match report.banned_proxies.first() {
        Some(name) => {
            tracing::error!("Proxy '{}' was banned, stopping the run", name);
            Err(CrawlError::ProxyBanned {
                proxy_name: name.clone(),
            })
        }
        None => Ok(()),
    }
}

async fn sleep_secs(secs: u64) {
    if secs > 0 {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// Loads, builds and runs a full crawl
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `dry_run` - Skip history writes
pub async fn run_crawl(config: Config, dry_run: bool) -> Result<RunReport, CrawlError> {
    let mut coordinator = Coordinator::from_config(config)?.with_dry_run(dry_run);
    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::parser::DetailPage;
    use crate::fetch::{FetchError, FetchRequest, PageResponse};
    use crate::history::{TorrentCandidate, TorrentVariant};
    use crate::storage::CsvHistoryBackend;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Serves canned pages by URL
    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<PageResponse, FetchError> {
            match self.pages.get(&request.url) {
                Some(body) => Ok(PageResponse {
                    status: 200,
                    body: body.clone(),
                }),
                None => Ok(PageResponse {
                    status: 404,
                    body: String::new(),
                }),
            }
        }
    }

    /// Parser reading a tiny line format: listing lines `href|code|sub|rate|comments`,
    /// detail lines `link|name|tag`
    struct LineParser;

    impl PageParser for LineParser {
        fn parse_listing(&self, html: &str) -> Result<Vec<CatalogEntry>, String> {
            Ok(html
                .lines()
                .filter(|l| l.starts_with("entry|"))
                .map(|l| {
                    let f: Vec<&str> = l.split('|').collect();
                    CatalogEntry {
                        href: f[1].to_string(),
                        code: f[2].to_string(),
                        has_subtitle: f[3] == "sub",
                        rating: f[4].parse().ok(),
                        comments: f[5].parse().ok(),
                        ..CatalogEntry::default()
                    }
                })
                .collect())
        }

        fn parse_detail(&self, html: &str) -> Result<DetailPage, String> {
            let torrents: Vec<TorrentCandidate> = html
                .lines()
                .filter(|l| l.starts_with("torrent|"))
                .map(|l| {
                    let f: Vec<&str> = l.split('|').collect();
                    TorrentCandidate {
                        link: f[1].to_string(),
                        name: f[2].to_string(),
                        tags: vec![f[3].to_string()],
                        size: "1GB".to_string(),
                        timestamp: "2024-01-01".to_string(),
                    }
                })
                .collect();
            Ok(DetailPage {
                label: String::new(),
                torrents,
            })
        }
    }

    fn pad(body: &str) -> String {
        format!("{}\nmovie-list\n{}", body, "x".repeat(10_000))
    }

    fn coordinator(dir: &TempDir, pages: HashMap<String, String>, end_page: u32) -> Coordinator {
        coordinator_with(dir, pages, end_page, "")
    }

    fn coordinator_with(
        dir: &TempDir,
        pages: HashMap<String, String>,
        end_page: u32,
        extra: &str,
    ) -> Coordinator {
        let toml = format!(
            "[crawler]\nbase-url = \"https://catalog.example\"\nend-page = {}\n\
             page-sleep = 0\ndetail-sleep = 0\nphase-transition-sleep = 0\n{}\n\
             [fetch]\nfallback-cooldown = 0\nturnstile-cooldown = 0\n\
             [bypass]\nenabled = false\n",
            end_page, extra
        );
        let config = parse_config(&toml).unwrap();
        let fetcher: Arc<dyn PageFetcher> = Arc::new(MapFetcher { pages });
        let orchestrator = Arc::new(FetchOrchestrator::new(fetcher, None, &config));
        let backend = CsvHistoryBackend::new(&dir.path().join("history.csv"));
        let history = HistoryStore::new(Box::new(backend), 1000);
        Coordinator::new(config, orchestrator, Box::new(LineParser), history)
    }

    #[tokio::test]
    async fn test_phase1_records_subtitle_entries() {
        let dir = TempDir::new().unwrap();
        let pages = HashMap::from([
            (
                "https://catalog.example/?page=1".to_string(),
                pad("entry|/v/a|AAA-001|sub|4.5|200\nentry|/v/b|BBB-002|nosub|4.5|200"),
            ),
            (
                "https://catalog.example/v/a".to_string(),
                pad("torrent|magnet:?xt=a|AAA-001-C|字幕"),
            ),
        ]);
        let mut coordinator = coordinator(&dir, pages, 1);

        let report = coordinator.run_phase(1).await.unwrap();

        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.entries_seen, 2);
        assert_eq!(report.entries_selected, 1);
        assert_eq!(report.captured.len(), 1);
        assert_eq!(report.captured[0].label, "AAA-001");
        assert!(report.captured[0].variants.contains(&TorrentVariant::Subtitle));
        assert!(report.captured[0].is_new);

        let history = coordinator.history.load(None);
        assert!(!history["/v/a"].links.subtitle.is_empty());
    }

    #[tokio::test]
    async fn test_phase2_thresholds_and_missing_detail() {
        let dir = TempDir::new().unwrap();
        let pages = HashMap::from([(
            "https://catalog.example/?page=1".to_string(),
            pad("entry|/v/b|BBB-002|nosub|4.5|200\nentry|/v/c|CCC-003|nosub|3.0|500"),
        )]);
        let mut coordinator = coordinator(&dir, pages, 1);

        let report = coordinator.run_phase(2).await.unwrap();

        assert_eq!(report.entries_selected, 1);
        assert_eq!(report.failed_details, 1);
        assert!(report.captured.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_skips_captured_entries() {
        let dir = TempDir::new().unwrap();
        let pages = HashMap::from([
            (
                "https://catalog.example/?page=1".to_string(),
                pad("entry|/v/a|AAA-001|sub|4.5|200"),
            ),
            (
                "https://catalog.example/v/a".to_string(),
                pad("torrent|magnet:?xt=a|AAA-001-C|字幕\ntorrent|magnet:?xt=b|AAA-001-UC|字幕"),
            ),
        ]);
        let mut coordinator = coordinator(&dir, pages, 1);

        let first = coordinator.run_phase(1).await.unwrap();
        assert_eq!(first.captured.len(), 1);

        let second = coordinator.run_phase(1).await.unwrap();
        assert!(second.captured.is_empty());
        assert_eq!(second.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_pages_stop_phase() {
        let dir = TempDir::new().unwrap();
        let mut coordinator = coordinator(&dir, HashMap::new(), 10);

        let report = coordinator.run_phase(1).await.unwrap();

        assert_eq!(report.pages_failed, 3);
        assert_eq!(report.pages_fetched, 0);
    }

    #[tokio::test]
    async fn test_empty_listing_ends_phase() {
        let dir = TempDir::new().unwrap();
        let pages = HashMap::from([
            (
                "https://catalog.example/?page=1".to_string(),
                "<div class=\"empty-message\"></div>".to_string(),
            ),
            (
                "https://catalog.example/?page=2".to_string(),
                pad("entry|/v/a|AAA-001|sub|4.5|200"),
            ),
        ]);
        let mut coordinator = coordinator(&dir, pages, 2);

        let report = coordinator.run_phase(1).await.unwrap();

        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.entries_seen, 0);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_history_untouched() {
        let dir = TempDir::new().unwrap();
        let pages = HashMap::from([
            (
                "https://catalog.example/?page=1".to_string(),
                pad("entry|/v/a|AAA-001|sub|4.5|200"),
            ),
            (
                "https://catalog.example/v/a".to_string(),
                pad("torrent|magnet:?xt=a|AAA-001-C|字幕"),
            ),
        ]);
        let mut coordinator = coordinator(&dir, pages, 1).with_dry_run(true);

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.captured(), 1);
        assert!(coordinator.history.load(None).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_does_not_stop_run() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("history.csv"), [0xffu8, 0xfe, 0xfd, b'\n', 0x80]).unwrap();
        let pages = HashMap::from([
            (
                "https://catalog.example/?page=1".to_string(),
                pad("entry|/v/a|AAA-001|sub|4.5|200"),
            ),
            (
                "https://catalog.example/v/a".to_string(),
                pad("torrent|magnet:?xt=a|AAA-001-C|字幕"),
            ),
        ]);
        let mut coordinator = coordinator(&dir, pages, 1);

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.captured(), 1);
        assert!(report.phases[0].captured[0].is_new);
        assert!(coordinator.history.validate());
        assert_eq!(coordinator.history.load(None).len(), 1);
    }

    #[tokio::test]
    async fn test_entry_on_two_pages_is_handled_once() {
        let dir = TempDir::new().unwrap();
        let listing = pad("entry|/v/a|AAA-001|sub|4.5|200");
        let pages = HashMap::from([
            ("https://catalog.example/?page=1".to_string(), listing.clone()),
            ("https://catalog.example/?page=2".to_string(), listing),
            (
                "https://catalog.example/v/a".to_string(),
                pad("torrent|magnet:?xt=a|AAA-001-C|字幕"),
            ),
        ]);
        let mut coordinator = coordinator(&dir, pages, 2);

        let report = coordinator.run_phase(1).await.unwrap();

        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.entries_selected, 2);
        assert_eq!(report.captured.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_request_mode_follows_proxy_modules() {
        let dir = TempDir::new().unwrap();

        let all = coordinator_with(&dir, HashMap::new(), 1, "use-proxy = true");
        assert!(all.request_mode(LISTING_MODULE).use_proxy);
        assert!(all.request_mode(DETAIL_MODULE).use_proxy);

        let detail_only = coordinator_with(
            &dir,
            HashMap::new(),
            1,
            "use-proxy = true\n[proxy]\nproxy-modules = [\"detail\"]",
        );
        assert!(!detail_only.request_mode(LISTING_MODULE).use_proxy);
        assert!(detail_only.request_mode(DETAIL_MODULE).use_proxy);

        let none = coordinator_with(
            &dir,
            HashMap::new(),
            1,
            "use-proxy = true\n[proxy]\nproxy-modules = []",
        );
        assert!(!none.request_mode(DETAIL_MODULE).use_proxy);

        let disabled = coordinator(&dir, HashMap::new(), 1);
        assert!(!disabled.request_mode(DETAIL_MODULE).use_proxy);
    }

    #[test]
    fn test_listing_url() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(&dir, HashMap::new(), 1);
        assert_eq!(coordinator.listing_url(3), "https://catalog.example/?page=3");
    }

    #[test]
    fn test_check_bans() {
        let report = FetchReport {
            banned_proxies: vec!["A".to_string()],
            ..FetchReport::default()
        };
        assert!(matches!(
            check_bans(&report),
            Err(CrawlError::ProxyBanned { proxy_name }) if proxy_name == "A"
        ));
        assert!(check_bans(&FetchReport::default()).is_ok());
    }
}
