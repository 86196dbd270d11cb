use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Catalog-Ripple
///
/// Only `[crawler]` is required; every other section falls back to the
/// defaults declared in this file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub bypass: BypassConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub signatures: SignatureConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Crawl driver behavior and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Catalog root, e.g. `https://catalog.example`
    pub base_url: String,

    /// Path of the paginated listing, page number is appended as `?page=N`
    #[serde(default = "default_listing_path")]
    pub listing_path: String,

    #[serde(default = "default_start_page")]
    pub start_page: u32,

    #[serde(default = "default_start_page")]
    pub end_page: u32,

    /// Seconds to sleep between listing pages
    #[serde(default = "default_page_sleep")]
    pub page_sleep: u64,

    /// Seconds to sleep between detail pages
    #[serde(default = "default_detail_sleep")]
    pub detail_sleep: u64,

    /// Seconds to sleep between phase 1 and phase 2
    #[serde(default = "default_phase_transition_sleep")]
    pub phase_transition_sleep: u64,

    /// Consecutive failed or empty listing pages tolerated before a phase stops
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default = "default_phase2_min_rate")]
    pub phase2_min_rate: f32,

    #[serde(default = "default_phase2_min_comments")]
    pub phase2_min_comments: u32,

    /// `Cookie` header value (`name=value`) sent with detail page requests
    #[serde(default)]
    pub session_cookie: Option<String>,

    #[serde(default)]
    pub use_proxy: bool,

    #[serde(default)]
    pub use_bypass: bool,
}

/// Fetch primitive limits and ladder cooldowns
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    /// Bodies shorter than this are treated as truncated or placeholder pages
    pub min_content_bytes: usize,

    /// Timeout in seconds for plain fetches
    pub direct_timeout: u64,

    /// Timeout in seconds for bypass-service fetches
    pub bypass_timeout: u64,

    /// Timeout in seconds for bypass cache refreshes
    pub refresh_timeout: u64,

    /// Seconds to wait between ladder steps
    pub fallback_cooldown: u64,

    /// Seconds to wait after a challenge page before refreshing the bypass cache
    pub turnstile_cooldown: u64,

    pub user_agent: String,

    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_content_bytes: 10_000,
            direct_timeout: 30,
            bypass_timeout: 60,
            refresh_timeout: 120,
            fallback_cooldown: 30,
            turnstile_cooldown: 10,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "zh-TW,zh;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

/// Challenge-solving companion service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BypassConfig {
    pub enabled: bool,

    /// Host used when no proxy is in play
    pub host: String,

    pub port: u16,

    /// Consecutive bypass failures before warning that the service may be unhealthy
    pub max_failures: u32,

    /// Use the mirror form (`x-hostname` header) instead of `/html?url=`
    pub mirror: bool,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_failures: 3,
            mirror: false,
        }
    }
}

/// How configured proxies are used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Only the first configured proxy is ever used, no failover
    Single,
    /// Full rotation and failover
    Pool,
}

/// Proxy pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProxyConfig {
    pub mode: ProxyMode,

    /// Cooldown applied once a proxy reaches the failure limit
    pub cooldown_seconds: i64,

    pub max_failures_before_cooldown: u32,

    /// Ban ledger file
    pub ban_ledger: PathBuf,

    /// Request kinds routed through proxies: `all`, `listing`, `detail`
    pub proxy_modules: Vec<String>,

    pub entries: Vec<ProxyEntry>,
}

/// Names accepted in `proxy-modules`
pub const PROXY_MODULES: [&str; 3] = ["all", "listing", "detail"];

impl ProxyConfig {
    /// Whether requests of kind `module` may go through a proxy
    ///
    /// `all` covers every kind; an empty list keeps every request direct.
    pub fn proxies_module(&self, module: &str) -> bool {
        self.proxy_modules.iter().any(|m| m == "all" || m == module)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::Single,
            // one day longer than the ban itself
            cooldown_seconds: 8 * 24 * 3600,
            max_failures_before_cooldown: 3,
            ban_ledger: PathBuf::from("reports/proxy_bans.csv"),
            proxy_modules: vec!["all".to_string()],
            entries: Vec::new(),
        }
    }
}

/// A configured proxy
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub https: Option<String>,
}

/// History ledger backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackendKind {
    Csv,
    Sqlite,
}

/// History ledger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HistoryConfig {
    pub path: PathBuf,
    pub backend: HistoryBackendKind,
    pub max_records: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reports/parsed_movies_history.csv"),
            backend: HistoryBackendKind::Csv,
            max_records: 1000,
        }
    }
}

/// Markers used to classify fetched bodies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SignatureConfig {
    pub challenge_marker: String,
    pub challenge_keyword: String,
    pub bypass_failure_keyword: String,
    pub bypass_failure_max_bytes: usize,
    pub consent_marker: String,
    pub consent_link_pattern: String,
    /// Any of these means the page carries real catalog content
    pub content_markers: Vec<String>,
    /// Any of these means a legitimately empty listing
    pub empty_markers: Vec<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            challenge_marker: "Security Verification".to_string(),
            challenge_keyword: "turnstile".to_string(),
            bypass_failure_keyword: "fail".to_string(),
            bypass_failure_max_bytes: 1000,
            consent_marker: "modal is-active over18-modal".to_string(),
            consent_link_pattern: "over18".to_string(),
            content_markers: vec!["movie-list".to_string(), "video-detail".to_string()],
            empty_markers: vec!["empty-message".to_string()],
        }
    }
}

/// CSS selectors for the bundled page parser
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ParserConfig {
    pub listing_item: String,
    pub listing_link: String,
    pub listing_code: String,
    pub listing_title: String,
    pub listing_score: String,
    pub listing_tag: String,
    /// Listing tag text that marks an entry as carrying subtitles
    pub subtitle_tag_keywords: Vec<String>,
    pub detail_code: String,
    pub torrent_item: String,
    pub torrent_link: String,
    pub torrent_name: String,
    pub torrent_size: String,
    pub torrent_time: String,
    pub torrent_tag: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            listing_item: "div.movie-list div.item".to_string(),
            listing_link: "a".to_string(),
            listing_code: "div.video-title strong".to_string(),
            listing_title: "div.video-title".to_string(),
            listing_score: "div.score span.value".to_string(),
            listing_tag: "div.tags span.tag".to_string(),
            subtitle_tag_keywords: vec!["含中字磁鏈".to_string(), "CnSub DL".to_string()],
            detail_code: "div.video-detail strong.current-title".to_string(),
            torrent_item: "div#magnets-content div.item".to_string(),
            torrent_link: "div.magnet-name a".to_string(),
            torrent_name: "span.name".to_string(),
            torrent_size: "span.meta".to_string(),
            torrent_time: "span.time".to_string(),
            torrent_tag: "div.tags span.tag".to_string(),
        }
    }
}

/// Literal filename rules that sort torrents into variants
///
/// These follow one cataloging convention and are meant to be overridden
/// when another convention is in use.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClassificationConfig {
    /// Tag substrings that mark a subtitled torrent
    pub subtitle_tags: Vec<String>,
    /// Name substrings that mark a hacked torrent carrying subtitles
    pub hacked_subtitle_patterns: Vec<String>,
    /// Name substrings that mark a hacked torrent without subtitles
    pub hacked_patterns: Vec<String>,
    /// Name substring excluding a torrent from the plain subtitle category
    pub hacked_exclusion: String,
    /// Lowercase name substring preferred among plain torrents
    pub preferred_plain_pattern: String,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            subtitle_tags: vec!["字幕".to_string(), "Subtitle".to_string()],
            hacked_subtitle_patterns: vec![
                "-UC".to_string(),
                "-CU".to_string(),
                "-C.无码破解".to_string(),
                "-U-C".to_string(),
                "-C-U".to_string(),
            ],
            hacked_patterns: vec!["-U".to_string(), ".无码破解".to_string()],
            hacked_exclusion: ".无码破解".to_string(),
            preferred_plain_pattern: "4k".to_string(),
        }
    }
}

/// Storage dedup sweep configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SweepConfig {
    /// Maximum concurrent folder listings
    pub workers: usize,
    /// A no-subtitle copy this much larger than the subtitled one is kept
    pub size_threshold_ratio: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            size_threshold_ratio: 1.30,
        }
    }
}

fn default_listing_path() -> String {
    "/".to_string()
}

fn default_start_page() -> u32 {
    1
}

fn default_page_sleep() -> u64 {
    2
}

fn default_detail_sleep() -> u64 {
    5
}

fn default_phase_transition_sleep() -> u64 {
    30
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_phase2_min_rate() -> f32 {
    4.0
}

fn default_phase2_min_comments() -> u32 {
    100
}
