//! Round-robin proxy pool with passive health tracking
//!
//! The pool never probes proxies. Health is inferred from the outcomes the
//! fetch orchestrator reports through [`ProxyPool::mark_success`] and
//! [`ProxyPool::record_failure`].

use crate::config::{ProxyConfig, ProxyMode};
use crate::proxy::ban::ProxyBanManager;
use crate::proxy::masking::mask_optional_url;
use chrono::{DateTime, Duration, Local};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Endpoints of a selected proxy, handed to the fetch layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoints {
    pub name: String,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyEndpoints {
    /// Host of the proxy, used to reach a bypass service running beside it
    pub fn host(&self) -> Option<String> {
        [&self.https, &self.http]
            .into_iter()
            .flatten()
            .filter_map(|endpoint| Url::parse(endpoint).ok())
            .find_map(|url| url.host_str().map(str::to_string))
    }

    /// Endpoint recorded alongside a ban for reporting
    pub fn reporting_url(&self) -> Option<String> {
        self.http.clone().or_else(|| self.https.clone())
    }
}

/// Health and usage counters for one configured proxy
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    pub name: String,
    pub http_url: Option<String>,
    pub https_url: Option<String>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub available: bool,
    pub cooldown_until: Option<DateTime<Local>>,
    pub last_success: Option<DateTime<Local>>,
    pub last_failure: Option<DateTime<Local>>,
}

impl ProxyRecord {
    fn new(name: String, http_url: Option<String>, https_url: Option<String>) -> Self {
        Self {
            name,
            http_url,
            https_url,
            consecutive_failures: 0,
            total_requests: 0,
            successful_requests: 0,
            available: true,
            cooldown_until: None,
            last_success: None,
            last_failure: None,
        }
    }

    /// Returns true if the record's cooldown has not elapsed at `now`
    pub fn in_cooldown_at(&self, now: DateTime<Local>) -> bool {
        self.cooldown_until.map_or(false, |until| now < until)
    }

    /// A record can be handed out iff it is available and out of cooldown
    pub fn is_selectable_at(&self, now: DateTime<Local>) -> bool {
        self.available && !self.in_cooldown_at(now)
    }

    /// Successful requests over total requests, 0.0 when unused
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    fn endpoints(&self) -> ProxyEndpoints {
        ProxyEndpoints {
            name: self.name.clone(),
            http: self.http_url.clone(),
            https: self.https_url.clone(),
        }
    }
}

/// Result of reporting a failed request against the current proxy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FailureOutcome {
    /// A different selectable proxy is now current
    pub switched: bool,
    /// Name of the proxy this call put under a ban, if any
    pub newly_banned: Option<String>,
}

/// Per-proxy row of [`PoolStatistics`]
#[derive(Debug, Clone)]
pub struct ProxyStats {
    pub name: String,
    pub is_current: bool,
    pub is_available: bool,
    pub in_cooldown: bool,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub consecutive_failures: u32,
    pub success_rate: f64,
    pub last_success: Option<DateTime<Local>>,
    pub last_failure: Option<DateTime<Local>>,
}

/// Snapshot of pool health
#[derive(Debug, Clone)]
pub struct PoolStatistics {
    pub total_proxies: usize,
    pub available_proxies: usize,
    pub in_cooldown: usize,
    pub no_proxy_mode: bool,
    pub proxies: Vec<ProxyStats>,
}

struct PoolInner {
    proxies: Vec<ProxyRecord>,
    current_index: usize,
    no_proxy_mode: bool,
}

impl PoolInner {
    /// Returns cooled-down records to service
    fn release_cooldowns(&mut self, now: DateTime<Local>) {
        for proxy in self.proxies.iter_mut() {
            if !proxy.available && !proxy.in_cooldown_at(now) {
                proxy.available = true;
                tracing::info!("Proxy '{}' cooldown ended, available again", proxy.name);
            }
        }
    }

    /// Index of the first selectable record at `current_index + offset` for
    /// offsets in `offsets`, wrapping around the pool
    fn scan(&self, offsets: std::ops::Range<usize>, now: DateTime<Local>) -> Option<usize> {
        let len = self.proxies.len();
        offsets
            .map(|offset| (self.current_index + offset) % len)
            .find(|&idx| self.proxies[idx].is_selectable_at(now))
    }
}

/// Thread-safe pool of proxies
///
/// All mutation and scans happen under one mutex that is never held across
/// an await point.
pub struct ProxyPool {
    inner: Mutex<PoolInner>,
    cooldown_seconds: i64,
    max_failures_before_cooldown: u32,
    mode: ProxyMode,
    ban_manager: Arc<ProxyBanManager>,
}

impl ProxyPool {
    /// Creates an empty pool
    pub fn new(
        ban_manager: Arc<ProxyBanManager>,
        cooldown_seconds: i64,
        max_failures_before_cooldown: u32,
        mode: ProxyMode,
    ) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                proxies: Vec::new(),
                current_index: 0,
                no_proxy_mode: false,
            }),
            cooldown_seconds,
            max_failures_before_cooldown,
            mode,
            ban_manager,
        }
    }

    /// Builds a pool from configuration
    ///
    /// In `single` mode only the first configured entry is added.
    pub fn from_config(config: &ProxyConfig, ban_manager: Arc<ProxyBanManager>) -> Self {
        let pool = Self::new(
            ban_manager,
            config.cooldown_seconds,
            config.max_failures_before_cooldown,
            config.mode,
        );

        let limit = match config.mode {
            ProxyMode::Single => 1,
            ProxyMode::Pool => config.entries.len(),
        };

        for (i, entry) in config.entries.iter().take(limit).enumerate() {
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("Proxy-{}", i + 1));
            pool.add_proxy(entry.http.clone(), entry.https.clone(), Some(name));
        }

        tracing::info!(
            "Proxy pool ready in {:?} mode with {} of {} configured proxies",
            config.mode,
            pool.len(),
            config.entries.len()
        );
        pool
    }

    /// Adds a proxy to the end of the rotation
    ///
    /// Skipped, with a log line, when both endpoints are absent or when the
    /// name is currently banned. A missing name defaults to `Proxy-{n}`.
    pub fn add_proxy(&self, http_url: Option<String>, https_url: Option<String>, name: Option<String>) {
        if http_url.is_none() && https_url.is_none() {
            tracing::warn!("Attempted to add a proxy with no endpoints, skipping");
            return;
        }

        let name = name.unwrap_or_else(|| format!("Proxy-{}", self.len() + 1));

        if self.ban_manager.is_banned(&name) {
            tracing::warn!("Proxy '{}' is currently banned, skipping", name);
            return;
        }

        tracing::info!(
            "Added proxy '{}' (HTTP: {}, HTTPS: {})",
            name,
            mask_optional_url(http_url.as_deref()),
            mask_optional_url(https_url.as_deref())
        );
        self.lock()
            .proxies
            .push(ProxyRecord::new(name, http_url, https_url));
    }

    pub fn enable_no_proxy_mode(&self) {
        self.lock().no_proxy_mode = true;
        tracing::info!("No-proxy mode enabled, connecting directly");
    }

    pub fn disable_no_proxy_mode(&self) {
        self.lock().no_proxy_mode = false;
        tracing::info!("No-proxy mode disabled");
    }

    /// Returns the proxy at the rotation index, moving forward past records
    /// that are not selectable
    pub fn current_proxy(&self) -> Option<ProxyEndpoints> {
        self.current_proxy_at(Local::now())
    }

    pub fn current_proxy_at(&self, now: DateTime<Local>) -> Option<ProxyEndpoints> {
        let mut pool = self.lock();
        if pool.no_proxy_mode || pool.proxies.is_empty() {
            return None;
        }

        pool.release_cooldowns(now);
        let len = pool.proxies.len();
        match pool.scan(0..len, now) {
            Some(idx) => {
                pool.current_index = idx;
                Some(pool.proxies[idx].endpoints())
            }
            None => {
                tracing::warn!("All proxies are unavailable or in cooldown");
                None
            }
        }
    }

    /// Advances the rotation by at least one and returns the next selectable proxy
    pub fn next_proxy(&self) -> Option<ProxyEndpoints> {
        self.next_proxy_at(Local::now())
    }

    pub fn next_proxy_at(&self, now: DateTime<Local>) -> Option<ProxyEndpoints> {
        let mut pool = self.lock();
        if pool.no_proxy_mode || pool.proxies.is_empty() {
            return None;
        }

        pool.release_cooldowns(now);
        let len = pool.proxies.len();
        match pool.scan(1..len + 1, now) {
            Some(idx) => {
                pool.current_index = idx;
                tracing::debug!("Round-robin selected proxy '{}'", pool.proxies[idx].name);
                Some(pool.proxies[idx].endpoints())
            }
            None => {
                tracing::warn!("All proxies are unavailable or in cooldown");
                None
            }
        }
    }

    /// Name of the proxy at the rotation index
    pub fn current_proxy_name(&self) -> Option<String> {
        let pool = self.lock();
        if pool.no_proxy_mode {
            return None;
        }
        pool.proxies.get(pool.current_index).map(|p| p.name.clone())
    }

    /// Records a successful request on the current proxy
    pub fn mark_success(&self) {
        self.mark_success_at(Local::now());
    }

    pub fn mark_success_at(&self, now: DateTime<Local>) {
        let mut pool = self.lock();
        if pool.no_proxy_mode || pool.proxies.is_empty() {
            return;
        }

        let idx = pool.current_index;
        let proxy = &mut pool.proxies[idx];
        proxy.consecutive_failures = 0;
        proxy.cooldown_until = None;
        proxy.available = true;
        proxy.successful_requests += 1;
        proxy.total_requests += 1;
        proxy.last_success = Some(now);
        tracing::debug!(
            "Proxy '{}' succeeded (success rate: {:.1}%)",
            proxy.name,
            proxy.success_rate() * 100.0
        );
    }

    /// Records a failure on the current proxy and switches to the next
    /// selectable one; returns whether a switch happened
    pub fn mark_failure_and_switch(&self) -> bool {
        self.record_failure().switched
    }

    /// Like [`mark_failure_and_switch`](Self::mark_failure_and_switch) and
    /// also reports a ban issued by this call
    pub fn record_failure(&self) -> FailureOutcome {
        self.record_failure_at(Local::now())
    }

    pub fn record_failure_at(&self, now: DateTime<Local>) -> FailureOutcome {
        let mut pool = self.lock();
        if pool.no_proxy_mode || pool.proxies.is_empty() {
            return FailureOutcome::default();
        }

        let idx = pool.current_index;
        let mut outcome = FailureOutcome::default();
        {
            let proxy = &mut pool.proxies[idx];
            proxy.consecutive_failures += 1;
            proxy.total_requests += 1;
            proxy.last_failure = Some(now);

            if proxy.consecutive_failures >= self.max_failures_before_cooldown {
                self.ban_manager
                    .add_ban_at(&proxy.name, proxy.endpoints().reporting_url(), now);
                proxy.cooldown_until = Some(now + Duration::seconds(self.cooldown_seconds));
                proxy.available = false;
                outcome.newly_banned = Some(proxy.name.clone());
                tracing::warn!(
                    "Proxy '{}' reached {} failures, cooling down for {}s",
                    proxy.name,
                    proxy.consecutive_failures,
                    self.cooldown_seconds
                );
            } else {
                tracing::warn!(
                    "Proxy '{}' failed ({}/{})",
                    proxy.name,
                    proxy.consecutive_failures,
                    self.max_failures_before_cooldown
                );
            }
        }

        if self.mode == ProxyMode::Single {
            return outcome;
        }

        let len = pool.proxies.len();
        if let Some(target) = pool.scan(1..len, now) {
            tracing::info!(
                "Switched from '{}' to '{}'",
                pool.proxies[idx].name,
                pool.proxies[target].name
            );
            pool.current_index = target;
            outcome.switched = true;
        } else {
            tracing::error!("Failed to switch proxy: no other proxy is available");
        }
        outcome
    }

    /// Snapshot of the pool's health
    pub fn statistics(&self) -> PoolStatistics {
        self.statistics_at(Local::now())
    }

    pub fn statistics_at(&self, now: DateTime<Local>) -> PoolStatistics {
        let mut pool = self.lock();
        pool.release_cooldowns(now);

        let proxies: Vec<ProxyStats> = pool
            .proxies
            .iter()
            .enumerate()
            .map(|(i, proxy)| ProxyStats {
                name: proxy.name.clone(),
                is_current: i == pool.current_index,
                is_available: proxy.available,
                in_cooldown: proxy.in_cooldown_at(now),
                total_requests: proxy.total_requests,
                successful_requests: proxy.successful_requests,
                consecutive_failures: proxy.consecutive_failures,
                success_rate: proxy.success_rate(),
                last_success: proxy.last_success,
                last_failure: proxy.last_failure,
            })
            .collect();

        PoolStatistics {
            total_proxies: pool.proxies.len(),
            available_proxies: pool
                .proxies
                .iter()
                .filter(|p| p.is_selectable_at(now))
                .count(),
            in_cooldown: pool.proxies.iter().filter(|p| p.in_cooldown_at(now)).count(),
            no_proxy_mode: pool.no_proxy_mode,
            proxies,
        }
    }

    /// Number of proxies in the rotation
    pub fn len(&self) -> usize {
        self.lock().proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    pub fn ban_manager(&self) -> &Arc<ProxyBanManager> {
        &self.ban_manager
    }

    /// Summary of the ban ledger backing this pool
    pub fn ban_summary(&self, include_endpoint: bool) -> String {
        self.ban_manager.summary(include_endpoint)
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
