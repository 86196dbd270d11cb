//! Fetch orchestrator and its escalation ladder
//!
//! A fetch starts in the requested mode and, while attempts fail, climbs the
//! ladder defined by [`LadderState::advance`]:
//!
//! | State | Attempt |
//! |-------|---------|
//! | `Initial` | requested mode |
//! | `RetrySameMode` | requested mode again |
//! | `ProxyDirectNoBypass` | direct through the current proxy (or none) |
//! | `ProxyBypass` | bypass service on the proxy host (or locally) |
//! | `SwitchProxy` | fail the proxy over, then climb again |
//! | `Exhausted` | give up, no content |
//!
//! Every failed step is followed by `fallback_cooldown`. A challenge page
//! additionally waits `turnstile_cooldown` and asks the bypass service to
//! drop its cached solution before the next step.

use crate::config::{BypassConfig, Config, FetchConfig, ProxyMode};
use crate::fetch::bypass::BypassEndpoint;
use crate::fetch::http::browser_headers;
use crate::fetch::signature::{PageSignatures, PageVerdict};
use crate::fetch::{FetchRequest, PageFetcher};
use crate::proxy::{mask_ip_address, ProxyEndpoints, ProxyPool};
use crate::state::{
    BlockKind, FailureReason, FetchAttempt, FetchMode, FetchOutcome, LadderContext, LadderState,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on proxy switches within one fetch
const MAX_PROXY_SWITCHES: usize = 5;

/// What the caller asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestMode {
    pub use_proxy: bool,
    pub use_bypass: bool,
    /// Send the configured session cookie on direct attempts
    pub use_cookie: bool,
}

impl RequestMode {
    pub fn new(use_proxy: bool, use_bypass: bool) -> Self {
        Self {
            use_proxy,
            use_bypass,
            use_cookie: false,
        }
    }

    pub fn with_cookie(mut self) -> Self {
        self.use_cookie = true;
        self
    }
}

/// Result of one orchestrated fetch
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Page content, `None` once the ladder is exhausted
    pub content: Option<String>,

    /// Every attempt in the order it was made
    pub attempts: Vec<FetchAttempt>,

    /// Proxies banned while this fetch was running
    pub banned_proxies: Vec<String>,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        self.content.is_some()
    }

    /// The attempt that produced the content
    pub fn winning_attempt(&self) -> Option<&FetchAttempt> {
        self.attempts.last().filter(|a| a.outcome.is_success())
    }
}

/// Executes requests and escalates them when they are blocked
pub struct FetchOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    pool: Option<Arc<ProxyPool>>,
    fetch: FetchConfig,
    bypass: BypassConfig,
    signatures: PageSignatures,
    base_url: String,
    session_cookie: Option<String>,
    bypass_failures: AtomicU32,
}

impl FetchOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The page-fetch primitive
    /// * `pool` - Proxy pool used when a request asks for a proxy
    /// * `config` - Loaded configuration
    pub fn new(fetcher: Arc<dyn PageFetcher>, pool: Option<Arc<ProxyPool>>, config: &Config) -> Self {
        Self {
            fetcher,
            pool,
            fetch: config.fetch.clone(),
            bypass: config.bypass.clone(),
            signatures: PageSignatures::from_config(&config.signatures),
            base_url: config.crawler.base_url.clone(),
            session_cookie: config.crawler.session_cookie.clone(),
            bypass_failures: AtomicU32::new(0),
        }
    }

    pub fn pool(&self) -> Option<&Arc<ProxyPool>> {
        self.pool.as_ref()
    }

    /// Consecutive failed bypass attempts across fetches
    pub fn bypass_failure_count(&self) -> u32 {
        self.bypass_failures.load(Ordering::Relaxed)
    }

    pub fn reset_bypass_state(&self) {
        self.bypass_failures.store(0, Ordering::Relaxed);
    }

    /// Fetches `url`, escalating through the ladder until content is found
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute target URL
    /// * `request` - Requested proxy/bypass combination
    ///
    /// # Returns
    ///
    /// A report with the content (or `None` once exhausted), every attempt
    /// made, and the proxies banned along the way.
    pub async fn fetch(&self, url: &str, request: RequestMode) -> FetchReport {
        let mut report = FetchReport::default();

        let pool = if request.use_proxy {
            self.pool.as_deref().filter(|p| !p.is_empty())
        } else {
            None
        };
        let mut proxy = pool.and_then(|p| match p.mode() {
            ProxyMode::Pool => p.next_proxy(),
            ProxyMode::Single => p.current_proxy(),
        });
        if request.use_proxy && proxy.is_none() {
            tracing::warn!("Proxy requested for {} but none is available, going without", url);
        }

        let switch_cap = match pool {
            Some(p) if p.mode() == ProxyMode::Pool && proxy.is_some() => {
                p.len().saturating_sub(1).min(MAX_PROXY_SWITCHES)
            }
            _ => 0,
        };
        let mut switches = 0;
        let mut proxy_failed_unrecorded = false;

        let mut ctx = LadderContext {
            initial_mode: FetchMode::from_flags(
                proxy.is_some(),
                request.use_bypass && self.bypass.enabled,
            ),
            bypass_enabled: self.bypass.enabled,
            has_proxy: proxy.is_some(),
            can_switch: switch_cap > 0,
            switched: false,
        };
        let mut state = LadderState::Initial;

        while !state.is_terminal() {
            ctx.has_proxy = proxy.is_some();
            ctx.can_switch = switches < switch_cap;

            if state == LadderState::SwitchProxy {
                let p = match pool {
                    Some(p) => p,
                    None => break,
                };
                let outcome = p.record_failure();
                proxy_failed_unrecorded = false;
                report.banned_proxies.extend(outcome.newly_banned);
                if !outcome.switched {
                    tracing::warn!("No proxy left to switch to for {}", url);
                    break;
                }
                proxy = p.current_proxy();
                if proxy.is_none() {
                    break;
                }
                switches += 1;
                ctx.switched = true;
                ctx.has_proxy = true;
                ctx.can_switch = switches < switch_cap;
                tracing::info!(
                    "Switched to proxy {} ({}/{})",
                    proxy.as_ref().map_or("None", |p| p.name.as_str()),
                    switches,
                    switch_cap
                );
                state = state.advance(&ctx);
                continue;
            }

            let mode = match state.mode(&ctx) {
                Some(mode) => mode,
                None => break,
            };
            let attempt_proxy = if mode.uses_proxy() { proxy.as_ref() } else { None };
            let (outcome, content) = self
                .attempt(url, mode, attempt_proxy, request.use_cookie)
                .await;

            tracing::debug!(
                "[{}] {} via {} (proxy {}): {}",
                state,
                url,
                mode,
                attempt_proxy.map_or("None", |p| p.name.as_str()),
                outcome
            );
            report.attempts.push(FetchAttempt {
                mode,
                state,
                proxy_name: attempt_proxy.map(|p| p.name.clone()),
                outcome: outcome.clone(),
            });

            if outcome.is_success() {
                if mode.uses_proxy() {
                    if let Some(p) = pool {
                        p.mark_success();
                    }
                }
                if mode.uses_bypass() {
                    self.reset_bypass_state();
                }
                report.content = content;
                return report;
            }

            if mode.uses_proxy() {
                proxy_failed_unrecorded = true;
            }
            if mode.uses_bypass() {
                self.note_bypass_failure();
            }
            if outcome.is_challenge() {
                tracing::info!(
                    "Challenge page for {}, waiting {}s before refreshing the bypass cache",
                    url,
                    self.fetch.turnstile_cooldown
                );
                sleep_secs(self.fetch.turnstile_cooldown).await;
                self.refresh_bypass_cache(url, attempt_proxy).await;
            }

            let next = state.advance(&ctx);
            if !next.is_terminal() {
                sleep_secs(self.fetch.fallback_cooldown).await;
            }
            state = next;
        }

        // The last proxy used gets its failure recorded once the ladder gives up
        if proxy_failed_unrecorded {
            if let Some(p) = pool {
                report.banned_proxies.extend(p.record_failure().newly_banned);
            }
        }

        tracing::error!(
            "All fetch strategies exhausted for {} after {} attempts",
            url,
            report.attempts.len()
        );
        report
    }

    /// Asks the bypass service to solve `url` afresh
    ///
    /// Returns true if the service answered with more than
    /// `min_content_bytes`.
    pub async fn refresh_bypass_cache(&self, url: &str, proxy: Option<&ProxyEndpoints>) -> bool {
        if !self.bypass.enabled {
            return false;
        }

        let host = proxy.and_then(|p| p.host());
        let endpoint = BypassEndpoint::for_host(&self.bypass, host.as_deref());
        let refresh = endpoint.refresh_request(url);
        let request = FetchRequest {
            url: refresh.url,
            proxy: None,
            headers: refresh.headers,
            timeout: Duration::from_secs(self.fetch.refresh_timeout),
        };

        tracing::debug!(
            "Refreshing bypass cache on {} for {}",
            mask_ip_address(endpoint.host()),
            url
        );

        match self.fetcher.fetch(&request).await {
            Ok(response) if response.body.len() > self.fetch.min_content_bytes => {
                tracing::debug!("Bypass cache refreshed ({} bytes)", response.body.len());
                true
            }
            Ok(response) => {
                tracing::warn!(
                    "Bypass cache refresh returned a small response ({} bytes)",
                    response.body.len()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Bypass cache refresh failed: {}", e);
                false
            }
        }
    }

    fn note_bypass_failure(&self) {
        let failures = self.bypass_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.bypass.max_failures {
            tracing::warn!(
                "Bypass service failed {} times in a row, it may be unhealthy",
                failures
            );
        }
    }

    /// One attempt in `mode`, consent gate included
    async fn attempt(
        &self,
        url: &str,
        mode: FetchMode,
        proxy: Option<&ProxyEndpoints>,
        use_cookie: bool,
    ) -> (FetchOutcome, Option<String>) {
        let body = match self.get(url, mode, proxy, use_cookie).await {
            Ok(body) => body,
            Err(reason) => return (FetchOutcome::Failed(reason), None),
        };

        match self.judge(&body, mode) {
            Ok(()) => (FetchOutcome::Success, Some(body)),
            Err(outcome) if outcome == FetchOutcome::Failed(FailureReason::ConsentGate) => {
                self.clear_consent_gate(url, &body, mode, proxy, use_cookie)
                    .await
            }
            Err(outcome) => (outcome, None),
        }
    }

    /// Follows the consent link through the same mode and asks again
    async fn clear_consent_gate(
        &self,
        url: &str,
        gated: &str,
        mode: FetchMode,
        proxy: Option<&ProxyEndpoints>,
        use_cookie: bool,
    ) -> (FetchOutcome, Option<String>) {
        let consent_url = match self.signatures.consent_link(gated, &self.base_url) {
            Some(link) => link,
            None => {
                tracing::warn!("Consent gate on {} without a consent link", url);
                return (FetchOutcome::Failed(FailureReason::ConsentGate), None);
            }
        };

        tracing::debug!("Consent gate on {}, following {}", url, consent_url);
        if let Err(reason) = self.get(&consent_url, mode, proxy, use_cookie).await {
            tracing::warn!("Consent link {} failed: {}", consent_url, reason);
            return (FetchOutcome::Failed(FailureReason::ConsentGate), None);
        }

        let body = match self.get(url, mode, proxy, use_cookie).await {
            Ok(body) => body,
            Err(reason) => return (FetchOutcome::Failed(reason), None),
        };
        match self.judge(&body, mode) {
            Ok(()) => (FetchOutcome::Success, Some(body)),
            Err(outcome) => (outcome, None),
        }
    }

    fn judge(&self, body: &str, mode: FetchMode) -> Result<(), FetchOutcome> {
        match self
            .signatures
            .classify(body, mode.uses_bypass(), self.fetch.min_content_bytes)
        {
            PageVerdict::Content | PageVerdict::Empty => Ok(()),
            PageVerdict::Challenge => Err(FetchOutcome::Blocked(BlockKind::Turnstile)),
            PageVerdict::BypassFailure => Err(FetchOutcome::Failed(FailureReason::BypassFailure)),
            PageVerdict::ConsentGate => Err(FetchOutcome::Failed(FailureReason::ConsentGate)),
            PageVerdict::TooSmall => Err(FetchOutcome::Failed(FailureReason::TooSmall(body.len()))),
        }
    }

    /// Issues one GET for `target` in `mode` and returns the body of a success
    async fn get(
        &self,
        target: &str,
        mode: FetchMode,
        proxy: Option<&ProxyEndpoints>,
        use_cookie: bool,
    ) -> Result<String, FailureReason> {
        let request = self.build_request(target, mode, proxy, use_cookie)?;
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| FailureReason::Network(e.to_string()))?;

        if !response.is_success() {
            return Err(FailureReason::HttpStatus(response.status));
        }
        Ok(response.body)
    }

    fn build_request(
        &self,
        target: &str,
        mode: FetchMode,
        proxy: Option<&ProxyEndpoints>,
        use_cookie: bool,
    ) -> Result<FetchRequest, FailureReason> {
        match mode {
            FetchMode::Direct | FetchMode::ProxyDirect => {
                let proxy = match mode {
                    FetchMode::ProxyDirect => Some(proxy.ok_or(FailureReason::NoProxy)?.clone()),
                    _ => None,
                };
                let mut headers = browser_headers(&self.fetch);
                if use_cookie {
                    if let Some(cookie) = &self.session_cookie {
                        headers.push(("Cookie".to_string(), cookie.clone()));
                    }
                }
                Ok(FetchRequest {
                    url: target.to_string(),
                    proxy,
                    headers,
                    timeout: Duration::from_secs(self.fetch.direct_timeout),
                })
            }
            FetchMode::BypassLocal | FetchMode::BypassViaProxy => {
                let host = match mode {
                    FetchMode::BypassViaProxy => Some(
                        proxy
                            .and_then(|p| p.host())
                            .ok_or(FailureReason::NoProxy)?,
                    ),
                    _ => None,
                };
                let endpoint = BypassEndpoint::for_host(&self.bypass, host.as_deref());
                let bypass = endpoint.request(target);
                Ok(FetchRequest {
                    url: bypass.url,
                    proxy: None,
                    headers: bypass.headers,
                    timeout: Duration::from_secs(self.fetch.bypass_timeout),
                })
            }
        }
    }
}

async fn sleep_secs(secs: u64) {
    if secs > 0 {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}
