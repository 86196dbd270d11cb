//! Page signature detection
//!
//! Recognizes challenge pages, bypass-service failures, consent gates and
//! legitimately empty listings from a response body.

use crate::config::SignatureConfig;
use scraper::{Html, Selector};
use url::Url;

/// Verdict on a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    /// Usable page carrying content
    Content,

    /// Valid page that says there is nothing to list
    Empty,

    /// Challenge page served instead of content
    Challenge,

    /// The bypass service could not solve the page
    BypassFailure,

    /// Consent gate without content behind it
    ConsentGate,

    /// Body shorter than the minimum content size
    TooSmall,
}

/// Matchers built from the `[signatures]` configuration section
#[derive(Debug, Clone)]
pub struct PageSignatures {
    challenge_marker: String,
    challenge_keyword: String,
    bypass_failure_keyword: String,
    bypass_failure_max_bytes: usize,
    consent_marker: String,
    consent_link_pattern: String,
    content_markers: Vec<String>,
    empty_markers: Vec<String>,
}

impl Default for PageSignatures {
    fn default() -> Self {
        Self::from_config(&SignatureConfig::default())
    }
}

impl PageSignatures {
    pub fn from_config(config: &SignatureConfig) -> Self {
        Self {
            challenge_marker: config.challenge_marker.clone(),
            challenge_keyword: config.challenge_keyword.to_lowercase(),
            bypass_failure_keyword: config.bypass_failure_keyword.to_lowercase(),
            bypass_failure_max_bytes: config.bypass_failure_max_bytes,
            consent_marker: config.consent_marker.clone(),
            consent_link_pattern: config.consent_link_pattern.clone(),
            content_markers: config.content_markers.clone(),
            empty_markers: config.empty_markers.clone(),
        }
    }

    /// Challenge marker present together with the challenge keyword (case-insensitive)
    pub fn is_challenge(&self, body: &str) -> bool {
        body.contains(&self.challenge_marker)
            && body.to_lowercase().contains(&self.challenge_keyword)
    }

    /// Short body mentioning the failure keyword (case-insensitive)
    pub fn is_bypass_failure(&self, body: &str) -> bool {
        body.len() < self.bypass_failure_max_bytes
            && body.to_lowercase().contains(&self.bypass_failure_keyword)
    }

    pub fn has_content(&self, body: &str) -> bool {
        self.content_markers.iter().any(|m| body.contains(m.as_str()))
    }

    pub fn is_valid_empty(&self, body: &str) -> bool {
        self.empty_markers.iter().any(|m| body.contains(m.as_str()))
    }

    /// Consent marker present with nothing behind it
    pub fn is_consent_gate(&self, body: &str) -> bool {
        body.contains(&self.consent_marker) && !self.has_content(body) && !self.is_valid_empty(body)
    }

    /// Classifies a body fetched in a mode with or without the bypass service
    ///
    /// The bypass-failure signature is only considered for bypass attempts.
    /// An empty-listing marker wins over the size limit.
    pub fn classify(&self, body: &str, via_bypass: bool, min_content_bytes: usize) -> PageVerdict {
        if via_bypass && self.is_bypass_failure(body) {
            return PageVerdict::BypassFailure;
        }
        if self.is_challenge(body) {
            return PageVerdict::Challenge;
        }
        if self.is_valid_empty(body) {
            return PageVerdict::Empty;
        }
        if self.is_consent_gate(body) {
            return PageVerdict::ConsentGate;
        }
        if body.len() < min_content_bytes {
            return PageVerdict::TooSmall;
        }
        PageVerdict::Content
    }

    /// First link whose `href` contains the consent pattern, made absolute
    ///
    /// # Arguments
    ///
    /// * `body` - The gated page
    /// * `base_url` - Catalog root used to resolve relative links
    ///
    /// # Returns
    ///
    /// The absolute consent URL, or `None` if the page has no such link
    pub fn consent_link(&self, body: &str, base_url: &str) -> Option<String> {
        let selector = Selector::parse("[href]").ok()?;
        let document = Html::parse_document(body);

        let href = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .find(|href| href.contains(&self.consent_link_pattern))?;

        if href.starts_with("http://") || href.starts_with("https://") {
            return Some(href.to_string());
        }

        let base = Url::parse(base_url).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }
}
