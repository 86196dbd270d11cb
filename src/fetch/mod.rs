//! Fetch module: page retrieval behind bot defenses
//!
//! This module contains everything between a URL and its page content:
//! - The `PageFetcher` primitive (one HTTP GET) and its reqwest implementation
//! - Page signature detection (challenges, bypass failures, consent gates)
//! - Bypass service request building
//! - The `FetchOrchestrator` escalation ladder

mod bypass;
mod http;
mod ladder;
mod signature;

pub use bypass::{BypassEndpoint, BypassRequest, MIRROR_HOST_HEADER, REFRESH_HEADER};
pub use http::{browser_headers, build_http_client, HttpFetcher};
pub use ladder::{FetchOrchestrator, FetchReport, RequestMode};
pub use signature::{PageSignatures, PageVerdict};

use crate::proxy::ProxyEndpoints;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single page request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Invalid proxy endpoint: {0}")]
    InvalidProxy(String),

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection failed for {url}")]
    Connect { url: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// One HTTP GET as issued by the orchestrator
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// Proxy to tunnel through; `None` for a direct connection
    pub proxy: Option<ProxyEndpoints>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The page-fetch primitive the orchestrator drives
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Issues one GET; non-success statuses are returned, not raised
    async fn fetch(&self, request: &FetchRequest) -> Result<PageResponse, FetchError>;
}
