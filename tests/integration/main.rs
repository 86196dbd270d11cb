//! Integration tests against mock HTTP servers

mod crawl_tests;
mod fetch_tests;

/// Pads a page past the minimum content size
pub fn padded(html: &str) -> String {
    format!("{}<!-- {} -->", html, "x".repeat(12_000))
}
