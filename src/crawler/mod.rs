//! Crawler module for catalog traversal
//!
//! This module contains the crawl driver, including:
//! - Selector-based listing and detail page parsing
//! - Phase selection of listing entries
//! - Detail fetching, classification and history updates
//! - Overall crawl coordination

mod coordinator;
mod parser;

pub use coordinator::{run_crawl, CapturedEntry, Coordinator, PhaseReport, RunReport};
pub use parser::{extract_size, parse_score, CatalogEntry, DetailPage, PageParser, SelectorParser};
