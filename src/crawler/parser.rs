//! HTML parser for catalog listing and detail pages
//!
//! The crawl driver only depends on the `PageParser` trait. This module
//! ships one implementation, `SelectorParser`, driven by the CSS selectors
//! of the `[parser]` configuration section.

use crate::config::ParserConfig;
use crate::history::{TorrentCandidate, SIZE_RE};
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*分").expect("rating pattern compiles"));
static COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"由\s*(\d+)\s*人").expect("comments pattern compiles"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern compiles"));

/// One entry of a listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogEntry {
    /// Link to the detail page, as found in the listing
    pub href: String,

    /// Entity code, e.g. `ABC-123`; empty when the listing shows none
    pub code: String,

    pub title: String,

    pub rating: Option<f32>,

    pub comments: Option<u32>,

    pub tags: Vec<String>,

    /// Listing tags advertise subtitled torrents
    pub has_subtitle: bool,
}

/// What the driver needs from a detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    /// Entity code as shown on the detail page
    pub label: String,

    pub torrents: Vec<TorrentCandidate>,
}

/// Turns fetched HTML into structured entries
pub trait PageParser: Send + Sync {
    /// Extracts entries from a listing page
    fn parse_listing(&self, html: &str) -> Result<Vec<CatalogEntry>, String>;

    /// Extracts the label and torrent rows from a detail page
    fn parse_detail(&self, html: &str) -> Result<DetailPage, String>;
}

/// `PageParser` driven by configurable CSS selectors
#[derive(Debug, Clone)]
pub struct SelectorParser {
    listing_item: Selector,
    listing_link: Selector,
    listing_code: Selector,
    listing_title: Selector,
    listing_score: Selector,
    listing_tag: Selector,
    subtitle_tag_keywords: Vec<String>,
    detail_code: Selector,
    torrent_item: Selector,
    torrent_link: Selector,
    torrent_name: Selector,
    torrent_size: Selector,
    torrent_time: Selector,
    torrent_tag: Selector,
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

impl SelectorParser {
    /// Compiles every selector of the `[parser]` section
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorParser)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector has invalid syntax
    pub fn from_config(config: &ParserConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            listing_item: compile(&config.listing_item)?,
            listing_link: compile(&config.listing_link)?,
            listing_code: compile(&config.listing_code)?,
            listing_title: compile(&config.listing_title)?,
            listing_score: compile(&config.listing_score)?,
            listing_tag: compile(&config.listing_tag)?,
            subtitle_tag_keywords: config.subtitle_tag_keywords.clone(),
            detail_code: compile(&config.detail_code)?,
            torrent_item: compile(&config.torrent_item)?,
            torrent_link: compile(&config.torrent_link)?,
            torrent_name: compile(&config.torrent_name)?,
            torrent_size: compile(&config.torrent_size)?,
            torrent_time: compile(&config.torrent_time)?,
            torrent_tag: compile(&config.torrent_tag)?,
        })
    }

    fn parse_entry(&self, item: &ElementRef) -> Option<CatalogEntry> {
        let link = item.select(&self.listing_link).next()?;
        let href = link.value().attr("href")?.trim().to_string();
        if href.is_empty() {
            return None;
        }

        let code = first_text(item, &self.listing_code).unwrap_or_default();
        let mut title = first_text(item, &self.listing_title).unwrap_or_default();
        if !code.is_empty() {
            if let Some(rest) = title.strip_prefix(code.as_str()) {
                title = rest.trim().to_string();
            }
        }
        if title.is_empty() {
            title = link.value().attr("title").unwrap_or("").to_string();
        }

        let (rating, comments) = first_text(item, &self.listing_score)
            .map(|text| parse_score(&text))
            .unwrap_or((None, None));

        let tags: Vec<String> = item
            .select(&self.listing_tag)
            .map(|t| element_text(&t))
            .filter(|t| !t.is_empty())
            .collect();
        let has_subtitle = tags
            .iter()
            .any(|t| self.subtitle_tag_keywords.iter().any(|k| t.contains(k.as_str())));

        Some(CatalogEntry {
            href,
            code,
            title,
            rating,
            comments,
            tags,
            has_subtitle,
        })
    }

    fn parse_torrent(&self, item: &ElementRef) -> Option<TorrentCandidate> {
        let link = item.select(&self.torrent_link).next()?;
        let href = link.value().attr("href")?.trim().to_string();
        if href.is_empty() {
            return None;
        }

        Some(TorrentCandidate {
            link: href,
            name: first_text(item, &self.torrent_name).unwrap_or_default(),
            tags: item
                .select(&self.torrent_tag)
                .map(|t| element_text(&t))
                .filter(|t| !t.is_empty())
                .collect(),
            size: first_text(item, &self.torrent_size)
                .and_then(|meta| extract_size(&meta))
                .unwrap_or_default(),
            timestamp: first_text(item, &self.torrent_time).unwrap_or_default(),
        })
    }
}

impl PageParser for SelectorParser {
    fn parse_listing(&self, html: &str) -> Result<Vec<CatalogEntry>, String> {
        let document = Html::parse_document(html);
        let entries: Vec<CatalogEntry> = document
            .select(&self.listing_item)
            .filter_map(|item| self.parse_entry(&item))
            .collect();
        tracing::debug!("Parsed {} listing entries", entries.len());
        Ok(entries)
    }

    fn parse_detail(&self, html: &str) -> Result<DetailPage, String> {
        let document = Html::parse_document(html);
        let label = document
            .select(&self.detail_code)
            .next()
            .map(|e| element_text(&e))
            .unwrap_or_default();

        let torrents: Vec<TorrentCandidate> = document
            .select(&self.torrent_item)
            .filter_map(|item| self.parse_torrent(&item))
            .collect();

        if label.is_empty() && torrents.is_empty() {
            return Err("no entity code and no torrent rows found".to_string());
        }
        Ok(DetailPage { label, torrents })
    }
}

/// Whitespace-normalized text of an element
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: &ElementRef, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(|e| element_text(&e))
        .filter(|t| !t.is_empty())
}

/// Splits score text such as `4.47分, 由595人評價` into rating and comment count
///
/// The `分` and `由N人` labels are used when present. Unlabelled text falls
/// back to position: the first number is the rating, the second the number
/// of ratings.
pub fn parse_score(text: &str) -> (Option<f32>, Option<u32>) {
    let rating = RATING_RE.captures(text).and_then(|c| c[1].parse::<f32>().ok());
    let comments = COMMENTS_RE.captures(text).and_then(|c| c[1].parse::<u32>().ok());
    if rating.is_some() || comments.is_some() {
        return (rating, comments);
    }

    let mut numbers = NUMBER_RE.find_iter(text).map(|m| m.as_str());
    let rating = numbers.next().and_then(|n| n.parse::<f32>().ok());
    let comments = numbers.next().and_then(|n| n.parse::<u32>().ok());
    (rating, comments)
}

/// First `<number><unit>` token of a meta line, e.g. `5.47GB` in `5.47GB, 1個文件`
pub fn extract_size(text: &str) -> Option<String> {
    SIZE_RE
        .captures(text)
        .map(|caps| format!("{}{}", &caps[1], caps[2].to_ascii_uppercase()))
}
