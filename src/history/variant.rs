//! Torrent variants and the filename rules that classify them

use crate::config::ClassificationConfig;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// `<number><unit>` display size, e.g. `5.47GB` or `900 mb`
pub(crate) static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(TB|GB|MB|KB)").expect("size pattern compiles")
});

static LINK_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{4}-\d{2}-\d{2})\]").expect("link date pattern compiles")
});

/// Kind of downloadable item offered for a catalog entry
///
/// `HackedWithSubtitle` and `Subtitle` are the preferred variants; the
/// other two are kept as fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TorrentVariant {
    HackedWithSubtitle,
    HackedNoSubtitle,
    Subtitle,
    NoSubtitle,
}

/// Set of variants, ordered by the enum declaration
pub type VariantSet = BTreeSet<TorrentVariant>;

impl TorrentVariant {
    /// The two variants a crawl hunts for
    pub const PREFERRED: [TorrentVariant; 2] = [Self::HackedWithSubtitle, Self::Subtitle];

    /// Returns all variants in ledger column order
    pub fn all() -> [TorrentVariant; 4] {
        [
            Self::HackedWithSubtitle,
            Self::HackedNoSubtitle,
            Self::Subtitle,
            Self::NoSubtitle,
        ]
    }

    pub fn is_preferred(&self) -> bool {
        matches!(self, Self::HackedWithSubtitle | Self::Subtitle)
    }

    /// Ledger column name for this variant
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::HackedWithSubtitle => "hacked_subtitle",
            Self::HackedNoSubtitle => "hacked_no_subtitle",
            Self::Subtitle => "subtitle",
            Self::NoSubtitle => "no_subtitle",
        }
    }

    /// Parses a ledger column name
    ///
    /// Returns None if the string doesn't match any known variant.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "hacked_subtitle" => Some(Self::HackedWithSubtitle),
            "hacked_no_subtitle" => Some(Self::HackedNoSubtitle),
            "subtitle" => Some(Self::Subtitle),
            "no_subtitle" => Some(Self::NoSubtitle),
            _ => None,
        }
    }
}

impl fmt::Display for TorrentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One link per variant; an empty string means the variant is absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantLinks {
    pub hacked_subtitle: String,
    pub hacked_no_subtitle: String,
    pub subtitle: String,
    pub no_subtitle: String,
}

impl VariantLinks {
    pub fn get(&self, variant: TorrentVariant) -> &str {
        match variant {
            TorrentVariant::HackedWithSubtitle => &self.hacked_subtitle,
            TorrentVariant::HackedNoSubtitle => &self.hacked_no_subtitle,
            TorrentVariant::Subtitle => &self.subtitle,
            TorrentVariant::NoSubtitle => &self.no_subtitle,
        }
    }

    pub fn set(&mut self, variant: TorrentVariant, value: String) {
        let slot = match variant {
            TorrentVariant::HackedWithSubtitle => &mut self.hacked_subtitle,
            TorrentVariant::HackedNoSubtitle => &mut self.hacked_no_subtitle,
            TorrentVariant::Subtitle => &mut self.subtitle,
            TorrentVariant::NoSubtitle => &mut self.no_subtitle,
        };
        *slot = value;
    }

    /// Variants whose link is non-empty, possibly none
    pub fn present(&self) -> VariantSet {
        TorrentVariant::all()
            .into_iter()
            .filter(|v| !self.get(*v).trim().is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}

/// Prefixes a link with its capture date: `[YYYY-MM-DD]<link>`
pub fn stamp_link(date: &str, link: &str) -> String {
    format!("[{}]{}", date, link)
}

/// Capture date of a stamped link, if it carries one
pub fn link_date(value: &str) -> Option<&str> {
    LINK_DATE_RE
        .captures(value.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A torrent row scraped from a detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentCandidate {
    pub link: String,
    pub name: String,
    pub tags: Vec<String>,
    /// Display size such as `4.57GB`
    pub size: String,
    /// Upload date as shown, compared as text
    pub timestamp: String,
}

/// Parses a display size (`TB`, `GB`, `MB`, `KB`) into bytes, 0 when unknown
pub fn parse_size(size: &str) -> f64 {
    let caps = match SIZE_RE.captures(size) {
        Some(caps) => caps,
        None => return 0.0,
    };

    let factor = match caps[2].to_ascii_uppercase().as_str() {
        "TB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        "MB" => 1024.0 * 1024.0,
        _ => 1024.0,
    };
    caps[1].parse::<f64>().map(|n| n * factor).unwrap_or(0.0)
}

/// Literal filename rules that sort candidates into variants
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    subtitle_tags: Vec<String>,
    hacked_subtitle_patterns: Vec<String>,
    hacked_patterns: Vec<String>,
    hacked_exclusion: String,
    preferred_plain_pattern: String,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::from_config(&ClassificationConfig::default())
    }
}

impl ClassificationRules {
    pub fn from_config(config: &ClassificationConfig) -> Self {
        Self {
            subtitle_tags: config.subtitle_tags.clone(),
            hacked_subtitle_patterns: config.hacked_subtitle_patterns.clone(),
            hacked_patterns: config.hacked_patterns.clone(),
            hacked_exclusion: config.hacked_exclusion.clone(),
            preferred_plain_pattern: config.preferred_plain_pattern.to_lowercase(),
        }
    }

    fn has_subtitle_tag(&self, candidate: &TorrentCandidate) -> bool {
        candidate
            .tags
            .iter()
            .any(|tag| self.subtitle_tags.iter().any(|t| tag.contains(t.as_str())))
    }

    fn is_subtitle(&self, candidate: &TorrentCandidate) -> bool {
        self.has_subtitle_tag(candidate)
            && (self.hacked_exclusion.is_empty()
                || !candidate.name.contains(self.hacked_exclusion.as_str()))
    }

    fn is_hacked_with_subtitle(&self, candidate: &TorrentCandidate) -> bool {
        self.hacked_subtitle_patterns
            .iter()
            .any(|p| candidate.name.contains(p.as_str()))
    }

    fn is_hacked(&self, candidate: &TorrentCandidate) -> bool {
        self.is_hacked_with_subtitle(candidate)
            || self
                .hacked_patterns
                .iter()
                .any(|p| candidate.name.contains(p.as_str()))
    }

    /// Classifies detail-page candidates into at most one link per variant
    ///
    /// Within a variant the newest timestamp wins, then the largest size.
    /// A hacked-without-subtitle link is only chosen when no hacked link
    /// with subtitles exists.
    pub fn classify(&self, candidates: &[TorrentCandidate]) -> VariantLinks {
        let mut links = VariantLinks::default();

        let subtitle: Vec<&TorrentCandidate> =
            candidates.iter().filter(|c| self.is_subtitle(c)).collect();
        if let Some(best) = best_candidate(&subtitle) {
            links.subtitle = best.link.clone();
        }

        let hacked_subtitle: Vec<&TorrentCandidate> = candidates
            .iter()
            .filter(|c| self.is_hacked_with_subtitle(c))
            .collect();
        let hacked_plain: Vec<&TorrentCandidate> = candidates
            .iter()
            .filter(|c| !self.is_hacked_with_subtitle(c) && self.is_hacked(c))
            .collect();

        if let Some(best) = best_candidate(&hacked_subtitle) {
            links.hacked_subtitle = best.link.clone();
        } else if let Some(best) = best_candidate(&hacked_plain) {
            links.hacked_no_subtitle = best.link.clone();
        }

        let (preferred, normal): (Vec<&TorrentCandidate>, Vec<&TorrentCandidate>) = candidates
            .iter()
            .filter(|c| !self.is_subtitle(c) && !self.is_hacked(c))
            .partition(|c| {
                !self.preferred_plain_pattern.is_empty()
                    && c.name.to_lowercase().contains(&self.preferred_plain_pattern)
            });

        if let Some(best) = best_candidate(&preferred).or_else(|| best_candidate(&normal)) {
            links.no_subtitle = best.link.clone();
        }

        if links.is_empty() && !candidates.is_empty() {
            tracing::debug!("No candidate matched any variant rule");
        }
        links
    }
}

fn best_candidate<'a>(candidates: &[&'a TorrentCandidate]) -> Option<&'a TorrentCandidate> {
    candidates.iter().copied().max_by(|a, b| {
        a.timestamp.cmp(&b.timestamp).then_with(|| {
            parse_size(&a.size)
                .partial_cmp(&parse_size(&b.size))
                .unwrap_or(Ordering::Equal)
        })
    })
}
