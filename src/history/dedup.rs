//! Pure dedup decisions over captured variants
//!
//! None of these functions touch the ledger; they take what the history
//! already holds and what the current detail page offers and say whether the
//! entry is still worth processing.

use crate::history::store::HistoryEntry;
use crate::history::variant::{TorrentVariant, VariantLinks, VariantSet};
use std::collections::HashMap;

/// Variants present in `links`, defaulting to `{NoSubtitle}` when none are
pub fn determine_variants(links: &VariantLinks) -> VariantSet {
    let present = links.present();
    if present.is_empty() {
        VariantSet::from([TorrentVariant::NoSubtitle])
    } else {
        present
    }
}

/// Preferred variants still worth asking for
///
/// Preferred variants the current page offers that history lacks are
/// returned first. Otherwise, with `have = history ∪ current`: both
/// preferred variants covered yields nothing, one covered yields the other,
/// neither yields both. Non-preferred variants never affect the result.
pub fn missing_preferred_variants(history: &VariantSet, current: &VariantSet) -> VariantSet {
    let gained: VariantSet = TorrentVariant::PREFERRED
        .into_iter()
        .filter(|v| current.contains(v) && !history.contains(v))
        .collect();
    if !gained.is_empty() {
        return gained;
    }

    TorrentVariant::PREFERRED
        .into_iter()
        .filter(|v| !history.contains(v) && !current.contains(v))
        .collect()
}

/// Decides whether an entry should be processed in `phase`
///
/// # Arguments
///
/// * `href` - Key of the catalog entry
/// * `history` - Loaded history map
/// * `phase` - Crawl phase, 1 or 2
/// * `current` - Variants offered by the current detail page
///
/// # Returns
///
/// `(process, existing)` where `existing` is the variant set already
/// captured, or `None` for an entry never seen before.
pub fn should_process(
    href: &str,
    history: &HashMap<String, HistoryEntry>,
    phase: u8,
    current: &VariantSet,
) -> (bool, Option<VariantSet>) {
    let entry = match history.get(href) {
        Some(entry) => entry,
        None => {
            tracing::debug!("New entry {}: should process", href);
            return (true, None);
        }
    };

    let existing = determine_variants(&entry.links);
    let missing = missing_preferred_variants(&existing, current);

    let process = match phase {
        1 => !missing.is_empty(),
        2 => {
            let upgrade = existing.contains(&TorrentVariant::NoSubtitle)
                && !existing.contains(&TorrentVariant::HackedNoSubtitle)
                && current.contains(&TorrentVariant::HackedNoSubtitle);
            upgrade || !missing.is_empty()
        }
        _ => false,
    };

    tracing::debug!(
        "Entry {} in phase {}: missing {:?}, process = {}",
        href,
        phase,
        missing,
        process
    );
    (process, Some(existing))
}

/// Returns true when both preferred variants are already captured,
/// letting the driver skip the detail fetch entirely
pub fn has_complete_preferred(href: &str, history: &HashMap<String, HistoryEntry>) -> bool {
    history.get(href).map_or(false, |entry| {
        let captured = entry.links.present();
        TorrentVariant::PREFERRED
            .iter()
            .all(|v| captured.contains(v))
    })
}
