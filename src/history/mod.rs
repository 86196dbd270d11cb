//! Incremental dedup engine
//!
//! Decides, per catalog entry, whether fetching it again can still gain a
//! variant, and keeps the durable record of what was captured.
//!
//! # Components
//!
//! - `TorrentVariant`, `VariantLinks`: what can be captured for an entry
//! - `ClassificationRules`: filename rules turning torrent rows into variants
//! - dedup functions: pure decisions over variant sets
//! - `HistoryStore`: merge, dedup and bounding over a ledger backend

mod dedup;
mod store;
mod variant;

pub use dedup::{determine_variants, has_complete_preferred, missing_preferred_variants, should_process};
pub use store::{HistoryEntry, HistoryStore};
pub use variant::{
    link_date, parse_size, stamp_link, ClassificationRules, TorrentCandidate, TorrentVariant,
    VariantLinks, VariantSet,
};
pub(crate) use variant::SIZE_RE;
