//! History store: merge, dedup and bounding on top of a ledger backend

use crate::config::HistoryConfig;
use crate::history::variant::{link_date, stamp_link, TorrentVariant, VariantLinks};
use crate::storage::{
    open_history_backend, HistoryBackend, HistoryRecord, StorageResult, DATE_FORMAT,
    TIMESTAMP_FORMAT,
};
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A loaded history entry, one per catalog href
pub type HistoryEntry = HistoryRecord;

/// Durable record of which variants were captured per catalog entry
pub struct HistoryStore {
    backend: Box<dyn HistoryBackend>,
    max_records: usize,
}

impl HistoryStore {
    pub fn new(backend: Box<dyn HistoryBackend>, max_records: usize) -> Self {
        Self {
            backend,
            max_records,
        }
    }

    /// Opens the backend named in `[history]`
    pub fn open(config: &HistoryConfig) -> StorageResult<Self> {
        Ok(Self::new(open_history_backend(config)?, config.max_records))
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Loads the history keyed by href
    ///
    /// Duplicate rows collapse to the most recently updated one, and the
    /// ledger is rewritten compacted when any were found. With `Some(1)`
    /// entries recorded by phase 2 are left out. An unreadable ledger is
    /// logged and loads as empty.
    pub fn load(&mut self, phase: Option<u8>) -> HashMap<String, HistoryEntry> {
        let rows = match self.backend.load_all() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    "History ledger {} is unreadable, starting fresh: {}",
                    self.backend.location(),
                    e
                );
                return HashMap::new();
            }
        };

        let total_rows = rows.len();
        let compacted = dedup_latest(rows);

        if compacted.len() != total_rows {
            tracing::info!(
                "Found {} duplicate history rows, compacting {}",
                total_rows - compacted.len(),
                self.backend.location()
            );
            if let Err(e) = self.backend.save_all(&compacted) {
                tracing::error!("Failed to compact history ledger: {}", e);
            }
        }

        let history: HashMap<String, HistoryEntry> = compacted
            .into_iter()
            .filter(|entry| phase != Some(1) || entry.phase != 2)
            .map(|entry| (entry.href.clone(), entry))
            .collect();

        let mut per_phase: BTreeMap<u8, usize> = BTreeMap::new();
        for entry in history.values() {
            *per_phase.entry(entry.phase).or_insert(0) += 1;
        }
        tracing::info!(
            "Loaded {} history entries from {} ({:?} by phase)",
            history.len(),
            self.backend.location(),
            per_phase
        );

        history
    }

    /// Merges captured links for `href` into the ledger
    ///
    /// Returns the entry as written.
    pub fn save(
        &mut self,
        href: &str,
        phase: u8,
        label: &str,
        links: &VariantLinks,
    ) -> StorageResult<HistoryEntry> {
        self.save_at(href, phase, label, links, Local::now())
    }

    /// Like [`save`](Self::save) at an explicit time
    ///
    /// Links are stamped with the capture date and merged as a union: a
    /// captured variant is never cleared. An existing dated link is only
    /// replaced by a strictly newer date. The updated entry moves to the
    /// front of the ledger, the full ledger is rewritten, then the size
    /// bound is applied.
    pub fn save_at(
        &mut self,
        href: &str,
        phase: u8,
        label: &str,
        links: &VariantLinks,
        now: DateTime<Local>,
    ) -> StorageResult<HistoryEntry> {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let today = now.format(DATE_FORMAT).to_string();

        let rows = self.rows_for_write();
        let mut matching = Vec::new();
        let mut others = Vec::with_capacity(rows.len());
        for row in rows {
            if row.href == href {
                matching.push(row);
            } else {
                others.push(row);
            }
        }

        if matching.len() > 1 {
            tracing::warn!(
                "Found {} existing rows for {}, keeping the merged one",
                matching.len(),
                href
            );
        }

        let entry = match dedup_latest(matching).into_iter().next() {
            Some(mut existing) => {
                merge_links(&mut existing.links, links, &today);
                existing.phase = phase;
                existing.last_updated = timestamp;
                if existing.label.is_empty() {
                    existing.label = label.to_string();
                }
                tracing::debug!("Updated history for {}", href);
                existing
            }
            None => {
                let mut stamped = VariantLinks::default();
                merge_links(&mut stamped, links, &today);
                tracing::debug!("Added history for {}", href);
                HistoryEntry {
                    href: href.to_string(),
                    phase,
                    label: label.to_string(),
                    created_at: timestamp.clone(),
                    last_updated: timestamp,
                    links: stamped,
                }
            }
        };

        let mut records = Vec::with_capacity(others.len() + 1);
        records.push(entry.clone());
        records.extend(others);
        self.backend.save_all(&records)?;

        let max = self.max_records;
        self.maintain_bound(max)?;
        Ok(entry)
    }

    /// Evicts the oldest entries by `last_updated` until at most `max` remain
    ///
    /// Returns the number of evicted entries. Survivors keep ledger order.
    pub fn maintain_bound(&mut self, max: usize) -> StorageResult<usize> {
        let rows = self.rows_for_write();
        if rows.len() <= max {
            return Ok(0);
        }

        let mut by_age: Vec<usize> = (0..rows.len()).collect();
        by_age.sort_by(|&a, &b| rows[b].last_updated.cmp(&rows[a].last_updated));
        let keep: HashSet<usize> = by_age.into_iter().take(max).collect();

        let evicted = rows.len() - keep.len();
        let kept: Vec<HistoryRecord> = rows
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, row)| row)
            .collect();

        self.backend.save_all(&kept)?;
        tracing::info!(
            "History bound {} reached, evicted {} oldest entries",
            max,
            evicted
        );
        Ok(evicted)
    }

    /// Current rows ahead of a rewrite
    ///
    /// An unreadable ledger is logged, set aside when the backend can, and
    /// replaced by an empty one.
    fn rows_for_write(&mut self) -> Vec<HistoryRecord> {
        let error = match self.backend.load_all() {
            Ok(rows) => return rows,
            Err(e) => e,
        };

        tracing::error!(
            "History ledger {} is unreadable, starting fresh: {}",
            self.backend.location(),
            error
        );
        match self.backend.set_aside() {
            Ok(Some(moved)) => tracing::warn!("Unreadable history ledger kept as {}", moved),
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not set the unreadable ledger aside: {}", e),
        }
        Vec::new()
    }

    /// Checks the ledger for duplicate keys
    ///
    /// Advisory only: problems are logged and reported as `false`.
    pub fn validate(&self) -> bool {
        let rows = match self.backend.load_all() {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("History ledger {} is unreadable: {}", self.backend.location(), e);
                return false;
            }
        };

        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = rows
            .iter()
            .filter(|row| !seen.insert(row.href.as_str()))
            .map(|row| row.href.as_str())
            .collect();

        if duplicates.is_empty() {
            tracing::info!("History ledger {} is valid ({} entries)", self.backend.location(), rows.len());
            true
        } else {
            tracing::warn!(
                "History ledger {} has {} duplicate rows (first: {})",
                self.backend.location(),
                duplicates.len(),
                duplicates[0]
            );
            false
        }
    }
}

/// Collapses rows sharing an href to the most recently updated one,
/// keeping first-seen order
fn dedup_latest(rows: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<HistoryRecord> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.get(&row.href) {
            Some(&i) => {
                if row.last_updated > unique[i].last_updated {
                    unique[i] = row;
                }
            }
            None => {
                index.insert(row.href.clone(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

fn merge_links(existing: &mut VariantLinks, incoming: &VariantLinks, today: &str) {
    for variant in TorrentVariant::all() {
        let link = incoming.get(variant).trim();
        if link.is_empty() {
            continue;
        }

        let replace = match link_date(existing.get(variant)) {
            Some(old) => today > old,
            None => true,
        };
        if replace {
            existing.set(variant, stamp_link(today, link));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CsvHistoryBackend;
    use chrono::{Duration, TimeZone};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn ledger(dir: &TempDir) -> PathBuf {
        dir.path().join("history.csv")
    }

    fn store(path: &Path, max: usize) -> HistoryStore {
        HistoryStore::new(Box::new(CsvHistoryBackend::new(path)), max)
    }

    fn at(day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn links(variants: &[(TorrentVariant, &str)]) -> VariantLinks {
        let mut links = VariantLinks::default();
        for (variant, link) in variants {
            links.set(*variant, link.to_string());
        }
        links
    }

    fn row(href: &str, phase: u8, updated: &str) -> HistoryRecord {
        HistoryRecord {
            href: href.to_string(),
            phase,
            label: "ABC-123".to_string(),
            created_at: "2024-01-01 00:00:00".to_string(),
            last_updated: updated.to_string(),
            links: VariantLinks::default(),
        }
    }

    #[test]
    fn test_load_missing_ledger() {
        let dir = TempDir::new().unwrap();
        assert!(store(&ledger(&dir), 10).load(None).is_empty());
    }

    #[test]
    fn test_save_new_entry_stamps_links() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&ledger(&dir), 10);

        history
            .save_at(
                "/v/abc",
                1,
                "ABC-123",
                &links(&[(TorrentVariant::Subtitle, "magnet:?xt=sub")]),
                at(1),
            )
            .unwrap();

        let loaded = history.load(None);
        let entry = &loaded["/v/abc"];
        assert_eq!(entry.label, "ABC-123");
        assert_eq!(entry.phase, 1);
        assert_eq!(entry.links.subtitle, "[2024-03-01]magnet:?xt=sub");
        assert_eq!(entry.created_at, "2024-03-01 12:00:00");
    }

    #[test]
    fn test_save_merges_variants() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&ledger(&dir), 10);

        history
            .save_at(
                "/v/abc",
                1,
                "ABC-123",
                &links(&[(TorrentVariant::NoSubtitle, "magnet:?xt=plain")]),
                at(1),
            )
            .unwrap();
        history
            .save_at(
                "/v/abc",
                2,
                "ABC-123",
                &links(&[(TorrentVariant::HackedNoSubtitle, "magnet:?xt=hack")]),
                at(2),
            )
            .unwrap();

        let loaded = history.load(None);
        assert_eq!(loaded.len(), 1);
        let entry = &loaded["/v/abc"];
        assert_eq!(entry.phase, 2);
        assert_eq!(entry.created_at, "2024-03-01 12:00:00");
        assert_eq!(entry.last_updated, "2024-03-02 12:00:00");
        assert_eq!(
            entry.links.present(),
            [TorrentVariant::HackedNoSubtitle, TorrentVariant::NoSubtitle]
                .into_iter()
                .collect::<crate::history::VariantSet>()
        );
    }

    #[test]
    fn test_save_never_drops_captured_variants() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&ledger(&dir), 10);

        history
            .save_at(
                "/v/abc",
                1,
                "ABC-123",
                &links(&[
                    (TorrentVariant::NoSubtitle, "magnet:?xt=plain"),
                    (TorrentVariant::HackedNoSubtitle, "magnet:?xt=hack"),
                ]),
                at(1),
            )
            .unwrap();
        let saved = history
            .save_at(
                "/v/abc",
                1,
                "ABC-123",
                &links(&[
                    (TorrentVariant::Subtitle, "magnet:?xt=sub"),
                    (TorrentVariant::HackedWithSubtitle, "magnet:?xt=hacksub"),
                ]),
                at(2),
            )
            .unwrap();

        let entry = history.load(None).remove("/v/abc").unwrap();
        assert_eq!(entry, saved);
        assert_eq!(entry.links.no_subtitle, "[2024-03-01]magnet:?xt=plain");
        assert_eq!(entry.links.hacked_no_subtitle, "[2024-03-01]magnet:?xt=hack");
        assert_eq!(entry.links.subtitle, "[2024-03-02]magnet:?xt=sub");
        assert_eq!(entry.links.hacked_subtitle, "[2024-03-02]magnet:?xt=hacksub");
        assert_eq!(entry.links.present().len(), 4);
    }

    #[test]
    fn test_same_day_link_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&ledger(&dir), 10);
        let sub = |link: &str| links(&[(TorrentVariant::Subtitle, link)]);

        history.save_at("/v/abc", 1, "ABC-123", &sub("magnet:?xt=first"), at(1)).unwrap();
        history
            .save_at("/v/abc", 1, "ABC-123", &sub("magnet:?xt=second"), at(1) + Duration::hours(3))
            .unwrap();
        assert_eq!(
            history.load(None)["/v/abc"].links.subtitle,
            "[2024-03-01]magnet:?xt=first"
        );

        history.save_at("/v/abc", 1, "ABC-123", &sub("magnet:?xt=third"), at(5)).unwrap();
        assert_eq!(
            history.load(None)["/v/abc"].links.subtitle,
            "[2024-03-05]magnet:?xt=third"
        );
    }

    #[test]
    fn test_load_phase_one_excludes_phase_two() {
        let dir = TempDir::new().unwrap();
        let path = ledger(&dir);
        CsvHistoryBackend::new(&path)
            .save_all(&[row("/v/one", 1, "2024-01-01 00:00:00"), row("/v/two", 2, "2024-01-01 00:00:00")])
            .unwrap();
        let mut history = store(&path, 10);

        let phase1 = history.load(Some(1));
        assert!(phase1.contains_key("/v/one"));
        assert!(!phase1.contains_key("/v/two"));

        assert_eq!(history.load(Some(2)).len(), 2);
        assert_eq!(history.load(None).len(), 2);
    }

    #[test]
    fn test_load_dedups_and_compacts() {
        let dir = TempDir::new().unwrap();
        let path = ledger(&dir);
        let mut newer = row("/v/dup", 2, "2024-02-01 00:00:00");
        newer.label = "NEWER".to_string();
        CsvHistoryBackend::new(&path)
            .save_all(&[
                row("/v/dup", 1, "2024-01-01 00:00:00"),
                row("/v/other", 1, "2024-01-01 00:00:00"),
                newer,
            ])
            .unwrap();

        let mut history = store(&path, 10);
        assert!(!history.validate());

        let loaded = history.load(None);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["/v/dup"].label, "NEWER");

        assert_eq!(CsvHistoryBackend::new(&path).load_all().unwrap().len(), 2);
        assert!(history.validate());
    }

    #[test]
    fn test_save_then_load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&ledger(&dir), 10);
        history
            .save_at(
                "/v/abc",
                1,
                "ABC-123",
                &links(&[(TorrentVariant::Subtitle, "magnet:?xt=sub")]),
                at(1),
            )
            .unwrap();

        let first = history.load(None);
        let second = history.load(None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_maintain_bound_evicts_oldest() {
        let dir = TempDir::new().unwrap();
        let path = ledger(&dir);
        let mut history = store(&path, 2);

        for (i, href) in ["/v/a", "/v/b", "/v/c"].iter().enumerate() {
            history
                .save_at(
                    href,
                    1,
                    "X",
                    &links(&[(TorrentVariant::NoSubtitle, "magnet:?xt=1")]),
                    at(i as u32 + 1),
                )
                .unwrap();
        }

        let loaded = history.load(None);
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.contains_key("/v/a"));
        assert!(loaded.contains_key("/v/c"));
    }

    #[test]
    fn test_maintain_bound_under_limit() {
        let dir = TempDir::new().unwrap();
        let mut history = store(&ledger(&dir), 10);
        assert_eq!(history.maintain_bound(10).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_ledger_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = ledger(&dir);
        std::fs::write(&path, [0xffu8, 0xfe, 0xfd, b'\n', 0x80]).unwrap();

        let mut history = store(&path, 10);
        assert!(history.load(None).is_empty());
        assert!(!history.validate());
    }

    #[test]
    fn test_save_over_corrupt_ledger_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = ledger(&dir);
        let garbage = [0xffu8, 0xfe, 0xfd, b'\n', 0x80];
        std::fs::write(&path, garbage).unwrap();

        let mut history = store(&path, 10);
        assert!(history.load(None).is_empty());
        history
            .save_at(
                "/v/abc",
                1,
                "ABC-1",
                &links(&[(TorrentVariant::Subtitle, "magnet:?xt=sub")]),
                at(1),
            )
            .unwrap();

        let loaded = history.load(None);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["/v/abc"].label, "ABC-1");
        assert!(history.validate());

        let kept = dir.path().join("history.csv.corrupt");
        assert_eq!(std::fs::read(kept).unwrap(), garbage);
    }
}
