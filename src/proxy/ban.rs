//! Persistent proxy ban ledger
//!
//! A proxy that keeps failing is assumed to be banned by the target for a
//! week. Bans survive restarts through a small CSV ledger so a new run never
//! wastes requests on an identity that is still blocked. Endpoints are kept
//! in memory for reporting only and are never written to disk.

use crate::proxy::masking::mask_proxy_url;
use crate::storage::{StorageResult, TIMESTAMP_FORMAT};
use chrono::{DateTime, Duration, Local, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// How long a banned proxy stays banned
pub const BAN_DURATION_DAYS: i64 = 7;

/// Cooldown applied by the pool, one day longer than the ban itself
pub const COOLDOWN_DURATION_DAYS: i64 = 8;

const LEDGER_HEADER: [&str; 3] = ["proxy_name", "ban_time", "unban_time"];

/// A single ban entry
#[derive(Debug, Clone, PartialEq)]
pub struct BanRecord {
    pub proxy_name: String,
    pub ban_time: DateTime<Local>,
    pub unban_time: DateTime<Local>,
    /// Endpoint captured at ban time, in memory only
    pub proxy_url: Option<String>,
}

impl BanRecord {
    /// Returns true while `now` is before the unban time
    pub fn is_active_at(&self, now: DateTime<Local>) -> bool {
        now < self.unban_time
    }

    /// Whole days left until the ban lifts
    pub fn days_remaining_at(&self, now: DateTime<Local>) -> i64 {
        (self.unban_time - now).num_days().max(0)
    }

    /// Hours left beyond the whole days
    pub fn hours_remaining_at(&self, now: DateTime<Local>) -> i64 {
        ((self.unban_time - now).num_hours() % 24).max(0)
    }
}

/// Tracks banned proxies and persists them to the ban ledger
///
/// All reads and writes go through one mutex; the ledger is rewritten in
/// full whenever the set of bans changes.
#[derive(Debug)]
pub struct ProxyBanManager {
    ledger_path: PathBuf,
    records: Mutex<HashMap<String, BanRecord>>,
}

impl ProxyBanManager {
    /// Opens the ban ledger at `ledger_path`, creating its parent directory
    ///
    /// A missing ledger starts empty. An unreadable or corrupt ledger is
    /// logged and also starts empty; a bad ban file never blocks a crawl.
    pub fn new(ledger_path: impl Into<PathBuf>) -> Self {
        let ledger_path = ledger_path.into();

        if let Some(parent) = ledger_path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!("Could not create ban ledger directory {:?}: {}", parent, e);
                }
            }
        }

        let records = match load_ledger(&ledger_path) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    "Ban ledger {:?} is unreadable, starting with no bans: {}",
                    ledger_path,
                    e
                );
                HashMap::new()
            }
        };

        let manager = Self {
            ledger_path,
            records: Mutex::new(records),
        };
        manager.sweep_expired(Local::now());
        manager
    }

    /// Path of the backing ledger file
    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Returns true if `proxy_name` has an active ban
    pub fn is_banned(&self, proxy_name: &str) -> bool {
        self.is_banned_at(proxy_name, Local::now())
    }

    /// Like [`is_banned`](Self::is_banned) at an explicit time
    ///
    /// An expired record is removed and the pruned ledger persisted.
    pub fn is_banned_at(&self, proxy_name: &str, now: DateTime<Local>) -> bool {
        let mut records = self.lock();
        match records.get(proxy_name) {
            Some(record) if record.is_active_at(now) => true,
            Some(_) => {
                records.remove(proxy_name);
                tracing::info!("Ban on proxy '{}' has expired", proxy_name);
                self.persist(&records);
                false
            }
            None => false,
        }
    }

    /// Records a ban starting now
    pub fn add_ban(&self, proxy_name: &str, proxy_url: Option<String>) {
        self.add_ban_at(proxy_name, proxy_url, Local::now());
    }

    /// Records a ban starting at `now`
    ///
    /// A proxy that is already actively banned keeps its original record.
    pub fn add_ban_at(&self, proxy_name: &str, proxy_url: Option<String>, now: DateTime<Local>) {
        let mut records = self.lock();

        if let Some(existing) = records.get(proxy_name) {
            if existing.is_active_at(now) {
                tracing::debug!("Proxy '{}' is already banned, keeping existing ban", proxy_name);
                return;
            }
        }

        let unban_time = now + Duration::days(BAN_DURATION_DAYS);
        tracing::warn!(
            "Proxy '{}' ({}) banned until {}",
            proxy_name,
            proxy_url
                .as_deref()
                .map(mask_proxy_url)
                .unwrap_or_else(|| "no endpoint".to_string()),
            unban_time.format(TIMESTAMP_FORMAT)
        );

        records.insert(
            proxy_name.to_string(),
            BanRecord {
                proxy_name: proxy_name.to_string(),
                ban_time: now,
                unban_time,
                proxy_url,
            },
        );
        self.persist(&records);
    }

    /// Returns all active bans ordered by unban time
    pub fn banned_proxies(&self) -> Vec<BanRecord> {
        self.banned_proxies_at(Local::now())
    }

    pub fn banned_proxies_at(&self, now: DateTime<Local>) -> Vec<BanRecord> {
        self.sweep_expired(now);
        let records = self.lock();
        let mut banned: Vec<BanRecord> = records.values().cloned().collect();
        banned.sort_by_key(|r| r.unban_time);
        banned
    }

    /// Number of active bans
    pub fn banned_count(&self) -> usize {
        self.sweep_expired(Local::now());
        self.lock().len()
    }

    /// Cooldown, in seconds, the pool applies to a banned proxy
    pub fn cooldown_seconds(&self) -> i64 {
        COOLDOWN_DURATION_DAYS * 24 * 3600
    }

    /// Human-readable summary of active bans
    ///
    /// Endpoints are included, unmasked, only when `include_endpoint` is
    /// set. The summary is for the operator and is never written to disk.
    pub fn summary(&self, include_endpoint: bool) -> String {
        self.summary_at(include_endpoint, Local::now())
    }

    pub fn summary_at(&self, include_endpoint: bool, now: DateTime<Local>) -> String {
        let banned = self.banned_proxies_at(now);
        if banned.is_empty() {
            return "No proxies currently banned.".to_string();
        }

        let mut lines = vec![
            format!("Currently banned proxies: {}", banned.len()),
            String::new(),
        ];

        for record in &banned {
            let mut entry = format!("  - {}:", record.proxy_name);
            if include_endpoint {
                if let Some(url) = &record.proxy_url {
                    entry.push_str(&format!("\n    IP: {}", url));
                }
            }
            entry.push_str(&format!(
                "\n    Banned at: {}",
                record.ban_time.format(TIMESTAMP_FORMAT)
            ));
            entry.push_str(&format!(
                "\n    Will unban: {}",
                record.unban_time.format(TIMESTAMP_FORMAT)
            ));
            entry.push_str(&format!(
                "\n    Time remaining: {} days {} hours",
                record.days_remaining_at(now),
                record.hours_remaining_at(now)
            ));
            lines.push(entry);
        }

        lines.join("\n")
    }

    fn sweep_expired(&self, now: DateTime<Local>) {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|name, record| {
            let active = record.is_active_at(now);
            if !active {
                tracing::info!("Removed expired ban record for proxy '{}'", name);
            }
            active
        });
        if records.len() != before {
            self.persist(&records);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BanRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, records: &HashMap<String, BanRecord>) {
        if let Err(e) = save_ledger(&self.ledger_path, records) {
            tracing::error!("Failed to save ban ledger {:?}: {}", self.ledger_path, e);
        } else {
            tracing::debug!("Saved {} ban records to {:?}", records.len(), self.ledger_path);
        }
    }
}

fn load_ledger(path: &Path) -> StorageResult<HashMap<String, BanRecord>> {
    let mut records = HashMap::new();
    if !path.exists() {
        tracing::info!("No existing ban ledger at {:?}", path);
        return Ok(records);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Skipping unreadable ban ledger row {}: {}", line + 2, e);
                continue;
            }
        };

        let name = row.get(0).unwrap_or_default().trim();
        let ban_time = row.get(1).and_then(parse_local_timestamp);
        let unban_time = row.get(2).and_then(parse_local_timestamp);

        match (name.is_empty(), ban_time, unban_time) {
            (false, Some(ban_time), Some(unban_time)) => {
                records.insert(
                    name.to_string(),
                    BanRecord {
                        proxy_name: name.to_string(),
                        ban_time,
                        unban_time,
                        proxy_url: None,
                    },
                );
            }
            _ => tracing::warn!("Skipping malformed ban ledger row {}", line + 2),
        }
    }

    tracing::info!("Loaded {} ban records from {:?}", records.len(), path);
    Ok(records)
}

fn save_ledger(path: &Path, records: &HashMap<String, BanRecord>) -> StorageResult<()> {
    let mut sorted: Vec<&BanRecord> = records.values().collect();
    sorted.sort_by_key(|r| r.unban_time);

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(LEDGER_HEADER)?;
    for record in sorted {
        writer.write_record([
            record.proxy_name.as_str(),
            &record.ban_time.format(TIMESTAMP_FORMAT).to_string(),
            &record.unban_time.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_local_timestamp(value: &str) -> Option<DateTime<Local>> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()?
        .and_local_timezone(Local)
        .earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_in(dir: &TempDir) -> PathBuf {
        dir.path().join("reports").join("proxy_bans.csv")
    }

    #[test]
    fn test_missing_ledger_starts_empty() {
        let dir = TempDir::new().unwrap();
        let manager = ProxyBanManager::new(ledger_in(&dir));

        assert_eq!(manager.banned_count(), 0);
        assert!(!manager.is_banned("Tokyo"));
        assert!(dir.path().join("reports").is_dir());
    }

    #[test]
    fn test_add_ban_lasts_seven_days() {
        let dir = TempDir::new().unwrap();
        let manager = ProxyBanManager::new(ledger_in(&dir));

        manager.add_ban("Tokyo", Some("http://10.0.0.1:3128".to_string()));

        assert!(manager.is_banned("Tokyo"));
        let banned = manager.banned_proxies();
        assert_eq!(banned.len(), 1);
        assert_eq!(
            banned[0].unban_time - banned[0].ban_time,
            Duration::days(BAN_DURATION_DAYS)
        );
    }

    #[test]
    fn test_add_ban_while_active_is_noop() {
        let dir = TempDir::new().unwrap();
        let manager = ProxyBanManager::new(ledger_in(&dir));
        let first = Local::now() - Duration::days(1);

        manager.add_ban_at("Tokyo", None, first);
        manager.add_ban("Tokyo", None);

        let banned = manager.banned_proxies();
        assert_eq!(banned.len(), 1);
        assert_eq!(banned[0].ban_time, first);
    }

    #[test]
    fn test_bans_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = ledger_in(&dir);

        {
            let manager = ProxyBanManager::new(&path);
            manager.add_ban("Tokyo", Some("http://user:pw@10.0.0.1:3128".to_string()));
            manager.add_ban("Osaka", None);
        }

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("proxy_name,ban_time,unban_time"));
        assert!(!content.contains("10.0.0.1"));

        let reloaded = ProxyBanManager::new(&path);
        assert!(reloaded.is_banned("Tokyo"));
        assert!(reloaded.is_banned("Osaka"));
        assert_eq!(reloaded.banned_count(), 2);
    }

    #[test]
    fn test_expired_ban_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = ledger_in(&dir);
        let manager = ProxyBanManager::new(&path);

        manager.add_ban_at("Tokyo", None, Local::now() - Duration::days(8));

        assert!(!manager.is_banned("Tokyo"));
        assert!(manager.banned_proxies().is_empty());

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("Tokyo"));
    }

    #[test]
    fn test_expired_rows_pruned_on_load() {
        let dir = TempDir::new().unwrap();
        let path = ledger_in(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "proxy_name,ban_time,unban_time\n\
             Old,2020-01-01 00:00:00,2020-01-08 00:00:00\n\
             Future,2020-01-01 00:00:00,2999-01-08 00:00:00\n",
        )
        .unwrap();

        let manager = ProxyBanManager::new(&path);
        let names: Vec<String> = manager
            .banned_proxies()
            .into_iter()
            .map(|r| r.proxy_name)
            .collect();

        assert_eq!(names, vec!["Future".to_string()]);
        assert!(!fs::read_to_string(&path).unwrap().contains("Old"));
    }

    #[test]
    fn test_corrupt_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = ledger_in(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "proxy_name,ban_time,unban_time\n\
             Broken,yesterday,tomorrow\n\
             OnlyName\n\
             Good,2020-01-01 00:00:00,2999-01-08 00:00:00\n",
        )
        .unwrap();

        let manager = ProxyBanManager::new(&path);
        assert_eq!(manager.banned_count(), 1);
        assert!(manager.is_banned("Good"));
        assert!(!manager.is_banned("Broken"));
    }

    #[test]
    fn test_garbage_ledger_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = ledger_in(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, [0xffu8, 0xfe, 0x00, 0x12, 0x80]).unwrap();

        let manager = ProxyBanManager::new(&path);
        assert_eq!(manager.banned_count(), 0);

        manager.add_ban("Tokyo", None);
        assert!(manager.is_banned("Tokyo"));
    }

    #[test]
    fn test_summary_empty() {
        let dir = TempDir::new().unwrap();
        let manager = ProxyBanManager::new(ledger_in(&dir));
        assert_eq!(manager.summary(false), "No proxies currently banned.");
    }

    #[test]
    fn test_summary_orders_by_unban_and_shows_endpoint_on_request() {
        let dir = TempDir::new().unwrap();
        let manager = ProxyBanManager::new(ledger_in(&dir));
        let now = Local::now();

        manager.add_ban_at("Late", None, now);
        manager.add_ban_at(
            "Early",
            Some("http://192.168.1.20:3128".to_string()),
            now - Duration::days(2),
        );

        let summary = manager.summary_at(true, now);
        assert!(summary.starts_with("Currently banned proxies: 2"));
        let early = summary.find("  - Early:").unwrap();
        let late = summary.find("  - Late:").unwrap();
        assert!(early < late);
        assert!(summary.contains("IP: http://192.168.1.20:3128"));
        assert!(summary.contains("Time remaining: 5 days 0 hours"));

        let without_ip = manager.summary_at(false, now);
        assert!(!without_ip.contains("IP:"));
        assert!(!without_ip.contains("192.168"));
    }

    #[test]
    fn test_cooldown_is_eight_days() {
        let dir = TempDir::new().unwrap();
        let manager = ProxyBanManager::new(ledger_in(&dir));
        assert_eq!(manager.cooldown_seconds(), 691_200);
    }
}
