//! Storage module for persisting the history ledger
//!
//! This module handles the on-disk form of the crawl history:
//! - CSV ledger backend (default, BOM tolerant)
//! - SQLite backend with the same logical schema
//! - Shared record type and timestamp formats

mod csv_ledger;
mod schema;
mod sqlite;
mod traits;

pub use csv_ledger::{CsvHistoryBackend, HISTORY_HEADER};
pub use sqlite::SqliteHistoryBackend;
pub use traits::{HistoryBackend, StorageError, StorageResult};

use crate::config::{HistoryBackendKind, HistoryConfig};
use crate::history::VariantLinks;

/// Timestamp format used in every ledger, local time
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used to stamp captured links
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Opens the history backend selected by configuration
///
/// # Arguments
///
/// * `config` - The `[history]` configuration section
///
/// # Returns
///
/// * `Ok(Box<dyn HistoryBackend>)` - Backend ready for use
/// * `Err(StorageError)` - Failed to open the SQLite database
pub fn open_history_backend(config: &HistoryConfig) -> StorageResult<Box<dyn HistoryBackend>> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match config.backend {
        HistoryBackendKind::Csv => Ok(Box::new(CsvHistoryBackend::new(&config.path))),
        HistoryBackendKind::Sqlite => Ok(Box::new(SqliteHistoryBackend::new(&config.path)?)),
    }
}

/// Represents one row of the history ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub href: String,
    pub phase: u8,
    /// Entity code shown on the catalog, e.g. `ABC-123`
    pub label: String,
    pub created_at: String,
    pub last_updated: String,
    /// Captured link per variant, each stored as `[YYYY-MM-DD]<link>`
    pub links: VariantLinks,
}

/// Parses a phase column, treating an empty value as phase 1
pub(crate) fn parse_phase(value: &str) -> Option<u8> {
    let value = value.trim();
    if value.is_empty() {
        return Some(1);
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_phase() {
        assert_eq!(parse_phase("1"), Some(1));
        assert_eq!(parse_phase(" 2 "), Some(2));
        assert_eq!(parse_phase(""), Some(1));
        assert_eq!(parse_phase("two"), None);
    }

    #[test]
    fn test_open_backend_creates_parent() {
        let dir = TempDir::new().unwrap();
        let config = HistoryConfig {
            path: dir.path().join("reports").join("history.csv"),
            ..HistoryConfig::default()
        };

        let backend = open_history_backend(&config).unwrap();
        assert!(dir.path().join("reports").is_dir());
        assert!(backend.load_all().unwrap().is_empty());
    }
}
