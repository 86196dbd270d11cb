//! Storage traits and error types
//!
//! This module defines the trait interface for history backends and
//! associated error types.

use crate::storage::HistoryRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt ledger: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for history ledger backends
///
/// Backends are dumb row stores: deduplication, merging and bounding are
/// done by `HistoryStore` on top of them.
pub trait HistoryBackend: Send {
    /// Reads every row, duplicates included, in ledger order
    ///
    /// A ledger that does not exist yet reads as empty. Individually
    /// malformed rows are skipped; an unreadable ledger is an error.
    fn load_all(&self) -> StorageResult<Vec<HistoryRecord>>;

    /// Replaces the ledger contents with `records`
    fn save_all(&mut self, records: &[HistoryRecord]) -> StorageResult<()>;

    /// Moves an unreadable ledger out of the way before it is rewritten
    ///
    /// Returns where the old contents went, `None` when nothing was moved.
    fn set_aside(&mut self) -> StorageResult<Option<String>> {
        Ok(None)
    }

    /// Human-readable location for log lines
    fn location(&self) -> String;
}
