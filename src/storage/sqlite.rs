//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the HistoryBackend trait.

use crate::history::VariantLinks;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{HistoryBackend, StorageError, StorageResult};
use crate::storage::HistoryRecord;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQLite history backend
pub struct SqliteHistoryBackend {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteHistoryBackend {
    /// Opens or creates the history database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteHistoryBackend)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }
}

impl HistoryBackend for SqliteHistoryBackend {
    fn load_all(&self) -> StorageResult<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT href, phase, video_code, create_date, update_date,
                    hacked_subtitle, hacked_no_subtitle, subtitle, no_subtitle
             FROM history ORDER BY rowid",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                HistoryRecord {
                    href: String::new(),
                    phase: 0,
                    label: row.get(2)?,
                    created_at: row.get(3)?,
                    last_updated: row.get(4)?,
                    links: VariantLinks {
                        hacked_subtitle: row.get(5)?,
                        hacked_no_subtitle: row.get(6)?,
                        subtitle: row.get(7)?,
                        no_subtitle: row.get(8)?,
                    },
                },
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (href, phase, mut record) = row?;
            let phase = u8::try_from(phase)
                .map_err(|_| StorageError::Corrupt(format!("phase {} for {}", phase, href)))?;
            record.href = href;
            record.phase = phase;
            records.push(record);
        }
        Ok(records)
    }

    fn save_all(&mut self, records: &[HistoryRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM history", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO history
                 (href, phase, video_code, create_date, update_date,
                  hacked_subtitle, hacked_no_subtitle, subtitle, no_subtitle)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.href,
                    record.phase,
                    record.label,
                    record.created_at,
                    record.last_updated,
                    record.links.hacked_subtitle,
                    record.links.hacked_no_subtitle,
                    record.links.subtitle,
                    record.links.no_subtitle,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }
}
