//! Database schema definitions
//!
//! This module contains the SQL schema for the SQLite history backend. The
//! columns mirror the CSV ledger one to one.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per catalog entry, keyed by its detail href
CREATE TABLE IF NOT EXISTS history (
    href TEXT PRIMARY KEY,
    phase INTEGER NOT NULL,
    video_code TEXT NOT NULL,
    create_date TEXT NOT NULL,
    update_date TEXT NOT NULL,
    hacked_subtitle TEXT NOT NULL DEFAULT '',
    hacked_no_subtitle TEXT NOT NULL DEFAULT '',
    subtitle TEXT NOT NULL DEFAULT '',
    no_subtitle TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_history_update_date ON history(update_date);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
