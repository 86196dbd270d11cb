//! CSV history ledger
//!
//! The ledger is written with a UTF-8 byte order mark so spreadsheet tools
//! open it correctly; the mark is optional on read.

use crate::history::VariantLinks;
use crate::storage::traits::{HistoryBackend, StorageResult};
use crate::storage::{parse_phase, HistoryRecord};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const BOM: &[u8] = b"\xef\xbb\xbf";

/// Column order of the history ledger
pub const HISTORY_HEADER: [&str; 9] = [
    "href",
    "phase",
    "video_code",
    "create_date",
    "update_date",
    "hacked_subtitle",
    "hacked_no_subtitle",
    "subtitle",
    "no_subtitle",
];

/// History backend over a single CSV file
pub struct CsvHistoryBackend {
    path: PathBuf,
}

impl CsvHistoryBackend {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl HistoryBackend for CsvHistoryBackend {
    fn load_all(&self) -> StorageResult<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path)?;
        let body = bytes.strip_prefix(BOM).unwrap_or(&bytes);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(body);

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping unreadable history row {}: {}", line + 2, e);
                    continue;
                }
            };

            match record_from_row(&row, &columns) {
                Some(record) => records.push(record),
                None => tracing::warn!("Skipping malformed history row {}", line + 2),
            }
        }

        Ok(records)
    }

    fn save_all(&mut self, records: &[HistoryRecord]) -> StorageResult<()> {
        let mut file = fs::File::create(&self.path)?;
        file.write_all(BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(HISTORY_HEADER)?;
        for record in records {
            let phase = record.phase.to_string();
            writer.write_record([
                record.href.as_str(),
                phase.as_str(),
                record.label.as_str(),
                record.created_at.as_str(),
                record.last_updated.as_str(),
                record.links.hacked_subtitle.as_str(),
                record.links.hacked_no_subtitle.as_str(),
                record.links.subtitle.as_str(),
                record.links.no_subtitle.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn set_aside(&mut self) -> StorageResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut corrupt = self.path.clone().into_os_string();
        corrupt.push(".corrupt");
        let corrupt = PathBuf::from(corrupt);
        fs::rename(&self.path, &corrupt)?;
        Ok(Some(corrupt.display().to_string()))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Builds a record from a row, looking columns up by header name
///
/// Older ledgers only carry `parsed_date`; it fills both timestamps.
fn record_from_row(row: &StringRecord, columns: &HashMap<String, usize>) -> Option<HistoryRecord> {
    let field = |name: &str| -> String {
        columns
            .get(name)
            .and_then(|&i| row.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let href = field("href");
    if href.is_empty() {
        return None;
    }

    let legacy_date = field("parsed_date");
    let or_legacy = |value: String| {
        if value.is_empty() {
            legacy_date.clone()
        } else {
            value
        }
    };

    Some(HistoryRecord {
        href,
        phase: parse_phase(&field("phase"))?,
        label: field("video_code"),
        created_at: or_legacy(field("create_date")),
        last_updated: or_legacy(field("update_date")),
        links: VariantLinks {
            hacked_subtitle: field("hacked_subtitle"),
            hacked_no_subtitle: field("hacked_no_subtitle"),
            subtitle: field("subtitle"),
            no_subtitle: field("no_subtitle"),
        },
    })
}
