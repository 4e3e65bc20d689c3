// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched append-only JSONL writer plus the SQLite index insert that
//! piggybacks on the same flush (spec.md §4.2).

use super::{sqlite, EventLogEntry, EventLogError};
use crate::config::utc_date_string;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append one day's worth of batch entries to `events/<date>/events.jsonl`
/// and record `(file_path, file_offset)` for each in the SQLite index,
/// all within one transaction per date bucket.
pub fn append_batch(
    events_dir: &Path,
    db_path: &Path,
    entries: &[EventLogEntry],
) -> Result<(), EventLogError> {
    let mut by_date: HashMap<String, Vec<&EventLogEntry>> = HashMap::new();
    for entry in entries {
        by_date.entry(utc_date_string(entry.timestamp)).or_default().push(entry);
    }

    let mut conn = sqlite::open(db_path)?;
    for (date, day_entries) in by_date {
        let day_dir = events_dir.join(&date);
        std::fs::create_dir_all(&day_dir)?;
        let file_path = day_dir.join("events.jsonl");

        let mut offset = std::fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(&file_path)?;
        let mut writer = BufWriter::new(file);

        let tx = conn.transaction()?;
        for entry in day_entries {
            let line = serde_json::to_string(entry)?;
            let this_offset = offset;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            offset += line.len() as u64 + 1;
            sqlite::insert(&tx, entry, &file_path_str(&file_path), this_offset)?;
        }
        writer.flush()?;
        tx.commit()?;
    }
    Ok(())
}

fn file_path_str(path: &PathBuf) -> String {
    path.display().to_string()
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
