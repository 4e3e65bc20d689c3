// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite metadata index: one row per event, WAL mode,
//! `synchronous=NORMAL` (spec.md §4.2).

use super::{EventLogEntry, EventLogError, EventQuery};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

pub fn open(db_path: &Path) -> Result<Connection, EventLogError> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}

pub fn init_schema(db_path: &Path) -> Result<(), EventLogError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = open(db_path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp REAL NOT NULL,
            event_name TEXT NOT NULL,
            event_type TEXT NOT NULL,
            originator_id TEXT,
            construct_id TEXT,
            session_id TEXT,
            correlation_id TEXT,
            status TEXT,
            event_id TEXT NOT NULL,
            request_id TEXT,
            model TEXT,
            purpose TEXT,
            file_path TEXT NOT NULL,
            file_offset INTEGER NOT NULL,
            payload_refs TEXT NOT NULL,
            data TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
        CREATE INDEX IF NOT EXISTS idx_events_event_name ON events(event_name);
        CREATE INDEX IF NOT EXISTS idx_events_originator_id ON events(originator_id);
        CREATE INDEX IF NOT EXISTS idx_events_construct_id ON events(construct_id);
        CREATE INDEX IF NOT EXISTS idx_events_session_id ON events(session_id);
        CREATE INDEX IF NOT EXISTS idx_events_correlation_id ON events(correlation_id);
        CREATE INDEX IF NOT EXISTS idx_events_status ON events(status);
        "#,
    )?;
    Ok(())
}

pub fn insert(
    conn: &Connection,
    entry: &EventLogEntry,
    file_path: &str,
    file_offset: u64,
) -> Result<(), EventLogError> {
    conn.execute(
        r#"INSERT INTO events (
            timestamp, event_name, event_type, originator_id, construct_id,
            session_id, correlation_id, status, event_id, request_id,
            model, purpose, file_path, file_offset, payload_refs, data
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)"#,
        params![
            entry.timestamp,
            entry.event_name,
            entry.event_type,
            entry.originator_id,
            entry.construct_id,
            entry.session_id,
            entry.correlation_id,
            entry.status,
            entry.event_id,
            entry.request_id,
            entry.model,
            entry.purpose,
            file_path,
            file_offset,
            serde_json::to_string(&entry.payload_refs)?,
            serde_json::to_string(&entry.data)?,
        ],
    )?;
    Ok(())
}

/// Translate a glob pattern (`*` suffix or exact) into a SQL `LIKE` clause.
fn like_pattern(pattern: &str) -> String {
    pattern.replace('*', "%")
}

pub fn query(db_path: &Path, query: &EventQuery) -> Result<Vec<EventLogEntry>, EventLogError> {
    let conn = open(db_path)?;
    let mut sql = String::from(
        "SELECT timestamp, event_name, event_type, originator_id, construct_id, \
         session_id, correlation_id, status, event_id, request_id, model, purpose, \
         payload_refs, data FROM events WHERE 1=1",
    );
    let mut clauses = Vec::new();
    let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if !query.event_patterns.is_empty() {
        let mut ors = Vec::new();
        for pattern in &query.event_patterns {
            ors.push("event_name LIKE ?".to_string());
            binds.push(Box::new(like_pattern(pattern)));
        }
        clauses.push(format!("({})", ors.join(" OR ")));
    }
    if let Some(originator) = &query.originator_id {
        clauses.push("originator_id = ?".to_string());
        binds.push(Box::new(originator.clone()));
    }
    if let Some(start) = query.start_time {
        clauses.push("timestamp >= ?".to_string());
        binds.push(Box::new(start));
    }
    if let Some(end) = query.end_time {
        clauses.push("timestamp <= ?".to_string());
        binds.push(Box::new(end));
    }
    for clause in clauses {
        sql.push_str(" AND ");
        sql.push_str(&clause);
    }
    sql.push_str(" ORDER BY timestamp DESC, id DESC");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        let payload_refs_json: String = row.get(12)?;
        let data_json: String = row.get(13)?;
        Ok((row_to_entry(row)?, payload_refs_json, data_json))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (mut entry, payload_refs_json, data_json) = row?;
        entry.payload_refs =
            serde_json::from_str::<BTreeMap<String, String>>(&payload_refs_json).unwrap_or_default();
        entry.data = serde_json::from_str(&data_json).unwrap_or(serde_json::Value::Null);
        out.push(entry);
    }
    Ok(out)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        timestamp: row.get(0)?,
        event_name: row.get(1)?,
        event_type: row.get(2)?,
        originator_id: row.get(3)?,
        construct_id: row.get(4)?,
        session_id: row.get(5)?,
        correlation_id: row.get(6)?,
        status: row.get(7)?,
        event_id: row.get(8)?,
        request_id: row.get(9)?,
        model: row.get(10)?,
        purpose: row.get(11)?,
        data: serde_json::Value::Null,
        payload_refs: Default::default(),
    })
}

#[allow(dead_code)]
pub fn find_one(db_path: &Path, event_id: &str) -> Result<Option<EventLogEntry>, EventLogError> {
    let conn = open(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT timestamp, event_name, event_type, originator_id, construct_id, \
         session_id, correlation_id, status, event_id, request_id, model, purpose, \
         payload_refs, data FROM events WHERE event_id = ?1",
    )?;
    let result = stmt
        .query_row(params![event_id], |row| {
            let payload_refs_json: String = row.get(12)?;
            let data_json: String = row.get(13)?;
            Ok((row_to_entry(row)?, payload_refs_json, data_json))
        })
        .optional()?;
    Ok(result.map(|(mut entry, refs, data)| {
        entry.payload_refs = serde_json::from_str(&refs).unwrap_or_default();
        entry.data = serde_json::from_str(&data).unwrap_or(serde_json::Value::Null);
        entry
    }))
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
