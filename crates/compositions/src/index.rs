// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed composition index (spec.md §4.5). One row per known
//! composition, keyed by name; `rebuild()` walks the compositions tree
//! and `index_file()` incrementally updates a single file's row.

use crate::loader::{Loader, LoaderError};
use ksi_core::{Composition, CompositionIndexRow, CompositionType};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

pub struct CompositionIndex {
    conn: Connection,
}

impl CompositionIndex {
    pub fn open(db_path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<(), IndexError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             CREATE TABLE IF NOT EXISTS composition_index (
                 name TEXT PRIMARY KEY,
                 type TEXT NOT NULL,
                 file_path TEXT NOT NULL,
                 file_hash TEXT NOT NULL,
                 version TEXT NOT NULL,
                 description TEXT NOT NULL,
                 author TEXT,
                 extends TEXT,
                 tags TEXT NOT NULL,
                 capabilities TEXT NOT NULL,
                 dependencies TEXT NOT NULL,
                 loading_strategy TEXT NOT NULL,
                 mutable INTEGER NOT NULL,
                 ephemeral INTEGER NOT NULL,
                 full_metadata TEXT NOT NULL,
                 indexed_at REAL NOT NULL,
                 last_modified REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_composition_index_type ON composition_index(type);",
        )?;
        Ok(())
    }

    /// Re-indexes every composition file under `root`, replacing existing
    /// rows. Returns the number of files indexed.
    pub fn rebuild(&self, root: &Path, now: f64) -> Result<usize, IndexError> {
        self.conn.execute("DELETE FROM composition_index", [])?;
        let mut count = 0;
        for type_ in [
            CompositionType::Component,
            CompositionType::Persona,
            CompositionType::Behavior,
            CompositionType::Orchestration,
            CompositionType::Evaluation,
            CompositionType::Tool,
            CompositionType::Profile,
            CompositionType::Prompt,
        ] {
            let dir = root.join(type_.dir_name());
            if !dir.is_dir() {
                continue;
            }
            for entry in walk_files(&dir)? {
                if self.index_file(&entry, now).is_ok() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Parses and upserts the row for a single composition file.
    pub fn index_file(&self, path: &Path, now: f64) -> Result<(), IndexError> {
        let composition = Loader::load_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let file_hash = hex_sha256(contents.as_bytes());
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(now);

        let author = composition.metadata.get("author").and_then(|v| v.as_str()).map(String::from);
        let tags = string_list(&composition, "tags");
        let capabilities = string_list(&composition, "capabilities");
        let dependencies = string_list(&composition, "dependencies");
        let loading_strategy = composition
            .metadata
            .get("loading_strategy")
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string();
        let mutable = composition.metadata.get("mutable").and_then(|v| v.as_bool()).unwrap_or(false);
        let ephemeral =
            composition.metadata.get("ephemeral").and_then(|v| v.as_bool()).unwrap_or(false);
        let full_metadata = serde_json::to_string(&composition.metadata).unwrap_or_default();

        self.conn.execute(
            "INSERT INTO composition_index (
                name, type, file_path, file_hash, version, description, author, extends,
                tags, capabilities, dependencies, loading_strategy, mutable, ephemeral,
                full_metadata, indexed_at, last_modified
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
             ON CONFLICT(name) DO UPDATE SET
                type=excluded.type, file_path=excluded.file_path, file_hash=excluded.file_hash,
                version=excluded.version, description=excluded.description, author=excluded.author,
                extends=excluded.extends, tags=excluded.tags, capabilities=excluded.capabilities,
                dependencies=excluded.dependencies, loading_strategy=excluded.loading_strategy,
                mutable=excluded.mutable, ephemeral=excluded.ephemeral,
                full_metadata=excluded.full_metadata, indexed_at=excluded.indexed_at,
                last_modified=excluded.last_modified",
            params![
                composition.name,
                type_name(composition.r#type),
                path.to_string_lossy(),
                file_hash,
                composition.version,
                composition.description,
                author,
                composition.extends,
                serde_json::to_string(&tags).unwrap_or_default(),
                serde_json::to_string(&capabilities).unwrap_or_default(),
                serde_json::to_string(&dependencies).unwrap_or_default(),
                loading_strategy,
                mutable,
                ephemeral,
                full_metadata,
                now,
                last_modified,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<CompositionIndexRow>, IndexError> {
        self.conn
            .query_row(SELECT_COLUMNS_WHERE_NAME, params![name], row_to_entry)
            .optional()
            .map_err(IndexError::from)
    }

    pub fn list(&self, type_: Option<CompositionType>) -> Result<Vec<CompositionIndexRow>, IndexError> {
        let mut stmt = match type_ {
            Some(_) => self.conn.prepare(SELECT_COLUMNS_WHERE_TYPE)?,
            None => self.conn.prepare(SELECT_COLUMNS_ALL)?,
        };
        let rows = match type_ {
            Some(t) => stmt.query_map(params![type_name(t)], row_to_entry)?,
            None => stmt.query_map([], row_to_entry)?,
        };
        rows.collect::<Result<Vec<_>, _>>().map_err(IndexError::from)
    }
}

const SELECT_COLUMNS_WHERE_NAME: &str = "SELECT name, type, file_path, file_hash, version, \
     description, author, extends, tags, capabilities, dependencies, loading_strategy, mutable, \
     ephemeral, full_metadata, indexed_at, last_modified \
     FROM composition_index WHERE name = ?1";
const SELECT_COLUMNS_WHERE_TYPE: &str = "SELECT name, type, file_path, file_hash, version, \
     description, author, extends, tags, capabilities, dependencies, loading_strategy, mutable, \
     ephemeral, full_metadata, indexed_at, last_modified \
     FROM composition_index WHERE type = ?1 ORDER BY name";
const SELECT_COLUMNS_ALL: &str = "SELECT name, type, file_path, file_hash, version, description, \
     author, extends, tags, capabilities, dependencies, loading_strategy, mutable, ephemeral, \
     full_metadata, indexed_at, last_modified \
     FROM composition_index ORDER BY name";

fn type_name(type_: CompositionType) -> &'static str {
    match type_ {
        CompositionType::Component => "component",
        CompositionType::Persona => "persona",
        CompositionType::Behavior => "behavior",
        CompositionType::Orchestration => "orchestration",
        CompositionType::Evaluation => "evaluation",
        CompositionType::Tool => "tool",
        CompositionType::Profile => "profile",
        CompositionType::Prompt => "prompt",
    }
}

fn string_list(composition: &Composition, key: &str) -> Vec<String> {
    composition
        .metadata
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompositionIndexRow> {
    let type_str: String = row.get(1)?;
    let tags_json: String = row.get(8)?;
    let capabilities_json: String = row.get(9)?;
    let dependencies_json: String = row.get(10)?;
    let full_metadata_json: String = row.get(14)?;
    Ok(CompositionIndexRow {
        name: row.get(0)?,
        r#type: parse_type(&type_str),
        file_path: row.get(2)?,
        file_hash: row.get(3)?,
        version: row.get(4)?,
        description: row.get(5)?,
        author: row.get(6)?,
        extends: row.get(7)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        capabilities: serde_json::from_str(&capabilities_json).unwrap_or_default(),
        dependencies: serde_json::from_str(&dependencies_json).unwrap_or_default(),
        loading_strategy: row.get(11)?,
        mutable: row.get(12)?,
        ephemeral: row.get(13)?,
        full_metadata: serde_json::from_str(&full_metadata_json).unwrap_or(serde_json::Value::Null),
        indexed_at: row.get(15)?,
        last_modified: row.get(16)?,
    })
}

fn parse_type(s: &str) -> CompositionType {
    match s {
        "persona" => CompositionType::Persona,
        "behavior" => CompositionType::Behavior,
        "orchestration" => CompositionType::Orchestration,
        "evaluation" => CompositionType::Evaluation,
        "tool" => CompositionType::Tool,
        "profile" => CompositionType::Profile,
        "prompt" => CompositionType::Prompt,
        _ => CompositionType::Component,
    }
}

fn walk_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            out.push(path);
        }
    }
    Ok(out)
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
