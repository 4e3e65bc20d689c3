// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state store: namespaced KV, session scratch, and async per-key
//! queues (spec.md §4.4). SQLite-backed under WAL, with an in-process
//! keyed-mutex registry serializing writes to the same `(namespace, key)`
//! so a push-then-read-seq sequence (queues) or a read-modify-write
//! (future KV compare-and-set) can't race within the daemon even though
//! the underlying connection is already single-writer.

mod kv;
mod queue;
mod session;

pub use kv::StateValue;
pub use queue::QueueItem;
pub use session::SessionScratch;

use crate::config::Paths;
use parking_lot::Mutex as SyncMutex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

pub const GLOBAL_NAMESPACE: &str = "global";

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-`(namespace, key)` async lock registry, so concurrent handlers
/// touching the same key serialize without blocking handlers on other
/// keys (spec.md §4.4).
#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: SyncMutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    fn entry(&self, namespace: &str, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry((namespace.to_string(), key.to_string()))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

pub struct StateStore {
    conn: Arc<SyncMutex<Connection>>,
    key_locks: KeyedLocks,
    db_path: PathBuf,
}

impl StateStore {
    pub fn open(paths: &Paths) -> Result<Self, StateError> {
        if let Some(parent) = paths.state_db().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(paths.state_db())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(SyncMutex::new(conn)),
            key_locks: KeyedLocks::default(),
            db_path: paths.state_db(),
        })
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(SyncMutex::new(conn)),
            key_locks: KeyedLocks::default(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    async fn lock_key(&self, namespace: &str, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        self.key_locks.entry(namespace, key).lock_owned().await
    }
}

fn init_schema(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            metadata TEXT NOT NULL,
            updated_at REAL NOT NULL,
            PRIMARY KEY (namespace, key)
        );
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            last_output TEXT NOT NULL,
            updated_at REAL NOT NULL
        );
        CREATE TABLE IF NOT EXISTS queues (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            seq INTEGER NOT NULL,
            value TEXT NOT NULL,
            expires_at REAL,
            pushed_at REAL NOT NULL,
            PRIMARY KEY (namespace, key, seq)
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
