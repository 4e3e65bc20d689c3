// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async per-key FIFO queues with optional per-item TTL (spec.md §3, §4.4
//! `async_state:push|pop|get_queue|queue_length|get_keys|delete`).

use super::{StateError, StateStore};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub value: Value,
    pub pushed_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
}

impl StateStore {
    /// Append `value` to the FIFO queue `(namespace, key)`, with an
    /// optional absolute `expires_at` timestamp.
    pub async fn queue_push(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        expires_at: Option<f64>,
        now: f64,
    ) -> Result<(), StateError> {
        let _guard = self.lock_key(namespace, key).await;
        let conn = self.conn.lock();
        let next_seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM queues WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )?;
        conn.execute(
            "INSERT INTO queues (namespace, key, seq, value, expires_at, pushed_at)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![namespace, key, next_seq, serde_json::to_string(&value)?, expires_at, now],
        )?;
        Ok(())
    }

    /// Pop the oldest non-expired item, or `None` if the queue is empty
    /// (never errors on an empty queue, spec.md §4.4/§8).
    pub async fn queue_pop(
        &self,
        namespace: &str,
        key: &str,
        now: f64,
    ) -> Result<Option<QueueItem>, StateError> {
        let _guard = self.lock_key(namespace, key).await;
        let conn = self.conn.lock();
        let row: Option<(i64, String, f64, Option<f64>)> = conn
            .query_row(
                "SELECT seq, value, pushed_at, expires_at FROM queues
                 WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)
                 ORDER BY seq ASC LIMIT 1",
                params![namespace, key, now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((seq, value, pushed_at, expires_at)) = row else { return Ok(None) };
        conn.execute(
            "DELETE FROM queues WHERE namespace = ?1 AND key = ?2 AND seq = ?3",
            params![namespace, key, seq],
        )?;
        Ok(Some(QueueItem { value: serde_json::from_str(&value)?, pushed_at, expires_at }))
    }

    pub fn queue_items(
        &self,
        namespace: &str,
        key: &str,
        now: f64,
    ) -> Result<Vec<QueueItem>, StateError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT value, pushed_at, expires_at FROM queues
             WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![namespace, key, now], |row| {
            let value: String = row.get(0)?;
            let pushed_at: f64 = row.get(1)?;
            let expires_at: Option<f64> = row.get(2)?;
            Ok((value, pushed_at, expires_at))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (value, pushed_at, expires_at) = row?;
            out.push(QueueItem { value: serde_json::from_str(&value)?, pushed_at, expires_at });
        }
        Ok(out)
    }

    pub fn queue_length(&self, namespace: &str, key: &str, now: f64) -> Result<u64, StateError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queues WHERE namespace = ?1 AND key = ?2 AND (expires_at IS NULL OR expires_at > ?3)",
            params![namespace, key, now],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn queue_keys(&self, namespace: &str) -> Result<Vec<String>, StateError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT DISTINCT key FROM queues WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![namespace], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Atomically delete every item of a queue.
    pub async fn queue_delete(&self, namespace: &str, key: &str) -> Result<u64, StateError> {
        let _guard = self.lock_key(namespace, key).await;
        let conn = self.conn.lock();
        let affected =
            conn.execute("DELETE FROM queues WHERE namespace = ?1 AND key = ?2", params![namespace, key])?;
        Ok(affected as u64)
    }

    /// Sweep every expired item across all queues. Run on a timer
    /// (spec.md §4.4 "periodic sweeper").
    pub fn sweep_expired_items(&self, now: f64) -> Result<u64, StateError> {
        let conn = self.conn.lock();
        let affected =
            conn.execute("DELETE FROM queues WHERE expires_at IS NOT NULL AND expires_at <= ?1", params![now])?;
        Ok(affected as u64)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
