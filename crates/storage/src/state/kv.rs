// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Namespaced synchronous KV (spec.md §4.4, `state:get|set|delete|list|clear`).

use super::{StateError, StateStore};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateValue {
    pub value: Value,
    #[serde(default)]
    pub metadata: Value,
    pub updated_at: f64,
}

impl StateStore {
    pub async fn kv_get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<StateValue>, StateError> {
        let _guard = self.lock_key(namespace, key).await;
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT value, metadata, updated_at FROM kv WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| {
                    let value: String = row.get(0)?;
                    let metadata: String = row.get(1)?;
                    let updated_at: f64 = row.get(2)?;
                    Ok((value, metadata, updated_at))
                },
            )
            .optional()?;
        Ok(match row {
            Some((value, metadata, updated_at)) => Some(StateValue {
                value: serde_json::from_str(&value)?,
                metadata: serde_json::from_str(&metadata)?,
                updated_at,
            }),
            None => None,
        })
    }

    pub async fn kv_set(
        &self,
        namespace: &str,
        key: &str,
        value: Value,
        metadata: Value,
        now: f64,
    ) -> Result<(), StateError> {
        let _guard = self.lock_key(namespace, key).await;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv (namespace, key, value, metadata, updated_at) VALUES (?1,?2,?3,?4,?5)
             ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value, metadata = excluded.metadata, updated_at = excluded.updated_at",
            params![namespace, key, serde_json::to_string(&value)?, serde_json::to_string(&metadata)?, now],
        )?;
        Ok(())
    }

    /// Returns `true` if a row existed and was deleted; repeated deletes of
    /// an already-missing key return `false` rather than erroring
    /// (spec.md §8 idempotence property).
    pub async fn kv_delete(&self, namespace: &str, key: &str) -> Result<bool, StateError> {
        let _guard = self.lock_key(namespace, key).await;
        let conn = self.conn.lock();
        let affected =
            conn.execute("DELETE FROM kv WHERE namespace = ?1 AND key = ?2", params![namespace, key])?;
        Ok(affected > 0)
    }

    pub fn kv_list(&self, namespace: &str, pattern: Option<&str>) -> Result<Vec<String>, StateError> {
        let conn = self.conn.lock();
        let like = pattern.map(|p| p.replace('*', "%"));
        let mut stmt = conn.prepare(
            "SELECT key FROM kv WHERE namespace = ?1 AND (?2 IS NULL OR key LIKE ?2) ORDER BY key",
        )?;
        let rows = stmt.query_map(params![namespace, like], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn kv_clear(&self, namespace: &str) -> Result<usize, StateError> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM kv WHERE namespace = ?1", params![namespace])?)
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
