//! DuckDB-backed key-value store.

use crate::error::{StorageError, StorageResult};
use crate::KeyValueStore;
use async_trait::async_trait;
use duckdb::{Connection, OptionalExt, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Persists entries in a single `kv` table.
///
/// The connection is guarded by a mutex held for one statement (or one
/// compare-and-swap) at a time, so handles can be cloned freely across tasks.
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path, "64MB", 1)?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_kv_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for DuckDbStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        read_value(&conn, key)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(affected > 0)
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM kv WHERE starts_with(key, ?) ORDER BY key")?;

        let rows = stmt
            .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, Vec<u8>)>, _>>()?;

        Ok(rows)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool> {
        let conn = self.conn()?;
        let current = read_value(&conn, key)?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, new],
        )?;
        Ok(true)
    }
}

fn read_value(conn: &Connection, key: &str) -> StorageResult<Option<Vec<u8>>> {
    let value = conn
        .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

fn initialize_kv_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key VARCHAR PRIMARY KEY,
            value BLOB NOT NULL
        );
        "#,
    )?;
    Ok(())
}
