//! Key-value persistence for Haven.
//!
//! Every piece of state the vault and audit layers persist (key records,
//! audit events, archived reports) goes through [`KeyValueStore`]. Two
//! backends are provided:
//!
//! - [`MemoryStore`]: ordered in-memory map, used by tests and ephemeral
//!   sessions
//! - [`DuckDbStore`]: a single `kv` table in a DuckDB file
//!
//! # Atomicity
//!
//! `compare_and_swap` is the only multi-step primitive. Callers that need
//! read-modify-write semantics (key rotation) build on it; append-only data
//! (audit events) uses one key per record so plain `set` never races.

mod duckdb_store;
mod error;
mod memory;

use async_trait::async_trait;

pub use duckdb_store::DuckDbStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

/// Byte-oriented key-value store.
///
/// `scan_prefix` returns entries in ascending key order.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Removes a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Writes `new` only if the current value equals `expected`
    /// (`None` = key absent). Returns whether the write happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
    ) -> StorageResult<bool>;
}

/// Escapes a caller-supplied identifier for use as one `:`-separated key
/// segment, so a prefix scan for one user can never match another.
pub fn key_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

/// Open a DuckDB connection with stale WAL recovery and resource limits.
///
/// If the initial open fails and a `.wal` file exists alongside the database,
/// it is removed and the open is retried once. An unclean shutdown can leave
/// a WAL file behind that prevents reopening.
pub fn open_duckdb_with_wal_recovery(
    path: &std::path::Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<duckdb::Connection> {
    let conn = match duckdb::Connection::open(path) {
        Ok(c) => c,
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                tracing::warn!(
                    "DuckDB open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    let c = duckdb::Connection::open(path)?;
                    apply_resource_limits(&c, memory_limit, threads)?;
                    return Ok(c);
                }
            }
            return Err(first_err.into());
        }
    };
    apply_resource_limits(&conn, memory_limit, threads)?;
    Ok(conn)
}

fn apply_resource_limits(
    conn: &duckdb::Connection,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{memory_limit}'; PRAGMA threads={threads};"
    ))?;
    Ok(())
}
