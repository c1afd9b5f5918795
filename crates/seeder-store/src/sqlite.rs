use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::bucket::Bucket;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BatchOp, KeyValueStore};

/// Embedded single-file store backed by SQLite.
///
/// All buckets share one `kv` table keyed by `(bucket, key)`. Batches run in
/// a SQLite transaction. The connection sits behind a mutex; statements are
/// short, so callers are not moved onto a blocking pool.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                bucket TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (bucket, key)
            ) WITHOUT ROWID",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.conn.lock().expect("sqlite connection lock poisoned");
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (bucket, key, value) VALUES (?1, ?2, ?3)",
                params![bucket.name(), key, value],
            )?;
            Ok(())
        })
    }

    async fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Vec<u8>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv WHERE bucket = ?1 AND key = ?2",
                params![bucket.name(), key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::not_exist(bucket, key))
        })
    }

    async fn get_all_keys(&self, bucket: Bucket) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv WHERE bucket = ?1 ORDER BY key")?;
            let rows = stmt.query_map(params![bucket.name()], |row| row.get::<_, String>(0))?;
            let keys = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM kv WHERE bucket = ?1 AND key = ?2",
                params![bucket.name(), key],
            )?;
            Ok(())
        })
    }

    async fn write_batch(&self, ops: &[BatchOp]) -> StoreResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for op in ops {
                match op {
                    BatchOp::Put { bucket, key, value } => {
                        tx.execute(
                            "INSERT OR REPLACE INTO kv (bucket, key, value) VALUES (?1, ?2, ?3)",
                            params![bucket.name(), key, value],
                        )?;
                    }
                    BatchOp::Delete { bucket, key } => {
                        tx.execute(
                            "DELETE FROM kv WHERE bucket = ?1 AND key = ?2",
                            params![bucket.name(), key],
                        )?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    async fn close(&self) -> StoreResult<()> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned").take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}
