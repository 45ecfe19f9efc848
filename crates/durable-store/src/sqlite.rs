//! SQLite-backed store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::{DurableStore, Version, Versioned};

/// How long a writer waits for another process to release the file lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store backed by a single SQLite table.
///
/// Each process opens its own `SqliteStore` on the same file; SQLite
/// serializes the individual statements while the version column provides
/// the compare-and-swap. A deleted key keeps its row with a `NULL` value so
/// its version keeps counting up.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        init_schema(&conn)?;

        info!(path = %path.display(), journal_mode = %mode, "Opened durable store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn current_version(conn: &Connection, key: &str) -> Result<Option<Version>> {
        let version = conn
            .query_row(
                "SELECT version FROM kv WHERE key = ?1 AND value IS NOT NULL",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(version.map(|raw| Version::new(raw as u64)))
    }
}

impl DurableStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let conn = self.conn.lock().map_err(|_| StoreError::MutexPoisoned)?;
        let row = conn
            .query_row(
                "SELECT value, version FROM kv WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, Option<Vec<u8>>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(value, version)| {
            value.map(|value| Versioned {
                value,
                version: Version::new(version as u64),
            })
        }))
    }

    fn set(&self, key: &str, value: &[u8], expected: Option<Version>) -> Result<Version> {
        let conn = self.conn.lock().map_err(|_| StoreError::MutexPoisoned)?;

        let written = match expected {
            Some(version) => conn
                .query_row(
                    "UPDATE kv SET value = ?1, version = version + 1 \
                     WHERE key = ?2 AND version = ?3 AND value IS NOT NULL \
                     RETURNING version",
                    params![value, key, version.get() as i64],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "INSERT INTO kv (key, value, version) VALUES (?1, ?2, 1) \
                     ON CONFLICT(key) DO UPDATE SET \
                       value = excluded.value, \
                       version = kv.version + 1 \
                     WHERE kv.value IS NULL \
                     RETURNING version",
                    params![key, value],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?,
        };

        match written {
            Some(raw) => Ok(Version::new(raw as u64)),
            None => {
                let actual = Self::current_version(&conn, key)?;
                debug!(key, ?expected, ?actual, "Conditional write rejected");
                Err(StoreError::Conflict {
                    key: key.to_string(),
                    expected,
                    actual,
                })
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::MutexPoisoned)?;
        conn.execute(
            "UPDATE kv SET value = NULL, version = version + 1 \
             WHERE key = ?1 AND value IS NOT NULL",
            params![key],
        )?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (\
            key TEXT PRIMARY KEY,\
            value BLOB,\
            version INTEGER NOT NULL\
        );",
    )?;

    Ok(())
}
