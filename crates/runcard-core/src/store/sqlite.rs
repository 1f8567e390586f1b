//! SQLite-backed record store.
//!
//! Runtime defaults follow the rest of the workspace:
//! - `journal_mode = WAL` so a reader never blocks on a writer
//! - `busy_timeout = 5s` to ride out a concurrent `rc` invocation

use super::{RecordStore, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::{path::Path, time::Duration};
use tracing::debug;

/// Busy timeout used for record DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    name       TEXT PRIMARY KEY NOT NULL,
    body       TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// A single `records(name, body)` table holding one JSON document per key.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, connection, pragmas or schema fail.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                key: path.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        Self::with_connection(conn)
    }

    /// In-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

impl RecordStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM records WHERE name = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        debug!(key, found = body.is_some(), "sqlite record read");
        body.map(|text| {
            serde_json::from_str(&text).map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let body = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.conn.execute(
            "INSERT INTO records (name, body, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![key, body],
        )?;
        debug!(key, "sqlite record written");
        Ok(())
    }
}
