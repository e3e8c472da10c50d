//! Association persistence.
//!
//! The store is an opaque key/value map from signature strings to
//! association records. Callers own any read-modify-write sequencing.

use super::record::Association;
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Store failure
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// I/O or encoding failure in the backing store
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "association store unavailable: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Record predicate used by [`AssociationStore::find`]
pub type RecordPredicate<'a> = &'a (dyn Fn(&Association) -> bool + Send + Sync);

/// Key/value store of association records
#[async_trait]
pub trait AssociationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Association>, StoreError>;

    async fn set(&self, key: &str, record: &Association) -> Result<(), StoreError>;

    /// Returns true if a record was removed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All records accepted by `predicate`, keyed by signature
    async fn find(
        &self,
        predicate: RecordPredicate<'_>,
    ) -> Result<BTreeMap<String, Association>, StoreError>;
}

/// Predicate accepting every record
pub fn all_records(_: &Association) -> bool {
    true
}

/// Association records in SQLite, one JSON document per signature.
///
/// # Schema
/// ```sql
/// CREATE TABLE associations (
///     signature  TEXT PRIMARY KEY,
///     record     TEXT NOT NULL,     -- JSON
///     updated_at TEXT NOT NULL      -- ISO 8601 timestamp
/// );
/// ```
pub struct SqliteAssociationStore {
    conn: Mutex<Connection>,
}

impl SqliteAssociationStore {
    /// Opens (or creates) the database and ensures the table exists.
    ///
    /// `":memory:"` gives a private in-memory database.
    pub fn new<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open association DB at {}", db_path.display()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS associations (
                signature  TEXT PRIMARY KEY,
                record     TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .context("Failed to create associations table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl AssociationStore for SqliteAssociationStore {
    async fn get(&self, key: &str) -> Result<Option<Association>, StoreError> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM associations WHERE signature = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, record: &Association) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO associations (signature, record, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(signature) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at",
            params![key, json, chrono::Utc::now().to_rfc3339()],
        )?;
        debug!(signature = %key, "Association stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM associations WHERE signature = ?1", params![key])?;
        Ok(removed > 0)
    }

    async fn find(
        &self,
        predicate: RecordPredicate<'_>,
    ) -> Result<BTreeMap<String, Association>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT signature, record FROM associations")?;
        let rows = stmt.query_map([], |row| {
            let signature: String = row.get(0)?;
            let record: String = row.get(1)?;
            Ok((signature, record))
        })?;

        let mut found = BTreeMap::new();
        for row in rows {
            let (signature, json) = row?;
            let record: Association = serde_json::from_str(&json)?;
            if predicate(&record) {
                found.insert(signature, record);
            }
        }
        Ok(found)
    }
}
