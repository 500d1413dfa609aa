//! SQLite contract store
//!
//! One `contracts` table in WAL mode. Ids come from `AUTOINCREMENT`, so they
//! are never reused even if rows were removed by hand. The connection sits
//! behind a mutex and every statement runs on the blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

use super::ContractStore;
use crate::error::StoreError;
use crate::types::{ContractId, ContractRecord};

/// Contract store backed by a SQLite file (or `:memory:`)
#[derive(Debug, Clone)]
pub struct SqliteContractStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContractStore {
    /// Open (or create) the database. Parent directories are created as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "create database directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Fresh in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContractRecord> {
    let id: i64 = row.get(0)?;
    let created_at: DateTime<Utc> = row.get(3)?;
    Ok(ContractRecord {
        id: id as ContractId,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at,
    })
}

/// A row that exists but does not decode is corrupt, not an outage
fn decode_error(id: ContractId, e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(_, _, cause) => StoreError::Corrupt {
            id,
            reason: cause.to_string(),
        },
        rusqlite::Error::InvalidColumnType(_, column, kind) => StoreError::Corrupt {
            id,
            reason: format!("column {} has unexpected type {}", column, kind),
        },
        e => e.into(),
    }
}

#[async_trait]
impl ContractStore for SqliteContractStore {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS contracts (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    title       TEXT NOT NULL,
                    content     TEXT NOT NULL,
                    created_at  TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
        .await
    }

    async fn save(&self, title: &str, content: &str) -> Result<ContractId, StoreError> {
        let title = title.to_string();
        let content = content.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO contracts (title, content, created_at) VALUES (?1, ?2, ?3)",
                params![title, content, Utc::now()],
            )?;
            Ok(conn.last_insert_rowid() as ContractId)
        })
        .await
    }

    async fn get(&self, id: ContractId) -> Result<Option<ContractRecord>, StoreError> {
        self.with_conn(move |conn| {
            let result = conn.query_row(
                "SELECT id, title, content, created_at FROM contracts WHERE id = ?1",
                params![id as i64],
                row_to_record,
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(decode_error(id, e)),
            }
        })
        .await
    }

    async fn list(&self) -> Result<Vec<ContractRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, created_at FROM contracts ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                records.push(row_to_record(row).map_err(|e| decode_error(id as ContractId, e))?);
            }
            Ok(records)
        })
        .await
    }
}
