//! Contract Store
//!
//! Append-only persistence of contract versions with store-assigned,
//! strictly increasing ids. Three interchangeable implementations sit behind
//! [`ContractStore`]; the pipeline never knows which one is active.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ContractStore                     │
//! │          init / save / get / list                    │
//! ├─────────────────┬──────────────────┬─────────────────┤
//! │ InMemory        │ Sqlite           │ Redis           │
//! │ (BTreeMap+lock) │ (AUTOINCREMENT)  │ (INCR counter)  │
//! └─────────────────┴──────────────────┴─────────────────┘
//! ```

pub mod memory;
pub mod redis_kv;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StoreBackend;
use crate::error::StoreError;
use crate::types::{ContractId, ContractRecord};

pub use memory::InMemoryContractStore;
pub use redis_kv::RedisContractStore;
pub use sqlite::SqliteContractStore;

/// Persistence for contract records.
///
/// Id allocation in `save` is atomic: concurrent callers never share an id.
/// Records are never updated or deleted.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Short name of the implementation, for logs and health output
    fn backend_tag(&self) -> &'static str;

    /// Prepare the store. Idempotent.
    async fn init(&self) -> Result<(), StoreError>;

    /// Persist a new record and return its id
    async fn save(&self, title: &str, content: &str) -> Result<ContractId, StoreError>;

    /// Look up a record. A missing id is `Ok(None)`, not an error.
    async fn get(&self, id: ContractId) -> Result<Option<ContractRecord>, StoreError>;

    /// Every record, ascending by id. Re-reads current state on each call.
    async fn list(&self) -> Result<Vec<ContractRecord>, StoreError>;

    /// `save` followed by reading the stored record back
    async fn save_and_fetch(
        &self,
        title: &str,
        content: &str,
    ) -> Result<ContractRecord, StoreError> {
        let id = self.save(title, content).await?;
        self.get(id).await?.ok_or_else(|| {
            StoreError::Unavailable(format!("contract {} not readable after save", id))
        })
    }
}

/// Open the store selected by `backend`. The store still needs [`ContractStore::init`].
///
/// `timeout` bounds each network round trip of stores that have one (Redis).
pub fn open(backend: &StoreBackend, timeout: Duration) -> Result<Arc<dyn ContractStore>, StoreError> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryContractStore::new())),
        StoreBackend::Sqlite { path } => Ok(Arc::new(SqliteContractStore::open(path)?)),
        StoreBackend::Redis { .. } => {
            let url = backend
                .redis_url()
                .ok_or_else(|| StoreError::Unavailable("missing redis target".to_string()))?;
            Ok(Arc::new(RedisContractStore::new(&url)?.with_timeout(timeout)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory() {
        let store = open(&StoreBackend::Memory, Duration::from_secs(1)).unwrap();
        assert_eq!(store.backend_tag(), "memory");
    }

    #[tokio::test]
    async fn test_open_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(
            &StoreBackend::Sqlite {
                path: dir.path().join("contracts.db"),
            },
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(store.backend_tag(), "sqlite");
        store.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_redis_does_not_connect_eagerly() {
        let store = open(
            &StoreBackend::Redis {
                host: "localhost".into(),
                port: 6379,
            },
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(store.backend_tag(), "redis");
    }

    #[tokio::test]
    async fn test_save_and_fetch() {
        let store = InMemoryContractStore::new();
        let record = store.save_and_fetch("A", "x").await.unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.title, "A");
        assert_eq!(record.content, "x");
    }
}
