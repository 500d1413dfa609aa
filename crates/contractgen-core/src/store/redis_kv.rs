//! Redis contract store
//!
//! Key layout, with the default `contract` prefix:
//! - `contract:id:counter`  last issued id, advanced with `INCR`
//! - `contract:<id>`        JSON-encoded [`ContractRecord`]
//!
//! `INCR` is atomic on the server, which is what keeps ids unique across
//! processes sharing one Redis.
//!
//! Connecting and every command are bounded by the store timeout; a server
//! that stops answering surfaces as [`StoreError::Unavailable`].

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::ContractStore;
use crate::error::StoreError;
use crate::types::{ContractId, ContractRecord};

const DEFAULT_PREFIX: &str = "contract";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Contract store backed by a Redis server
#[derive(Debug, Clone)]
pub struct RedisContractStore {
    client: redis::Client,
    prefix: String,
    timeout: Duration,
}

impl RedisContractStore {
    /// Create a store for `url` (`redis://host:port`). Connects lazily.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        Self::with_prefix(url, DEFAULT_PREFIX)
    }

    /// Same as [`RedisContractStore::new`] with a custom key prefix
    pub fn with_prefix(url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            prefix: prefix.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Bound each connect and command by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn counter_key(&self) -> String {
        format!("{}:id:counter", self.prefix)
    }

    fn record_key(&self, id: ContractId) -> String {
        format!("{}:{}", self.prefix, id)
    }

    async fn bounded<T, Fut>(&self, op: &str, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Unavailable(format!(
                "redis {} timed out after {:?}",
                op, self.timeout
            ))),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        self.bounded("connect", self.client.get_multiplexed_async_connection())
            .await
    }

    fn decode(id: ContractId, raw: &str) -> Result<ContractRecord, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
            id,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ContractStore for RedisContractStore {
    fn backend_tag(&self) -> &'static str {
        "redis"
    }

    async fn init(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let created: bool = self
            .bounded("SETNX", conn.set_nx(self.counter_key(), 0_u64))
            .await?;
        if created {
            tracing::info!(key = %self.counter_key(), "Initialised contract id counter");
        }
        Ok(())
    }

    async fn save(&self, title: &str, content: &str) -> Result<ContractId, StoreError> {
        let mut conn = self.connection().await?;
        let id: ContractId = self
            .bounded("INCR", conn.incr(self.counter_key(), 1_u64))
            .await?;

        let record = ContractRecord {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let payload = serde_json::to_string(&record)
            .map_err(|e| StoreError::Unavailable(format!("encode contract {}: {}", id, e)))?;

        let _: () = self
            .bounded("SET", conn.set(self.record_key(id), payload))
            .await?;
        Ok(id)
    }

    async fn get(&self, id: ContractId) -> Result<Option<ContractRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = self.bounded("GET", conn.get(self.record_key(id))).await?;
        raw.map(|raw| Self::decode(id, &raw)).transpose()
    }

    async fn list(&self) -> Result<Vec<ContractRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let max_id: Option<ContractId> =
            self.bounded("GET", conn.get(self.counter_key())).await?;
        let Some(max_id) = max_id else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for id in 1..=max_id {
            let raw: Option<String> =
                self.bounded("GET", conn.get(self.record_key(id))).await?;
            // An id whose write is still in flight is skipped, not an error
            if let Some(raw) = raw {
                records.push(Self::decode(id, &raw)?);
            }
        }
        Ok(records)
    }
}
