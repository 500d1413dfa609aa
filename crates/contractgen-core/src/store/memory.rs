//! Process-local contract store

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::ContractStore;
use crate::error::StoreError;
use crate::types::{ContractId, ContractRecord};

#[derive(Debug, Default)]
struct MemoryState {
    last_id: ContractId,
    records: BTreeMap<ContractId, ContractRecord>,
}

/// In-memory store. Counter and records share one lock, so allocation and insert are a single step.
#[derive(Debug, Default)]
pub struct InMemoryContractStore {
    state: RwLock<MemoryState>,
}

impl InMemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save(&self, title: &str, content: &str) -> Result<ContractId, StoreError> {
        let mut state = self.state.write();
        state.last_id += 1;
        let id = state.last_id;
        state.records.insert(
            id,
            ContractRecord {
                id,
                title: title.to_string(),
                content: content.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get(&self, id: ContractId) -> Result<Option<ContractRecord>, StoreError> {
        Ok(self.state.read().records.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<ContractRecord>, StoreError> {
        Ok(self.state.read().records.values().cloned().collect())
    }
}
