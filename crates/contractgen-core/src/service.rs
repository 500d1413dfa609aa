//! Contract Service
//!
//! The inbound surface consumed by the HTTP layer: create, get, list, refine
//! and health. Holds the one store handle and the one orchestrator for the
//! process; handlers receive it by reference instead of reaching for globals.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::{self, ModelBackend};
use crate::config::PipelineConfig;
use crate::error::{ContractError, Result};
use crate::orchestrator::{GenerationOrchestrator, GenerationOutcome};
use crate::refinement::RefinementWorkflow;
use crate::store::{self, ContractStore};
use crate::types::{ContractId, ContractRecord};

/// Whether stored content came from the model or from the fallback path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Generated,
    Degraded,
}

/// Generation metadata attached to create and refine responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub status: GenerationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&GenerationOutcome> for GenerationReport {
    fn from(outcome: &GenerationOutcome) -> Self {
        match outcome.reason() {
            None => Self {
                status: GenerationStatus::Generated,
                reason: None,
            },
            Some(reason) => Self {
                status: GenerationStatus::Degraded,
                reason: Some(reason.to_string()),
            },
        }
    }
}

/// A freshly written record together with how its content was produced.
///
/// Serializes as the record's fields plus a `generation` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContract {
    #[serde(flatten)]
    pub record: ContractRecord,
    pub generation: GenerationReport,
}

impl GeneratedContract {
    pub fn new(record: ContractRecord, outcome: &GenerationOutcome) -> Self {
        Self {
            record,
            generation: outcome.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.generation.status == GenerationStatus::Degraded
    }
}

/// Health snapshot. Reachability is a live probe, not a hard dependency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub backend_reachable: bool,
    pub model: String,
}

/// Process-wide contract pipeline
#[derive(Clone)]
pub struct ContractService {
    store: Arc<dyn ContractStore>,
    orchestrator: GenerationOrchestrator,
    refinement: RefinementWorkflow,
}

impl std::fmt::Debug for ContractService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractService")
            .field("store", &self.store.backend_tag())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

impl ContractService {
    pub fn new(store: Arc<dyn ContractStore>, orchestrator: GenerationOrchestrator) -> Self {
        let refinement = RefinementWorkflow::new(store.clone(), orchestrator.clone());
        Self {
            store,
            orchestrator,
            refinement,
        }
    }

    /// Build the backend and store named by `config` and initialise the store.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        let backend = backend::from_config(config)?;
        let store = store::open(&config.store, config.store_timeout())?;
        store.init().await?;

        tracing::info!(
            store = store.backend_tag(),
            model = backend.model(),
            strict = config.strict,
            "Contract service ready"
        );

        Ok(Self::new(
            store,
            GenerationOrchestrator::from_config(backend, config),
        ))
    }

    pub fn store(&self) -> &Arc<dyn ContractStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        self.orchestrator.backend()
    }

    /// Generate a contract for `description` and store it under `title`
    pub async fn create(&self, title: &str, description: &str) -> Result<GeneratedContract> {
        require_text("title", title)?;
        require_text("description", description)?;

        let outcome = self.orchestrator.generate_contract(description).await?;
        let record = self.store.save_and_fetch(title, outcome.content()).await?;

        tracing::info!(
            contract_id = record.id,
            degraded = outcome.is_degraded(),
            "Contract created"
        );

        Ok(GeneratedContract::new(record, &outcome))
    }

    pub async fn get(&self, id: ContractId) -> Result<ContractRecord> {
        self.store
            .get(id)
            .await?
            .ok_or(ContractError::NotFound { id })
    }

    pub async fn list(&self) -> Result<Vec<ContractRecord>> {
        Ok(self.store.list().await?)
    }

    /// Write a refined copy of contract `id` as a new record
    pub async fn refine(&self, id: ContractId, instructions: &str) -> Result<GeneratedContract> {
        require_text("refinement_instructions", instructions)?;
        self.refinement.refine(id, instructions).await
    }

    pub async fn health(&self) -> HealthReport {
        let backend = self.backend();
        HealthReport {
            status: "healthy".to_string(),
            backend_reachable: backend.probe().await,
            model: backend.model().to_string(),
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ContractError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
