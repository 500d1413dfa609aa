//! Refinement Workflow
//!
//! `get → compose prompt → generate → save` as one linear sequence. A new
//! record is written only after generation returned; the source record is
//! never touched.

use std::sync::Arc;

use crate::error::{ContractError, Result};
use crate::orchestrator::GenerationOrchestrator;
use crate::service::GeneratedContract;
use crate::store::ContractStore;
use crate::types::ContractId;

/// Produces new contract versions from existing ones
#[derive(Clone)]
pub struct RefinementWorkflow {
    store: Arc<dyn ContractStore>,
    orchestrator: GenerationOrchestrator,
}

impl std::fmt::Debug for RefinementWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementWorkflow")
            .field("store", &self.store.backend_tag())
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

impl RefinementWorkflow {
    pub fn new(store: Arc<dyn ContractStore>, orchestrator: GenerationOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Refine contract `contract_id` according to `instructions`.
    ///
    /// Fails with [`ContractError::NotFound`] before anything is generated or
    /// written when the source contract does not exist.
    pub async fn refine(
        &self,
        contract_id: ContractId,
        instructions: &str,
    ) -> Result<GeneratedContract> {
        let original = self
            .store
            .get(contract_id)
            .await?
            .ok_or(ContractError::NotFound { id: contract_id })?;

        let prompt = build_refinement_prompt(&original.content, instructions);
        let outcome = self.orchestrator.generate_contract(&prompt).await?;

        let record = self
            .store
            .save_and_fetch(&original.refined_title(), outcome.content())
            .await?;

        tracing::info!(
            source_id = contract_id,
            contract_id = record.id,
            degraded = outcome.is_degraded(),
            "Contract refined"
        );

        Ok(GeneratedContract::new(record, &outcome))
    }
}

/// Composite prompt: the original text verbatim, then the caller's instructions
pub fn build_refinement_prompt(original_content: &str, instructions: &str) -> String {
    format!(
        "Original Contract:
{original_content}

Refinement Instructions:
{instructions}

Please provide a complete, refined version of this contract that incorporates the refinement instructions.
Return the full standalone contract text, not a list of changes or a diff.
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerateOptions, ScriptedBackend};
    use crate::error::GenerationError;
    use crate::orchestrator::FALLBACK_MARKER;
    use crate::service::GenerationStatus;
    use crate::store::InMemoryContractStore;
    use std::time::Duration;

    fn workflow(
        store: Arc<InMemoryContractStore>,
        backend: Arc<ScriptedBackend>,
        strict: bool,
    ) -> RefinementWorkflow {
        let orchestrator = GenerationOrchestrator::new(
            backend,
            GenerateOptions {
                timeout: Duration::from_millis(200),
            },
            strict,
        );
        RefinementWorkflow::new(store, orchestrator)
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_refinement_prompt("ORIGINAL TEXT", "add termination clause");
        let original_at = prompt.find("ORIGINAL TEXT").unwrap();
        let heading_at = prompt.find("Refinement Instructions:").unwrap();
        let instructions_at = prompt.find("add termination clause").unwrap();
        let directive_at = prompt.find("complete, refined version").unwrap();

        assert!(original_at < heading_at);
        assert!(heading_at < instructions_at);
        assert!(instructions_at < directive_at);
        assert!(prompt.contains("not a list of changes or a diff"));
    }

    #[tokio::test]
    async fn test_refine_writes_new_record() {
        let store = Arc::new(InMemoryContractStore::new());
        store.save("A", "x").await.unwrap();
        store.save("B", "y").await.unwrap();

        let backend = Arc::new(ScriptedBackend::new());
        backend.push_reply(Ok("REFINED".into()));

        let refined = workflow(store.clone(), backend.clone(), false)
            .refine(1, "add termination clause")
            .await
            .unwrap();

        assert_eq!(refined.record.id, 3);
        assert_eq!(refined.record.title, "A (Refined)");
        assert_eq!(refined.record.content, "REFINED");
        assert_eq!(refined.generation.status, GenerationStatus::Generated);

        let original = store.get(1).await.unwrap().unwrap();
        assert_eq!((original.title.as_str(), original.content.as_str()), ("A", "x"));

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("Original Contract:\nx\n"));
        assert!(prompt.contains("add termination clause"));
    }

    #[tokio::test]
    async fn test_refine_missing_contract_writes_nothing() {
        let store = Arc::new(InMemoryContractStore::new());
        store.save("A", "x").await.unwrap();
        let backend = Arc::new(ScriptedBackend::new());

        let err = workflow(store.clone(), backend.clone(), false)
            .refine(99, "anything")
            .await
            .unwrap_err();

        assert!(matches!(err, ContractError::NotFound { id: 99 }));
        assert_eq!(store.len(), 1);
        assert_eq!(backend.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_refine_degraded_is_still_saved() {
        let store = Arc::new(InMemoryContractStore::new());
        store.save("A", "x").await.unwrap();
        let backend = Arc::new(ScriptedBackend::failing(GenerationError::BackendUnavailable(
            "connection refused".into(),
        )));

        let refined = workflow(store.clone(), backend, false)
            .refine(1, "shorten")
            .await
            .unwrap();

        assert_eq!(refined.generation.status, GenerationStatus::Degraded);
        assert!(refined.record.content.contains(FALLBACK_MARKER));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_strict_failure_writes_nothing() {
        let store = Arc::new(InMemoryContractStore::new());
        store.save("A", "x").await.unwrap();
        let backend = Arc::new(ScriptedBackend::failing(GenerationError::BackendUnavailable(
            "connection refused".into(),
        )));

        let err = workflow(store.clone(), backend, true)
            .refine(1, "shorten")
            .await
            .unwrap_err();

        assert!(matches!(err, ContractError::Generation(_)));
        assert_eq!(store.len(), 1);
    }
}
