//! Startup Sequencer
//!
//! Store init, backend probe, then a fire-and-forget warm-up generation.
//! Only a store failure stops startup; a dead backend is logged and the
//! service still comes up for CRUD.
//!
//! The probe is awaited and bounded by `probe_timeout_secs`. Callers that
//! serve traffic bind their listener before calling [`StartupSequencer::run`].

use std::time::Instant;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::service::ContractService;

/// Prompt used for the warm-up generation
const WARMUP_PROMPT: &str = "Test";

/// What startup observed
#[derive(Debug)]
pub struct StartupReport {
    pub backend_reachable: bool,
    /// Handle of the background warm-up, if one was scheduled. Dropping it
    /// does not cancel the task.
    pub warmup: Option<JoinHandle<()>>,
}

/// Runs the startup steps against a [`ContractService`]
#[derive(Debug, Clone)]
pub struct StartupSequencer {
    service: ContractService,
    warmup: bool,
}

impl StartupSequencer {
    pub fn new(service: ContractService, warmup: bool) -> Self {
        Self { service, warmup }
    }

    pub async fn run(&self) -> Result<StartupReport> {
        let store = self.service.store();
        store.init().await?;
        tracing::info!(store = store.backend_tag(), "Contract store initialised");

        let backend = self.service.backend();
        let backend_reachable = backend.probe().await;
        if backend_reachable {
            tracing::info!(model = backend.model(), "Inference backend reachable");
        } else {
            tracing::warn!(
                model = backend.model(),
                "Inference backend not reachable; contracts will use fallback content until it is"
            );
        }

        let warmup = self.warmup.then(|| self.spawn_warmup());

        Ok(StartupReport {
            backend_reachable,
            warmup,
        })
    }

    fn spawn_warmup(&self) -> JoinHandle<()> {
        let orchestrator = self.service.orchestrator().clone();
        tokio::spawn(async move {
            let model = orchestrator.backend().model().to_string();
            tracing::info!(model = %model, "Warm-up generation started");
            let started = Instant::now();

            match orchestrator.generate_contract(WARMUP_PROMPT).await {
                Ok(outcome) if !outcome.is_degraded() => tracing::info!(
                    model = %model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Warm-up generation complete"
                ),
                Ok(outcome) => tracing::warn!(
                    model = %model,
                    "Warm-up generation degraded: {}",
                    outcome.reason().map(|r| r.to_string()).unwrap_or_default()
                ),
                Err(e) => tracing::warn!(model = %model, "Warm-up generation failed: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GenerateOptions, ScriptedBackend};
    use crate::error::GenerationError;
    use crate::orchestrator::GenerationOrchestrator;
    use crate::store::{ContractStore, InMemoryContractStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn service(backend: Arc<ScriptedBackend>, strict: bool) -> ContractService {
        let orchestrator = GenerationOrchestrator::new(
            backend,
            GenerateOptions {
                timeout: Duration::from_secs(10),
            },
            strict,
        );
        ContractService::new(Arc::new(InMemoryContractStore::new()), orchestrator)
    }

    #[tokio::test]
    async fn test_unreachable_backend_does_not_block_startup() {
        let backend = Arc::new(ScriptedBackend::failing(GenerationError::BackendUnavailable(
            "connection refused".into(),
        )));
        let service = service(backend, true);

        let report = StartupSequencer::new(service.clone(), true).run().await.unwrap();
        assert!(!report.backend_reachable);

        // Failure of the warm-up stays inside the task
        report.warmup.unwrap().await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_warmup_does_not_delay_readiness() {
        let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_secs(5)));
        let service = service(backend.clone(), false);

        let started = Instant::now();
        let report = StartupSequencer::new(service.clone(), true).run().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(report.backend_reachable);

        let created = service.store().save("A", "x").await.unwrap();
        assert_eq!(created, 1);

        report.warmup.unwrap().abort();
    }

    #[tokio::test]
    async fn test_warmup_disabled() {
        let backend = Arc::new(ScriptedBackend::new());
        let report = StartupSequencer::new(service(backend.clone(), false), false)
            .run()
            .await
            .unwrap();

        assert!(report.warmup.is_none());
        assert_eq!(backend.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_warmup_uses_trivial_prompt_and_stores_nothing() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone(), false);

        let report = StartupSequencer::new(service.clone(), true).run().await.unwrap();
        report.warmup.unwrap().await.unwrap();

        assert_eq!(backend.generate_calls(), 1);
        assert!(backend.prompts()[0].contains(WARMUP_PROMPT));
        assert!(service.list().await.unwrap().is_empty());
    }
}
