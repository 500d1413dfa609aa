//! Main Gateway implementation
//!
//! Axum router over the contract service. Handlers stay thin: they parse the
//! request, call [`ContractService`], and let [`GatewayError`] pick the status.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use contractgen_core::{
    ContractId, ContractRecord, ContractService, GeneratedContract, StartupReport,
    StartupSequencer,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::{GatewayError, Result};

/// Body of `POST /contracts/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContractRequest {
    pub title: String,
    pub description: String,
}

/// Body of `POST /contracts/refine/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineContractRequest {
    pub contract_id: ContractId,
    pub refinement_instructions: String,
}

/// Gateway state shared across handlers
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub service: ContractService,
}

/// Main Gateway
#[derive(Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway around an already built service
    pub fn new(config: GatewayConfig, service: ContractService) -> Self {
        Self {
            state: Arc::new(GatewayState { config, service }),
        }
    }

    /// Build the service described by `config.pipeline`
    pub async fn from_config(config: GatewayConfig) -> Result<Self> {
        let service = ContractService::from_config(&config.pipeline).await?;
        Ok(Self::new(config, service))
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(Self::handle_index))
            .route("/health", get(Self::handle_health))
            .route(
                "/contracts",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route(
                "/contracts/",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route("/contracts/refine", post(Self::handle_refine))
            .route("/contracts/refine/", post(Self::handle_refine))
            .route("/contracts/:id", get(Self::handle_get))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the startup sequence without serving
    pub async fn startup(&self) -> Result<StartupReport> {
        let warmup = self.state.config.pipeline.warmup;
        Ok(StartupSequencer::new(self.state.service.clone(), warmup)
            .run()
            .await?)
    }

    /// Start the gateway server. Returns after Ctrl+C.
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Contract Generation API listening on {}", addr);

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Run startup, then serve on `listener` until `shutdown` resolves.
    ///
    /// The port is already held while the backend probe runs (at most
    /// `probe_timeout_secs`); clients connecting meanwhile wait in the
    /// accept backlog instead of being refused.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.startup().await?;

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))
    }

    // HTTP handlers

    async fn handle_index() -> impl IntoResponse {
        Json(serde_json::json!({
            "message": "Contract Generation API is running"
        }))
    }

    async fn handle_health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(state.service.health().await)
    }

    async fn handle_create(
        State(state): State<Arc<GatewayState>>,
        Json(request): Json<CreateContractRequest>,
    ) -> Result<Json<GeneratedContract>> {
        let created = state
            .service
            .create(&request.title, &request.description)
            .await?;
        Ok(Json(created))
    }

    async fn handle_list(
        State(state): State<Arc<GatewayState>>,
    ) -> Result<Json<Vec<ContractRecord>>> {
        Ok(Json(state.service.list().await?))
    }

    async fn handle_get(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<ContractId>,
    ) -> Result<Json<ContractRecord>> {
        Ok(Json(state.service.get(id).await?))
    }

    async fn handle_refine(
        State(state): State<Arc<GatewayState>>,
        Json(request): Json<RefineContractRequest>,
    ) -> Result<Json<GeneratedContract>> {
        let refined = state
            .service
            .refine(request.contract_id, &request.refinement_instructions)
            .await?;
        Ok(Json(refined))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Gateway shutdown initiated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractgen_core::{
        GenerateOptions, GenerationOrchestrator, InMemoryContractStore, ScriptedBackend,
    };
    use std::time::{Duration, Instant};

    fn gateway() -> Gateway {
        let orchestrator = GenerationOrchestrator::new(
            Arc::new(ScriptedBackend::new()),
            GenerateOptions::default(),
            false,
        );
        let service = ContractService::new(Arc::new(InMemoryContractStore::new()), orchestrator);
        Gateway::new(GatewayConfig::default(), service)
    }

    #[test]
    fn test_gateway_creation() {
        let gateway = gateway();
        assert_eq!(gateway.state().config.port, crate::DEFAULT_PORT);
    }

    #[tokio::test]
    async fn test_startup_without_warmup() {
        let mut config = GatewayConfig::default();
        config.pipeline.warmup = false;
        let gateway = Gateway::new(config, gateway().state().service.clone());

        let report = gateway.startup().await.unwrap();
        assert!(report.backend_reachable);
        assert!(report.warmup.is_none());
    }

    #[tokio::test]
    async fn test_port_is_held_while_startup_runs() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let backend = Arc::new(ScriptedBackend::new().with_probe_delay(Duration::from_millis(300)));
        let orchestrator =
            GenerationOrchestrator::new(backend, GenerateOptions::default(), false);
        let service = ContractService::new(Arc::new(InMemoryContractStore::new()), orchestrator);
        let mut config = GatewayConfig::default();
        config.pipeline.warmup = false;
        let gateway = Gateway::new(config, service);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            gateway
                .serve(listener, async {
                    stopped.await.ok();
                })
                .await
        });

        // Connects while the probe is still running, answered once it finishes
        let started = Instant::now();
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"), "got {}", response);
        assert!(response.contains("Contract Generation API is running"));
        assert!(started.elapsed() >= Duration::from_millis(250));

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn test_refine_request_field_names() {
        let request: RefineContractRequest = serde_json::from_str(
            r#"{"contract_id": 4, "refinement_instructions": "add a non-compete"}"#,
        )
        .unwrap();
        assert_eq!(request.contract_id, 4);
        assert_eq!(request.refinement_instructions, "add a non-compete");
    }
}
