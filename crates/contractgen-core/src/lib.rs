//! Contractgen Core - the contract generation pipeline
//!
//! Turns a free-form description into a stored contract by delegating the
//! drafting to a locally hosted language model, and refines stored contracts
//! into new versions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ContractService                      │
//! │        create / get / list / refine / health             │
//! ├──────────────────────────────────────────────────────────┤
//! │   RefinementWorkflow ──┐                                 │
//! │                        ▼                                 │
//! │   GenerationOrchestrator (timeouts, pull-on-miss,        │
//! │                           fallback or strict mode)       │
//! │                        │                                 │
//! │                        ▼                                 │
//! │   ModelBackend (OllamaClient)      ContractStore         │
//! │   probe / generate / pull          memory | sqlite | redis│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `StartupSequencer` initialises the store, probes the backend and schedules
//! a background warm-up generation without delaying readiness.
//!
//! # Quick Start
//!
//! ```no_run
//! use contractgen_core::{ContractService, PipelineConfig};
//!
//! # async fn example() -> contractgen_core::Result<()> {
//! let config = PipelineConfig::from_env()?;
//! let service = ContractService::from_config(&config).await?;
//! let created = service.create("NDA", "Mutual NDA between two startups").await?;
//! println!("stored contract {}", created.record.id);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod refinement;
pub mod service;
pub mod startup;
pub mod store;
pub mod types;

pub use backend::{GenerateOptions, ModelBackend, OllamaClient, ScriptedBackend};
pub use config::{PipelineConfig, StoreBackend};
pub use error::{ConfigError, ContractError, GenerationError, Result, StoreError};
pub use orchestrator::{GenerationOrchestrator, GenerationOutcome, FALLBACK_MARKER};
pub use refinement::RefinementWorkflow;
pub use service::{
    ContractService, GeneratedContract, GenerationReport, GenerationStatus, HealthReport,
};
pub use startup::{StartupReport, StartupSequencer};
pub use store::{ContractStore, InMemoryContractStore, RedisContractStore, SqliteContractStore};
pub use types::{ContractId, ContractRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
