//! Error types for the contract generation pipeline
//!
//! Three layers, each a `thiserror` enum:
//! - [`GenerationError`]: the model backend failed. Recovered by the
//!   orchestrator's fallback policy unless strict mode is on.
//! - [`StoreError`]: persistence failed. Always a hard failure.
//! - [`ContractError`]: what the service surface reports to callers.

use std::time::Duration;
use thiserror::Error;

use crate::types::ContractId;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ContractError>;

/// Failures of the model backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend timed out after {0:?}")]
    BackendTimeout(Duration),

    #[error("Backend error (HTTP {status}): {body}")]
    BackendError { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
}

impl GenerationError {
    /// Whether the backend rejected the request because the model is not installed.
    ///
    /// Matches both `model not found` and the `model 'name' not found` form.
    pub fn is_model_missing(&self) -> bool {
        match self {
            GenerationError::BackendError { body, .. } => {
                let body = body.to_lowercase();
                body.contains("model not found")
                    || (body.contains("model") && body.contains("not found"))
            }
            _ => false,
        }
    }

    /// Short human readable label used in fallback content and logs
    pub fn summary(&self) -> &'static str {
        match self {
            GenerationError::BackendUnavailable(_) => "Backend unavailable",
            GenerationError::BackendTimeout(_) => "Request timed out",
            GenerationError::BackendError { .. } => "Backend API error",
            GenerationError::InvalidResponse(_) => "Invalid backend response",
            GenerationError::UnsupportedProvider(_) => "Unsupported provider",
        }
    }
}

/// Failures of the contract store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored contract {id} is corrupt: {reason}")]
    Corrupt { id: ContractId, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(format!("store task failed: {}", e))
    }
}

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors reported by the service surface
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Contract not found: {id}")]
    NotFound { id: ContractId },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
