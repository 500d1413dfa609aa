//! Error types for the Gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contractgen_core::ContractError;
use thiserror::Error;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<contractgen_core::ConfigError> for GatewayError {
    fn from(e: contractgen_core::ConfigError) -> Self {
        GatewayError::InvalidConfig(e.to_string())
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Contract(ContractError::NotFound { .. }) => StatusCode::NOT_FOUND,
            GatewayError::Contract(ContractError::InvalidInput(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GatewayError::Contract(ContractError::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Contract(ContractError::Generation(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        }

        let detail = match &self {
            GatewayError::Contract(ContractError::NotFound { .. }) => {
                "Contract not found".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Result type for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
