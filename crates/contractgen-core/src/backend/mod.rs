//! Model Backend Client
//!
//! Thin RPC seam to the inference service. The orchestrator only sees the
//! [`ModelBackend`] trait, so tests can substitute a scripted backend.

pub mod ollama;
pub mod scripted;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::GenerationError;

pub use ollama::OllamaClient;
pub use scripted::ScriptedBackend;

/// Per-call generation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Upper bound on the whole call, including reading the body
    pub timeout: Duration,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
        }
    }
}

/// An inference backend
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model identifier this backend generates with
    fn model(&self) -> &str;

    /// Lightweight no-generation reachability check. Never fails, only reports.
    async fn probe(&self) -> bool;

    /// Generate text for `prompt`, bounded by `options.timeout`
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GenerationError>;

    /// Ask the backend to acquire `model`. Slow; bounded by its own, longer timeout.
    async fn ensure_model_present(&self, model: &str) -> Result<(), GenerationError>;
}

/// Build the backend named by `config.provider`
pub fn from_config(config: &PipelineConfig) -> Result<Arc<dyn ModelBackend>, GenerationError> {
    match config.provider.trim().to_lowercase().as_str() {
        "ollama" => Ok(Arc::new(OllamaClient::new(config)?)),
        other => Err(GenerationError::UnsupportedProvider(other.to_string())),
    }
}

/// Collapse the backend's response envelopes into plain text.
///
/// Chat-style bodies (`{"message": {"content": ...}}`) win over completion
/// bodies (`{"response": ...}`); a missing field yields empty text.
pub fn normalize_response(body: &serde_json::Value) -> String {
    if let Some(message) = body.get("message") {
        return message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();
    }

    body.get("response")
        .and_then(|r| r.as_str())
        .unwrap_or("")
        .to_string()
}
