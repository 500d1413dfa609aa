//! Generation Orchestrator
//!
//! Wraps a [`ModelBackend`] with the generation policy:
//!
//! 1. Build the contract prompt around the caller's description.
//! 2. Generate under the configured timeout.
//! 3. If the backend says the model is missing, pull it once and retry once.
//! 4. Any remaining failure becomes [`GenerationOutcome::Degraded`] carrying
//!    marked fallback content, or is returned as an error in strict mode.
//!
//! There is no retry loop here; retries belong to the calling client.

use std::sync::Arc;

use crate::backend::{GenerateOptions, ModelBackend};
use crate::config::PipelineConfig;
use crate::error::GenerationError;

/// Fixed text present in every fallback contract and never added to generated output
pub const FALLBACK_MARKER: &str = "Using fallback contract for:";

/// Number of description characters echoed in fallback content
const FALLBACK_PREFIX_CHARS: usize = 100;

/// Result of a generation attempt that did not hard-fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Text produced by the model
    Generated(String),
    /// Placeholder text produced because the backend failed
    Degraded {
        content: String,
        reason: GenerationError,
    },
}

impl GenerationOutcome {
    pub fn content(&self) -> &str {
        match self {
            GenerationOutcome::Generated(content) => content,
            GenerationOutcome::Degraded { content, .. } => content,
        }
    }

    pub fn into_content(self) -> String {
        match self {
            GenerationOutcome::Generated(content) => content,
            GenerationOutcome::Degraded { content, .. } => content,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, GenerationOutcome::Degraded { .. })
    }

    /// Backend failure behind a degraded outcome
    pub fn reason(&self) -> Option<&GenerationError> {
        match self {
            GenerationOutcome::Generated(_) => None,
            GenerationOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Turns descriptions into contract text via the model backend
#[derive(Clone)]
pub struct GenerationOrchestrator {
    backend: Arc<dyn ModelBackend>,
    options: GenerateOptions,
    strict: bool,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("model", &self.backend.model())
            .field("options", &self.options)
            .field("strict", &self.strict)
            .finish()
    }
}

impl GenerationOrchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>, options: GenerateOptions, strict: bool) -> Self {
        Self {
            backend,
            options,
            strict,
        }
    }

    pub fn from_config(backend: Arc<dyn ModelBackend>, config: &PipelineConfig) -> Self {
        Self::new(
            backend,
            GenerateOptions {
                timeout: config.generate_timeout(),
            },
            config.strict,
        )
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Generate a contract for `description`.
    ///
    /// Only returns `Err` in strict mode; otherwise backend failures come back
    /// as [`GenerationOutcome::Degraded`].
    pub async fn generate_contract(
        &self,
        description: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        let prompt = build_prompt(description);

        match self.backend.generate(&prompt, &self.options).await {
            Ok(content) => Ok(GenerationOutcome::Generated(content)),
            Err(err) if err.is_model_missing() => {
                let model = self.backend.model().to_string();
                tracing::warn!(model = %model, "Model not found on backend, attempting to pull");

                if let Err(pull_err) = self.backend.ensure_model_present(&model).await {
                    tracing::warn!(model = %model, "Model pull failed: {}", pull_err);
                }

                match self.backend.generate(&prompt, &self.options).await {
                    Ok(content) => Ok(GenerationOutcome::Generated(content)),
                    Err(retry_err) => self.degrade(description, retry_err),
                }
            }
            Err(err) => self.degrade(description, err),
        }
    }

    fn degrade(
        &self,
        description: &str,
        reason: GenerationError,
    ) -> Result<GenerationOutcome, GenerationError> {
        if self.strict {
            tracing::error!("Generation failed (strict mode): {}", reason);
            return Err(reason);
        }

        tracing::warn!("Generation failed, returning fallback content: {}", reason);
        Ok(GenerationOutcome::Degraded {
            content: fallback_content(description, &reason),
            reason,
        })
    }
}

/// Contract drafting prompt around `description`
pub fn build_prompt(description: &str) -> String {
    format!(
        "You are a legal expert specializing in contract generation. \
Create a comprehensive and legally sound contract based on the following description:

{description}

The contract should include all necessary legal clauses, terms, and conditions appropriate for this type of agreement.
Format the contract professionally with proper sections, numbering, and legal terminology.
"
    )
}

/// Placeholder contract text for a failed generation of `description`
pub fn fallback_content(description: &str, reason: &GenerationError) -> String {
    let prefix: String = description.chars().take(FALLBACK_PREFIX_CHARS).collect();
    format!("{}. {} {}...", reason.summary(), FALLBACK_MARKER, prefix)
}
