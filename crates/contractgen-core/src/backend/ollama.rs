//! Ollama backend (local models)
//!
//! Three RPCs:
//! - `GET  /api/tags`      reachability probe, no generation
//! - `POST /api/generate`  `{"model", "prompt", "stream": false}`
//! - `POST /api/pull`      `{"name", "stream": false}`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::{Duration, Instant};

use super::{normalize_response, GenerateOptions, ModelBackend};
use crate::config::PipelineConfig;
use crate::error::GenerationError;

/// HTTP client for an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    probe_timeout: Duration,
    pull_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .default_headers(Self::build_headers())
            .build()
            .map_err(|e| GenerationError::BackendUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.ollama_host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            probe_timeout: config.probe_timeout(),
            pull_timeout: config.pull_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// POST `body` to `path` and decode the JSON reply, all within `timeout`
    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, GenerationError> {
        let url = format!("{}{}", self.base_url, path);

        let call = async {
            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| classify(e, timeout))?;

            let status = resp.status();
            let text = resp.text().await.map_err(|e| classify(e, timeout))?;

            if !status.is_success() {
                return Err(GenerationError::BackendError {
                    status: status.as_u16(),
                    body: text,
                });
            }

            serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| GenerationError::InvalidResponse(e.to_string()))
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::BackendTimeout(timeout)),
        }
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> GenerationError {
    if e.is_timeout() {
        GenerationError::BackendTimeout(timeout)
    } else {
        GenerationError::BackendUnavailable(e.to_string())
    }
}

#[async_trait]
impl ModelBackend for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let call = self.client.get(&url).send();

        match tokio::time::timeout(self.probe_timeout, call).await {
            Ok(Ok(resp)) if resp.status().is_success() => true,
            Ok(Ok(resp)) => {
                tracing::debug!(status = resp.status().as_u16(), "Backend probe rejected");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!("Backend probe failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!("Backend probe timed out after {:?}", self.probe_timeout);
                false
            }
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        let start = Instant::now();

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let json_response = self.post_json("/api/generate", body, options.timeout).await?;
        let content = normalize_response(&json_response);

        tracing::info!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = content.len(),
            "Generation complete"
        );

        Ok(content)
    }

    async fn ensure_model_present(&self, model: &str) -> Result<(), GenerationError> {
        let start = Instant::now();
        tracing::info!(model, "Pulling model");

        let body = serde_json::json!({
            "name": model,
            "stream": false,
        });

        let reply = self.post_json("/api/pull", body, self.pull_timeout).await?;

        if let Some(error) = reply.get("error").and_then(|e| e.as_str()) {
            return Err(GenerationError::BackendError {
                status: 200,
                body: error.to_string(),
            });
        }

        tracing::info!(
            model,
            status = reply.get("status").and_then(|s| s.as_str()).unwrap_or("unknown"),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model pull finished"
        );
        Ok(())
    }
}
