//! HTTP client for the contract generation API
//!
//! Every call goes through [`ApiClient::with_retries`] with a fixed delay
//! between attempts. Refused connections and server errors are retried.
//! Client errors (404, 422, ...) are returned at once. A timeout or broken
//! response is retried only for reads: a `create` or `refine` that timed out
//! may still be running on the server, and sending it again would store a
//! duplicate contract.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A stored contract as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Present on create/refine responses only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<Generation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Contract {
    pub fn is_degraded(&self) -> bool {
        self.generation
            .as_ref()
            .map(|g| g.status == "degraded")
            .unwrap_or(false)
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Contract not found")]
    NotFound,

    #[error("API returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Could not connect: {0}")]
    Connect(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether another attempt could succeed without repeating work the
    /// server may already have done. `idempotent` marks reads.
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            ApiError::NotFound | ApiError::Decode(_) => false,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Connect(_) => true,
            ApiError::Timeout(_) | ApiError::Transport(_) => idempotent,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ApiError::Connect(e.to_string())
        } else if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Fixed-delay retry budget
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

/// Default wait for create/refine. The server may spend a generation, a
/// model pull and a second generation (300s + 600s + 300s by default).
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(1500);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    generate_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            generate_timeout: DEFAULT_GENERATE_TIMEOUT,
        })
    }

    /// How long create/refine wait for the server
    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Value, ApiError> {
        self.with_retries("health", true, || {
            self.request(Method::GET, "/health", None, HEALTH_TIMEOUT)
        })
        .await
    }

    pub async fn create(&self, title: &str, description: &str) -> Result<Contract, ApiError> {
        let body = serde_json::json!({ "title": title, "description": description });
        self.with_retries("create", false, || {
            self.request(Method::POST, "/contracts/", Some(&body), self.generate_timeout)
        })
        .await
    }

    pub async fn get(&self, id: u64) -> Result<Contract, ApiError> {
        let path = format!("/contracts/{}", id);
        self.with_retries("get", true, || {
            self.request(Method::GET, &path, None, READ_TIMEOUT)
        })
        .await
    }

    /// Single attempt, used for the preview after refine gives up
    pub async fn get_once(&self, id: u64) -> Result<Contract, ApiError> {
        let path = format!("/contracts/{}", id);
        self.request(Method::GET, &path, None, HEALTH_TIMEOUT).await
    }

    pub async fn list(&self) -> Result<Vec<Contract>, ApiError> {
        self.with_retries("list", true, || {
            self.request(Method::GET, "/contracts/", None, READ_TIMEOUT)
        })
        .await
    }

    pub async fn refine(&self, id: u64, instructions: &str) -> Result<Contract, ApiError> {
        let body = serde_json::json!({
            "contract_id": id,
            "refinement_instructions": instructions,
        });
        self.with_retries("refine", false, || {
            self.request(
                Method::POST,
                "/contracts/refine/",
                Some(&body),
                self.generate_timeout,
            )
        })
        .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail: error_detail(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Run `call` until it succeeds, fails permanently, or the budget is spent.
    /// Pass `idempotent = false` for calls that create records.
    pub async fn with_retries<T, F, Fut>(
        &self,
        label: &str,
        idempotent: bool,
        mut call: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            tracing::debug!(attempt, attempts, "{} request", label);
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable(idempotent) || attempt >= attempts => {
                    if e.is_retryable(idempotent) {
                        tracing::error!("{} failed after {} attempts", label, attempts);
                    }
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label,
                        attempt,
                        attempts,
                        e,
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// The `detail` field of an error body, or the raw body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_millis(10),
        }
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/contracts/:id",
            get(move |Path(_id): Path<u64>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (AxumStatus::NOT_FOUND, Json(json!({ "detail": "Contract not found" })))
                }
            }),
        );
        let client = ApiClient::new(&spawn(app).await, fast_policy(5)).unwrap();

        let err = client.get(9).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_until_success() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/contracts/refine/",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err((AxumStatus::SERVICE_UNAVAILABLE, "busy"));
                    }
                    Ok(Json(json!({
                        "id": 2,
                        "title": "A (Refined)",
                        "content": "refined",
                        "created_at": "2024-01-01T00:00:00Z",
                        "generation": { "status": "generated" }
                    })))
                }
            }),
        );
        let client = ApiClient::new(&spawn(app).await, fast_policy(5)).unwrap();

        let contract = client.refine(1, "shorter").await.unwrap();
        assert_eq!(contract.id, 2);
        assert!(!contract.is_degraded());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/contracts/",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        AxumStatus::SERVICE_UNAVAILABLE,
                        Json(json!({ "detail": "Store unavailable: down" })),
                    )
                }
            }),
        );
        let client = ApiClient::new(&spawn(app).await, fast_policy(3)).unwrap();

        let err = client.list().await.unwrap_err();
        match err {
            ApiError::Status { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail, "Store unavailable: down");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unprocessable_is_not_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/contracts/",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        AxumStatus::UNPROCESSABLE_ENTITY,
                        Json(json!({ "detail": "Invalid input: title must not be empty" })),
                    )
                }
            }),
        );
        let client = ApiClient::new(&spawn(app).await, fast_policy(5)).unwrap();

        let err = client.create(" ", "desc").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 422, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_api_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            ApiClient::new(&format!("http://127.0.0.1:{}", port), fast_policy(2)).unwrap();
        assert!(matches!(client.health().await, Err(ApiError::Connect(_))));
        assert!(matches!(
            client.create("A", "desc").await,
            Err(ApiError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_create_is_sent_once() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/contracts/",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Json(json!({ "id": 1, "title": "A", "content": "late" }))
                }
            }),
        );
        let client = ApiClient::new(&spawn(app).await, fast_policy(5))
            .unwrap()
            .with_generate_timeout(Duration::from_millis(100));

        let err = client.create("A", "desc").await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)), "got {err}");
        // Let a wrongly retried request reach the server before counting
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_timeouts_retried_for_reads_only() {
        let timeout = ApiError::Timeout("deadline".into());
        assert!(timeout.is_retryable(true));
        assert!(!timeout.is_retryable(false));
        assert!(ApiError::Connect("refused".into()).is_retryable(false));
        let unavailable = ApiError::Status {
            status: 503,
            detail: "busy".into(),
        };
        assert!(unavailable.is_retryable(false));
        assert!(!ApiError::NotFound.is_retryable(true));
    }

    #[test]
    fn test_default_generate_timeout_exceeds_server_worst_case() {
        assert!(DEFAULT_GENERATE_TIMEOUT > Duration::from_secs(300 + 600 + 300));
    }

    #[test]
    fn test_error_detail_falls_back_to_raw_body() {
        assert_eq!(error_detail(r#"{"detail":"nope"}"#), "nope");
        assert_eq!(error_detail("plain text"), "plain text");
    }
}
