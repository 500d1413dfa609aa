//! Scripted in-process backend
//!
//! Replays queued replies instead of talking to a server. Used by the test
//! suites and for running the gateway without an inference service.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use super::{GenerateOptions, ModelBackend};
use crate::error::GenerationError;

/// Backend that answers from a reply queue
#[derive(Debug)]
pub struct ScriptedBackend {
    model: String,
    reachable: AtomicBool,
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    default_reply: Result<String, GenerationError>,
    pull_result: Result<(), GenerationError>,
    delay: Duration,
    probe_delay: Duration,
    prompts: Mutex<Vec<String>>,
    pulls: Mutex<Vec<String>>,
    generate_calls: AtomicU64,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            model: "scripted".to_string(),
            reachable: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            default_reply: Ok("GENERATED CONTRACT".to_string()),
            pull_result: Ok(()),
            delay: Duration::ZERO,
            probe_delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
            pulls: Mutex::new(Vec::new()),
            generate_calls: AtomicU64::new(0),
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose every generation fails with `error`
    pub fn failing(error: GenerationError) -> Self {
        Self {
            reachable: AtomicBool::new(false),
            default_reply: Err(error),
            ..Self::default()
        }
    }

    /// Reply used once the queue is empty
    pub fn with_default_reply(mut self, reply: Result<String, GenerationError>) -> Self {
        self.default_reply = reply;
        self
    }

    /// Outcome of every `ensure_model_present` call
    pub fn with_pull_result(mut self, result: Result<(), GenerationError>) -> Self {
        self.pull_result = result;
        self
    }

    /// Simulated generation latency. Calls whose timeout is shorter time out.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Simulated latency of the reachability probe
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Queue the reply for the next generation call
    pub fn push_reply(&self, reply: Result<String, GenerationError>) {
        self.replies.lock().push_back(reply);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Every model pull requested, in call order
    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().clone()
    }

    pub fn generate_calls(&self) -> u64 {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn probe(&self) -> bool {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.reachable.load(Ordering::SeqCst)
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GenerationError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        if !self.delay.is_zero() {
            if self.delay > options.timeout {
                tokio::time::sleep(options.timeout).await;
                return Err(GenerationError::BackendTimeout(options.timeout));
            }
            tokio::time::sleep(self.delay).await;
        }

        let queued = self.replies.lock().pop_front();
        queued.unwrap_or_else(|| self.default_reply.clone())
    }

    async fn ensure_model_present(&self, model: &str) -> Result<(), GenerationError> {
        self.pulls.lock().push(model.to_string());
        self.pull_result.clone()
    }
}
