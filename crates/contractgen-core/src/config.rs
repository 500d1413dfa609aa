//! Pipeline configuration
//!
//! Read once at process start (defaults, then environment) and handed to the
//! components that need it. Nothing reads the environment after that.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default inference backend URL
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "mistral:7b";

const DEFAULT_SQLITE_PATH: &str = "contracts.db";
const DEFAULT_REDIS_HOST: &str = "localhost";
const DEFAULT_REDIS_PORT: u16 = 6379;

/// Which contract store implementation to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map, lost on restart
    Memory,
    /// SQLite table at `path`
    Sqlite { path: PathBuf },
    /// Redis key-value store
    Redis { host: String, port: u16 },
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Memory
    }
}

impl StoreBackend {
    /// Connection URL for the Redis variant
    pub fn redis_url(&self) -> Option<String> {
        match self {
            StoreBackend::Redis { host, port } => Some(format!("redis://{}:{}", host, port)),
            _ => None,
        }
    }
}

/// Configuration for the generation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inference provider name (only `ollama` is supported)
    pub provider: String,

    /// Backend base URL
    pub ollama_host: String,

    /// Model identifier sent with every generation request
    pub model: String,

    /// Bound on a single generation call
    pub generate_timeout_secs: u64,

    /// Bound on a model pull
    pub pull_timeout_secs: u64,

    /// Bound on the reachability probe
    pub probe_timeout_secs: u64,

    /// Propagate backend failures instead of returning fallback content
    pub strict: bool,

    /// Schedule a background warm-up generation at startup
    pub warmup: bool,

    /// Bound on connecting to the store and on each store command (Redis)
    pub store_timeout_secs: u64,

    /// Contract store selection
    pub store: StoreBackend,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generate_timeout_secs: 300, // 5 minutes
            pull_timeout_secs: 600,     // 10 minutes
            probe_timeout_secs: 5,
            strict: false,
            warmup: true,
            store_timeout_secs: 5,
            store: StoreBackend::Memory,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(lookup)
    }

    /// Apply variables from `lookup` on top of `self`. Unset variables keep the current value.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("PROVIDER") {
            self.provider = provider;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama_host = host;
        }
        if let Some(model) = lookup("MODEL") {
            self.model = model;
        }
        if let Some(v) = lookup("CONTRACTGEN_GENERATE_TIMEOUT_SECS") {
            self.generate_timeout_secs = parse_value("CONTRACTGEN_GENERATE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CONTRACTGEN_PULL_TIMEOUT_SECS") {
            self.pull_timeout_secs = parse_value("CONTRACTGEN_PULL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CONTRACTGEN_PROBE_TIMEOUT_SECS") {
            self.probe_timeout_secs = parse_value("CONTRACTGEN_PROBE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CONTRACTGEN_STRICT") {
            self.strict = parse_bool("CONTRACTGEN_STRICT", &v)?;
        }
        if let Some(v) = lookup("CONTRACTGEN_WARMUP") {
            self.warmup = parse_bool("CONTRACTGEN_WARMUP", &v)?;
        }

        if let Some(v) = lookup("CONTRACTGEN_STORE_TIMEOUT_SECS") {
            self.store_timeout_secs = parse_value("CONTRACTGEN_STORE_TIMEOUT_SECS", &v)?;
        }

        if let Some(kind) = lookup("CONTRACTGEN_STORE") {
            self.store = match kind.trim().to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "sqlite" => StoreBackend::Sqlite {
                    path: PathBuf::from(DEFAULT_SQLITE_PATH),
                },
                "redis" => StoreBackend::Redis {
                    host: DEFAULT_REDIS_HOST.to_string(),
                    port: DEFAULT_REDIS_PORT,
                },
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "CONTRACTGEN_STORE".to_string(),
                        value: kind,
                        reason: "expected memory, sqlite or redis".to_string(),
                    })
                }
            };
        }

        // Location variables refine whichever store is selected, whether it
        // came from CONTRACTGEN_STORE above or from a config file.
        match &mut self.store {
            StoreBackend::Memory => {}
            StoreBackend::Sqlite { path } => {
                if let Some(v) = lookup("CONTRACTGEN_SQLITE_PATH") {
                    *path = PathBuf::from(v);
                }
            }
            StoreBackend::Redis { host, port } => {
                if let Some(v) = lookup("REDIS_HOST") {
                    *host = v;
                }
                if let Some(v) = lookup("REDIS_PORT") {
                    *port = parse_value("REDIS_PORT", &v)?;
                }
            }
        }

        Ok(self)
    }

    /// Set the backend URL
    pub fn with_ollama_host(mut self, host: impl Into<String>) -> Self {
        self.ollama_host = host.into();
        self
    }

    /// Set the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Enable or disable strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable or disable the startup warm-up
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    /// Select the store backend
    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    /// Set the generation timeout
    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout_secs = timeout.as_secs();
        self
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
