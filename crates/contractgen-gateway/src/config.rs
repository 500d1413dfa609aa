//! Gateway configuration

use contractgen_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::{GatewayError, DEFAULT_HOST, DEFAULT_PORT};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Generation pipeline and store
    pub pipeline: PipelineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Apply pipeline variables from the process environment on top of this config
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        self.pipeline = self.pipeline.overlay(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                GatewayError::InvalidConfig(format!(
                    "bad listen address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractgen_core::StoreBackend;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8000");
        assert_eq!(config.pipeline.model, "mistral:7b");
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let config = GatewayConfig::default().with_host("not a host");
        assert!(matches!(
            config.socket_addr(),
            Err(GatewayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_file_roundtrip_keeps_store_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");

        let config = GatewayConfig::default().with_port(9100).with_pipeline(
            PipelineConfig::default().with_store(StoreBackend::Sqlite {
                path: "data/contracts.db".into(),
            }),
        );
        config.to_file(&path).unwrap();

        let loaded = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(loaded.port, 9100);
        assert!(matches!(loaded.pipeline.store, StoreBackend::Sqlite { .. }));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(&path, r#"{ "port": 8081 }"#).unwrap();

        let loaded = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(loaded.port, 8081);
        assert_eq!(loaded.host, DEFAULT_HOST);
        assert_eq!(loaded.pipeline.provider, "ollama");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            GatewayConfig::from_file("/nonexistent/gateway.json"),
            Err(GatewayError::Io(_))
        ));
    }
}
