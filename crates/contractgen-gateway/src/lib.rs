//! Contractgen Gateway - HTTP API for the contract pipeline
//!
//! Maps REST routes onto [`contractgen_core::ContractService`].
//!
//! # Routes
//!
//! ```text
//! GET  /                   liveness message
//! GET  /health             backend probe + model
//! POST /contracts/         create   {title, description}
//! GET  /contracts/         list
//! GET  /contracts/{id}     get
//! POST /contracts/refine/  refine   {contract_id, refinement_instructions}
//! ```

pub mod config;
pub mod error;
pub mod gateway;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayState};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
