//! Explicit client configuration.
//!
//! Everything the original deployment kept as process-wide constants (the
//! program address, the RPC endpoint, the store credential, the gateway
//! base) is carried here and passed into each component at construction,
//! so tests can substitute ledger and store implementations freely.

use chaindrive_types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Connection settings for a chaindrive deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ledger RPC base URL.
    pub rpc_url: String,
    /// Address of the on-ledger file program.
    pub program: Address,
    /// Content store upload endpoint.
    pub store_endpoint: String,
    /// Content store API credential.
    pub store_api_key: String,
    /// Public gateway base for content retrieval.
    pub gateway_base: String,
}

impl ClientConfig {
    /// Load settings from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
