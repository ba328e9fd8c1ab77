//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the correlator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the correlator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Chain connection settings.
    pub chain: ChainConfig,

    /// Correlation session settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g. 31337 for a local Anvil node).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Header polling interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Consecutive failed polls tolerated before the subscription errors out.
    pub max_poll_retries: u32,

    /// Slot duration override in milliseconds. Derived from block timestamps when unset.
    pub slot_duration_ms: Option<u64>,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Contracts whose logs are exposed as pallet events.
    pub pallets: Vec<PalletConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 10,
            poll_interval_ms: 1000,
            max_poll_retries: 5,
            slot_duration_ms: None,
            max_gas_price_gwei: 500,
            pallets: Vec::new(),
        }
    }
}

/// Maps one contract onto a pallet name and its event signatures.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PalletConfig {
    /// Section name events from this contract are reported under.
    pub name: String,

    /// Contract address.
    pub address: String,

    /// Event signatures, e.g. `IdentityCreated(address,bytes32)`.
    #[serde(default)]
    pub events: Vec<String>,
}

/// Correlation session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall-clock listen budget in milliseconds, converted to blocks per session.
    pub listen_timeout_ms: u64,

    /// Methods in the watched pallet that never fail a session.
    pub informational_methods: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_timeout_ms: 3 * 60 * 1000,
            informational_methods: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
