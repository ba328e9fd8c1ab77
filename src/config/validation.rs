//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, URLs parse)
//! - Check pallet mappings (addresses parse, names unique)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CorrelatorConfig → Result<(), Vec<ValidationError>>

use alloy::primitives::Address;
use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::CorrelatorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &CorrelatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let chain = &config.chain;

    if chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("chain.rpc_url", format!("invalid URL '{}'", chain.rpc_url)));
    }
    for (i, failover) in chain.failover_urls.iter().enumerate() {
        if failover.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                format!("chain.failover_urls[{}]", i),
                format!("invalid URL '{}'", failover),
            ));
        }
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be greater than 0"));
    }
    if chain.poll_interval_ms == 0 {
        errors.push(ValidationError::new("chain.poll_interval_ms", "must be greater than 0"));
    }
    if chain.slot_duration_ms == Some(0) {
        errors.push(ValidationError::new("chain.slot_duration_ms", "must be greater than 0"));
    }

    let mut names = HashSet::new();
    for (i, pallet) in chain.pallets.iter().enumerate() {
        let field = format!("chain.pallets[{}]", i);
        if pallet.name.is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if !names.insert(pallet.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate pallet '{}'", pallet.name),
            ));
        }
        if pallet.address.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                format!("{}.address", field),
                format!("invalid address '{}'", pallet.address),
            ));
        }
        for signature in &pallet.events {
            if !is_event_signature(signature) {
                errors.push(ValidationError::new(
                    format!("{}.events", field),
                    format!("malformed event signature '{}'", signature),
                ));
            }
        }
    }

    if config.session.listen_timeout_ms == 0 {
        errors.push(ValidationError::new("session.listen_timeout_ms", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `Name(type,...)` with a non-empty name.
fn is_event_signature(signature: &str) -> bool {
    match signature.find('(') {
        Some(open) => open > 0 && signature.ends_with(')'),
        None => false,
    }
}
