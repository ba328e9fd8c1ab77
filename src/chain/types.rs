//! Chain data types and error definitions.

use alloy::hex;
use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Re-export ChainConfig from config module to avoid duplication
pub use crate::config::schema::ChainConfig;

/// Hash of a block.
pub type BlockHash = B256;

/// Hash of an extrinsic (transaction).
pub type TxHash = B256;

/// Public identity of an account as it appears inside event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub Bytes);

impl Identity {
    /// Build an identity from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Raw identity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// EVM accounts appear in logs as left-padded 32-byte words.
impl From<Address> for Identity {
    fn from(address: Address) -> Self {
        Self::from_slice(address.into_word().as_slice())
    }
}

impl From<[u8; 32]> for Identity {
    fn from(raw: [u8; 32]) -> Self {
        Self::from_slice(&raw)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_prefixed(&self.0))
    }
}

/// A block header as delivered by the header subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Block height.
    pub height: u64,
    /// Block hash.
    pub hash: BlockHash,
    /// Parent block hash.
    pub parent_hash: BlockHash,
}

/// An extrinsic in a block, by canonical position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extrinsic {
    /// Index of the extrinsic within its block.
    pub index: u32,
    /// Extrinsic hash.
    pub hash: TxHash,
}

/// When an event was emitted relative to block execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Emitted while applying the extrinsic at this index.
    ApplyExtrinsic(u32),
    /// Emitted during block finalization.
    Finalization,
    /// Emitted during block initialization.
    Initialization,
}

/// One field of an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventField {
    /// A single encoded value.
    Value(Bytes),
    /// A sequence of encoded values (e.g. a list of accounts).
    Sequence(Vec<Bytes>),
}

impl EventField {
    /// Whether this field is, or contains, the given identity.
    pub fn contains(&self, identity: &Identity) -> bool {
        match self {
            EventField::Value(value) => *value == identity.0,
            EventField::Sequence(values) => values.iter().any(|v| *v == identity.0),
        }
    }
}

/// An event read from a block's event snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Emitting pallet (module) name.
    pub section: String,
    /// Event name within the pallet.
    pub method: String,
    /// Payload fields, opaque to the correlator.
    pub data: Vec<EventField>,
    /// Execution phase the event was emitted in.
    pub phase: Phase,
}

impl ChainEvent {
    /// Index of the extrinsic that emitted this event, if any.
    pub fn extrinsic_index(&self) -> Option<u32> {
        match self.phase {
            Phase::ApplyExtrinsic(index) => Some(index),
            _ => None,
        }
    }

    /// Whether any payload field mentions the identity.
    pub fn mentions(&self, identity: &Identity) -> bool {
        self.data.iter().any(|field| field.contains(identity))
    }
}

/// A raw runtime module error as reported alongside inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleError {
    /// Index of the failing module.
    pub index: u8,
    /// Module-specific error code.
    pub error: [u8; 4],
}

/// Error metadata resolved from the chain's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMetadata {
    /// Module name.
    pub section: String,
    /// Error variant name.
    pub name: String,
    /// Documentation lines.
    pub docs: Vec<String>,
}

/// Runtime failure of an included extrinsic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A module error that the registry may be able to decode.
    Module(ModuleError),
    /// Any other failure, as reported.
    Other(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Module(e) => {
                write!(f, "Module {{ index: {}, error: {} }}", e.index, hex::encode_prefixed(e.error))
            }
            DispatchError::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Transaction pool status reported while watching a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Accepted into the pool.
    Ready,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a block, possibly with a runtime failure.
    InBlock {
        block_hash: BlockHash,
        tx_hash: TxHash,
        dispatch_error: Option<DispatchError>,
    },
    /// The including block was finalized.
    Finalized { block_hash: BlockHash, tx_hash: TxHash },
    /// Rejected by the pool.
    Invalid(String),
    /// Dropped from the pool.
    Dropped(String),
    /// Replaced by another transaction with the same nonce.
    Usurped(TxHash),
}

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// A block referenced by a header could not be fetched.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// The chain reported a slot duration the budget cannot be derived from.
    #[error("Invalid slot duration: {0}")]
    InvalidSlotDuration(String),

    /// The header subscription failed.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// The client was built from settings it cannot use.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
