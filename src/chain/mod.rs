//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! ChainConfig (RPC URLs, pallet mappings)
//!     → evm.rs (RPC connection with timeouts and failover)
//!     → client.rs (ChainClient contract: headers, blocks, events, submission)
//!     → scanner / dispatcher
//!
//! Signer keys (hex or environment)
//!     → wallet.rs (signing credentials, no nonce state)
//! ```
//!
//! # Security Constraints
//! - Private keys only from explicit hex strings or environment variables
//! - Never log private keys
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod evm;
pub mod types;
pub mod wallet;

pub use client::{AccountSigner, ChainClient, HeaderSubscription, StatusStream};
pub use evm::EvmChainClient;
pub use types::{
    BlockHash, ChainError, ChainEvent, ChainResult, DispatchError, ErrorMetadata, EventField,
    Extrinsic, Header, Identity, ModuleError, Phase, TxHash, TxStatus,
};
pub use wallet::Wallet;
