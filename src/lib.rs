//! Transaction-to-event correlation engine.
//!
//! Submits batches of independently signed, explicitly nonced transactions,
//! then watches the block stream and attributes each resulting domain event
//! to the signer that caused it, returning events in the caller's signer order.
//!
//! ```text
//! caller → dispatch (fire units) → scanner (headers → blocks + events)
//!        → matcher (filter, attribute, order) → caller
//!          └── session supervises the scan/match loop: budget, cancel, teardown
//! ```

pub mod chain;
pub mod config;
pub mod dispatch;
pub mod matcher;
pub mod observability;
pub mod resilience;
pub mod scanner;
pub mod session;

pub use chain::{ChainClient, EvmChainClient, Identity, Wallet};
pub use config::schema::CorrelatorConfig;
pub use dispatch::{Dispatcher, SubmissionOutcome, SubmissionUnit};
pub use matcher::{CorrelationResult, MatchTier, MatchedEvent};
pub use session::{CancelToken, CorrelationError, CorrelationRequest, Correlator};
