//! Session-level errors.

use thiserror::Error;

use crate::chain::types::{ChainError, Identity};
use crate::matcher::UnexpectedEvent;

/// Why a correlation session rejected.
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// An event in the watched pallet fell outside the expected method set.
    #[error(transparent)]
    UnexpectedEvent(#[from] UnexpectedEvent),

    /// The block budget ran out before every expected event was found.
    #[error(
        "timed out after {waited_blocks} blocks (budget {timeout_blocks}) waiting for {expected}: \
         found {found} of {requested}, missing signers [{missing}]; \
         check that the off-chain worker is running and the chain is producing blocks",
        missing = join_identities(.missing_signers)
    )]
    CorrelationTimeout {
        /// Watched pallet and methods.
        expected: String,
        /// Events the session was waiting for.
        requested: usize,
        /// Events found before giving up.
        found: usize,
        /// Block budget.
        timeout_blocks: u64,
        /// Blocks observed past the session start.
        waited_blocks: u64,
        /// Signers with no attributed event.
        missing_signers: Vec<Identity>,
    },

    /// The caller cancelled the session.
    #[error("session cancelled after {found} of {requested} events")]
    Cancelled { found: usize, requested: usize },

    /// The header subscription ended while events were outstanding.
    #[error("header subscription closed with {outstanding} events outstanding")]
    SubscriptionClosed { outstanding: usize },

    /// The listen budget cannot be expressed in blocks.
    #[error("invalid listen budget: {0}")]
    InvalidBudget(String),

    /// A chain call failed.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

impl CorrelationError {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            CorrelationError::UnexpectedEvent(_) => "unexpected_event",
            CorrelationError::CorrelationTimeout { .. } => "timeout",
            CorrelationError::Cancelled { .. } => "cancelled",
            CorrelationError::SubscriptionClosed { .. } => "subscription_closed",
            CorrelationError::InvalidBudget(_) => "invalid_budget",
            CorrelationError::Chain(_) => "chain_error",
        }
    }
}

fn join_identities(ids: &[Identity]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
