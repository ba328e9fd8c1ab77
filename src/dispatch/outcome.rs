//! Submission inputs and per-unit outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::types::{BlockHash, TxHash};

/// One transaction ready to send, as assembled by the upstream builder.
///
/// The nonce is caller-assigned and unique per signer; the dispatcher never
/// re-derives it.
#[derive(Debug, Clone)]
pub struct SubmissionUnit<T> {
    /// Transaction payload.
    pub transaction: T,
    /// Explicit nonce to sign with.
    pub nonce: u64,
    /// Index into the signer credentials, wrapped round-robin.
    pub signer_ref: usize,
}

impl<T> SubmissionUnit<T> {
    /// Create a unit.
    pub fn new(transaction: T, nonce: u64, signer_ref: usize) -> Self {
        Self {
            transaction,
            nonce,
            signer_ref,
        }
    }

    /// Position of this unit's credential in a list of `signer_count` signers.
    pub fn signer_slot(&self, signer_count: usize) -> Option<usize> {
        (signer_count > 0).then(|| self.signer_ref % signer_count)
    }
}

/// A decoded runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchFailure {
    /// A module error resolved through the chain's registry.
    Module {
        module: String,
        name: String,
        docs: Vec<String>,
    },
    /// Any failure the registry could not resolve.
    Raw(String),
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchFailure::Module { module, name, docs } => {
                write!(f, "{}.{}", module, name)?;
                if !docs.is_empty() {
                    write!(f, ": {}", docs.join(" "))?;
                }
                Ok(())
            }
            DispatchFailure::Raw(reason) => write!(f, "{}", reason),
        }
    }
}

/// Terminal result of one submission. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    /// Included and executed successfully.
    Included { block_hash: BlockHash, tx_hash: TxHash },
    /// Included, but runtime execution failed.
    DispatchFailed {
        block_hash: BlockHash,
        tx_hash: TxHash,
        failure: DispatchFailure,
    },
    /// Never made it into a block.
    Rejected { reason: String },
}

impl SubmissionOutcome {
    /// Whether the unit was included and executed successfully.
    pub fn is_included(&self) -> bool {
        matches!(self, SubmissionOutcome::Included { .. })
    }

    /// Hash of the included extrinsic, if it reached a block.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            SubmissionOutcome::Included { tx_hash, .. }
            | SubmissionOutcome::DispatchFailed { tx_hash, .. } => Some(*tx_hash),
            SubmissionOutcome::Rejected { .. } => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Included { .. } => "included",
            SubmissionOutcome::DispatchFailed { .. } => "dispatch_failed",
            SubmissionOutcome::Rejected { .. } => "rejected",
        }
    }

    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        SubmissionOutcome::Rejected {
            reason: reason.into(),
        }
    }
}
