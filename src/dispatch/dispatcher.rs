//! Submission dispatcher.
//!
//! # Responsibilities
//! - Estimate the fee of each unit as a client/runtime compatibility check
//! - Sign and send each unit with its explicit nonce
//! - Watch pool status until inclusion or rejection
//! - Report one outcome per unit, without letting one unit's failure touch another

use futures_util::future::join_all;
use futures_util::StreamExt;
use std::collections::HashSet;

use crate::chain::client::{AccountSigner, ChainClient};
use crate::chain::types::{ChainResult, DispatchError, TxStatus};
use crate::dispatch::outcome::{DispatchFailure, SubmissionOutcome, SubmissionUnit};
use crate::observability::metrics;
use crate::session::CancelToken;

/// Sends batches of independently signed transactions.
pub struct Dispatcher<'a, C: ChainClient> {
    client: &'a C,
    cancel: CancelToken,
}

impl<'a, C: ChainClient> Dispatcher<'a, C> {
    /// Create a dispatcher over a chain client.
    pub fn new(client: &'a C, cancel: CancelToken) -> Self {
        Self { client, cancel }
    }

    /// Send every unit concurrently and collect outcomes in unit order.
    ///
    /// Credentials are assigned round-robin via each unit's `signer_ref`. A unit
    /// repeating an earlier unit's (credential, nonce) pair is rejected unsent.
    pub async fn dispatch_all(
        &self,
        units: &[SubmissionUnit<C::Transaction>],
        signers: &[C::Signer],
    ) -> Vec<SubmissionOutcome> {
        let mut seen = HashSet::new();
        let submissions = units.iter().enumerate().map(|(index, unit)| {
            let slot = unit.signer_slot(signers.len());
            let duplicate = slot.map_or(false, |s| !seen.insert((s, unit.nonce)));
            async move {
                let outcome = match slot {
                    None => SubmissionOutcome::rejected("no signer credentials supplied"),
                    Some(_) if duplicate => SubmissionOutcome::rejected(format!(
                        "nonce {} already used by an earlier unit for the same signer",
                        unit.nonce
                    )),
                    Some(s) => self.submit(&signers[s], &unit.transaction, unit.nonce).await,
                };
                tracing::debug!(unit = index, nonce = unit.nonce, outcome = outcome.label(), "Unit settled");
                outcome
            }
        });

        // Build every future before polling any, so duplicate detection sees all units.
        let submissions: Vec<_> = submissions.collect();
        join_all(submissions).await
    }

    /// Send one transaction using the signer's next index from the chain.
    pub async fn send_until_in_block(
        &self,
        signer: &C::Signer,
        tx: &C::Transaction,
    ) -> ChainResult<SubmissionOutcome> {
        let nonce = self.client.account_next_index(&signer.identity()).await?;
        Ok(self.submit(signer, tx, nonce).await)
    }

    async fn submit(&self, signer: &C::Signer, tx: &C::Transaction, nonce: u64) -> SubmissionOutcome {
        let outcome = self.submit_inner(signer, tx, nonce).await;
        metrics::record_submission(outcome.label());
        outcome
    }

    async fn submit_inner(
        &self,
        signer: &C::Signer,
        tx: &C::Transaction,
        nonce: u64,
    ) -> SubmissionOutcome {
        if let Err(e) = self.client.estimate_fee(signer, tx).await {
            tracing::warn!(signer = %signer.identity(), nonce, error = %e, "Fee estimation failed");
            return SubmissionOutcome::rejected(format!("fee estimation failed: {}", e));
        }

        let mut statuses = match self.client.sign_and_send(signer, tx, nonce).await {
            Ok(statuses) => statuses,
            Err(e) => return SubmissionOutcome::rejected(format!("submission failed: {}", e)),
        };

        loop {
            let status = tokio::select! {
                _ = self.cancel.cancelled() => {
                    return SubmissionOutcome::rejected("cancelled while awaiting inclusion");
                }
                status = statuses.next() => status,
            };

            match status {
                Some(TxStatus::InBlock {
                    block_hash,
                    tx_hash,
                    dispatch_error,
                }) => {
                    return match dispatch_error {
                        None => {
                            tracing::info!(block = %block_hash, tx = %tx_hash, "Transaction included");
                            SubmissionOutcome::Included { block_hash, tx_hash }
                        }
                        Some(error) => {
                            let failure = self.decode(error);
                            tracing::warn!(block = %block_hash, tx = %tx_hash, %failure, "Transaction dispatch failed");
                            SubmissionOutcome::DispatchFailed {
                                block_hash,
                                tx_hash,
                                failure,
                            }
                        }
                    };
                }
                Some(TxStatus::Finalized { block_hash, tx_hash }) => {
                    return SubmissionOutcome::Included { block_hash, tx_hash };
                }
                Some(TxStatus::Invalid(reason)) => {
                    return SubmissionOutcome::rejected(format!("Transaction is Invalid: {}", reason));
                }
                Some(TxStatus::Dropped(reason)) => {
                    return SubmissionOutcome::rejected(format!("Transaction is Dropped: {}", reason));
                }
                Some(TxStatus::Usurped(by)) => {
                    return SubmissionOutcome::rejected(format!("Transaction is Usurped by {}", by));
                }
                Some(status) => tracing::trace!(?status, nonce, "Pool status"),
                None => return SubmissionOutcome::rejected("status stream ended before inclusion"),
            }
        }
    }

    fn decode(&self, error: DispatchError) -> DispatchFailure {
        match error {
            DispatchError::Module(module_error) => match self.client.decode_module_error(&module_error) {
                Some(meta) => DispatchFailure::Module {
                    module: meta.section,
                    name: meta.name,
                    docs: meta.docs,
                },
                None => DispatchFailure::Raw(DispatchError::Module(module_error).to_string()),
            },
            DispatchError::Other(reason) => DispatchFailure::Raw(reason),
        }
    }
}
