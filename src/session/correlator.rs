//! Correlation sessions.
//!
//! # Responsibilities
//! - Size the block budget from the chain's slot duration
//! - Drive the scan/match loop over one header subscription
//! - Tear the subscription down exactly once, whatever the outcome
//!
//! # Data Flow
//! ```text
//! subscribe_headers ─→ header ─→ budget check ─→ BlockScanner ─→ EventMatcher
//!                        ↑                                           │
//!                        └──────── MatchAccumulator not complete ────┘
//! ```

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::client::{AccountSigner, ChainClient, HeaderSubscription};
use crate::chain::types::{Identity, TxHash};
use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, SubmissionOutcome, SubmissionUnit};
use crate::matcher::{
    CorrelationResult, EventMatcher, EventWatch, MatchAccumulator, SignerOrder,
};
use crate::observability::metrics;
use crate::scanner::BlockScanner;
use crate::session::cancel::CancelToken;
use crate::session::error::CorrelationError;
use crate::session::supervisor::{BudgetState, TimeoutBudget};

/// Per-correlator session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Wall-clock listen budget, converted to blocks per session.
    pub listen_timeout: Duration,
    /// Watched-pallet methods that neither match nor fail a session.
    pub informational_methods: Vec<String>,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            listen_timeout: Duration::from_millis(config.listen_timeout_ms),
            informational_methods: config.informational_methods.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// What a listen session waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationRequest {
    /// Watched pallet.
    pub section: String,
    /// Methods that count as a match.
    pub methods: Vec<String>,
    /// Signer identities in the order results should come back.
    pub signers: Vec<Identity>,
    /// Extrinsic each signer position was submitted as, when known.
    pub extrinsic_hashes: Vec<Option<TxHash>>,
    /// Number of events to collect.
    pub expected_count: usize,
}

impl CorrelationRequest {
    /// Expect one event per signer.
    pub fn new<I, S>(section: impl Into<String>, methods: I, signers: Vec<Identity>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            section: section.into(),
            methods: methods.into_iter().map(Into::into).collect(),
            expected_count: signers.len(),
            signers,
            extrinsic_hashes: Vec::new(),
        }
    }

    /// Tie signer positions to the extrinsics they were submitted as.
    pub fn with_extrinsic_hashes(mut self, hashes: Vec<Option<TxHash>>) -> Self {
        self.extrinsic_hashes = hashes;
        self
    }

    /// Override the number of events to collect.
    pub fn expecting(mut self, count: usize) -> Self {
        self.expected_count = count;
        self
    }
}

/// Outcome of a submit-then-listen batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One outcome per unit, in unit order.
    pub outcomes: Vec<SubmissionOutcome>,
    /// Events for the included units, in unit order.
    pub result: CorrelationResult,
}

/// Runs correlation sessions against one chain client.
///
/// Sessions share nothing but the client, so any number may run at once.
pub struct Correlator<C: ChainClient> {
    client: Arc<C>,
    settings: SessionSettings,
}

impl<C: ChainClient> Correlator<C> {
    /// Create a correlator.
    pub fn new(client: Arc<C>, settings: SessionSettings) -> Self {
        Self { client, settings }
    }

    /// The underlying chain client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// A dispatcher sharing this correlator's client.
    pub fn dispatcher(&self, cancel: CancelToken) -> Dispatcher<'_, C> {
        Dispatcher::new(self.client.as_ref(), cancel)
    }

    /// Wait for the requested events and return them in signer order.
    pub async fn listen(
        &self,
        request: CorrelationRequest,
        cancel: &CancelToken,
    ) -> Result<CorrelationResult, CorrelationError> {
        if request.expected_count == 0 {
            tracing::debug!(section = %request.section, "Nothing to listen for");
            return Ok(CorrelationResult::default());
        }

        let budget = self.budget().await?;
        let subscription = self.client.subscribe_headers().await?;
        self.run(subscription, request, budget, cancel).await
    }

    /// Send a batch and correlate the events of the units that made it in.
    ///
    /// The header subscription opens before anything is sent, so the
    /// inclusion blocks are always scanned. Cancelling during dispatch fails
    /// the batch with `Cancelled`, whatever the units' outcomes.
    pub async fn submit_and_correlate(
        &self,
        units: &[SubmissionUnit<C::Transaction>],
        signers: &[C::Signer],
        section: &str,
        methods: &[&str],
        cancel: &CancelToken,
    ) -> Result<BatchReport, CorrelationError> {
        if units.is_empty() {
            return Ok(BatchReport {
                outcomes: Vec::new(),
                result: CorrelationResult::default(),
            });
        }

        let started = Instant::now();
        let budget = self.budget().await?;
        let subscription = self.client.subscribe_headers().await?;

        let outcomes = self.dispatcher(cancel.clone()).dispatch_all(units, signers).await;

        if cancel.is_cancelled() {
            subscription.unsubscribe();
            let err = CorrelationError::Cancelled {
                found: 0,
                requested: units.len(),
            };
            tracing::warn!(error = %err, "Batch cancelled during dispatch");
            metrics::record_session(err.label(), started);
            return Err(err);
        }

        let mut expected = Vec::with_capacity(units.len());
        let mut hashes = Vec::with_capacity(units.len());
        for (index, (unit, outcome)) in units.iter().zip(&outcomes).enumerate() {
            match unit.signer_slot(signers.len()) {
                Some(slot) if outcome.is_included() => {
                    expected.push(signers[slot].identity());
                    hashes.push(outcome.tx_hash());
                }
                _ => tracing::info!(unit = index, outcome = outcome.label(), "Unit excluded from correlation"),
            }
        }

        let request = CorrelationRequest::new(section, methods.iter().copied(), expected)
            .with_extrinsic_hashes(hashes);
        if request.expected_count == 0 {
            subscription.unsubscribe();
            return Ok(BatchReport {
                outcomes,
                result: CorrelationResult::default(),
            });
        }

        let result = self.run(subscription, request, budget, cancel).await?;
        Ok(BatchReport { outcomes, result })
    }

    async fn budget(&self) -> Result<TimeoutBudget, CorrelationError> {
        let slot = self.client.slot_duration().await?;
        TimeoutBudget::new(self.settings.listen_timeout, slot)
    }

    async fn run(
        &self,
        mut subscription: HeaderSubscription,
        request: CorrelationRequest,
        budget: TimeoutBudget,
        cancel: &CancelToken,
    ) -> Result<CorrelationResult, CorrelationError> {
        let span = tracing::info_span!(
            "correlation_session",
            session_id = %Uuid::new_v4(),
            section = %request.section,
            expected = request.expected_count,
        );

        async move {
            let started = Instant::now();
            tracing::info!(
                timeout_blocks = budget.timeout_blocks(),
                methods = ?request.methods,
                "Listening for events"
            );

            let outcome = self.drive(&mut subscription, &request, budget, cancel).await;
            subscription.unsubscribe();

            match &outcome {
                Ok(result) => {
                    tracing::info!(
                        events = result.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Session resolved"
                    );
                    metrics::record_session("resolved", started);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Session rejected");
                    metrics::record_session(e.label(), started);
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        subscription: &mut HeaderSubscription,
        request: &CorrelationRequest,
        mut budget: TimeoutBudget,
        cancel: &CancelToken,
    ) -> Result<CorrelationResult, CorrelationError> {
        let watch = EventWatch::new(request.section.clone(), request.methods.iter().cloned())
            .with_informational(self.settings.informational_methods.iter().cloned());
        let order = SignerOrder::new(request.signers.clone())
            .with_extrinsic_hashes(request.extrinsic_hashes.clone());
        let matcher = EventMatcher::new(watch, order);
        let mut scanner = BlockScanner::new(self.client.as_ref());
        let mut accumulator = MatchAccumulator::new(request.expected_count);

        let cancelled = |accumulator: &MatchAccumulator| CorrelationError::Cancelled {
            found: accumulator.len(),
            requested: request.expected_count,
        };

        loop {
            let header = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&accumulator)),
                next = subscription.next() => match next {
                    Some(Ok(header)) => header,
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        return Err(CorrelationError::SubscriptionClosed {
                            outstanding: accumulator.outstanding(),
                        })
                    }
                },
            };

            if let BudgetState::Exhausted(waited) = budget.observe(header.height) {
                return Err(CorrelationError::CorrelationTimeout {
                    expected: matcher.watch().to_string(),
                    requested: request.expected_count,
                    found: accumulator.len(),
                    timeout_blocks: budget.timeout_blocks(),
                    waited_blocks: waited,
                    missing_signers: accumulator.missing_signers(matcher.order()),
                });
            }

            let scanned = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&accumulator)),
                scanned = scanner.scan(header) => scanned?,
            };
            let Some(block) = scanned else {
                continue;
            };

            let found = matcher.match_block(&block)?;
            if !found.is_empty() {
                tracing::debug!(
                    height = found.block_height,
                    matched = found.len(),
                    tier = ?found.tier,
                    "Block matched"
                );
            }
            accumulator.absorb(found, matcher.order());

            if accumulator.is_complete() {
                return Ok(accumulator.into_result());
            }
        }
    }
}
