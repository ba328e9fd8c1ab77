//! Cross-block accumulation and final ordering.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::chain::types::{ChainEvent, Identity};
use crate::matcher::attribution::{BlockMatches, MatchTier, MatchedEvent};
use crate::matcher::order::SignerOrder;
use crate::observability::metrics;

/// Collects matches across blocks until the requested count is reached.
///
/// Each strict match takes one result slot of its signer, so a signer listed
/// several times collects one event per listing.
#[derive(Debug, Clone)]
pub struct MatchAccumulator {
    requested: usize,
    matches: Vec<MatchedEvent>,
    filled: BTreeSet<usize>,
}

impl MatchAccumulator {
    /// Accumulate up to `requested` matches.
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            matches: Vec::with_capacity(requested),
            filled: BTreeSet::new(),
        }
    }

    /// Add one block's matches, returning how many were accepted.
    ///
    /// Strict matches are placed into their signer's open slots in canonical
    /// order; a match whose signer has no open slot is dropped. Matches beyond
    /// the requested count are dropped too.
    pub fn absorb(&mut self, block: BlockMatches, order: &SignerOrder) -> usize {
        let Some(tier) = block.tier else {
            return 0;
        };

        let offered = block.matches.len();
        let mut accepted: Vec<MatchedEvent> = Vec::with_capacity(offered);
        let mut unslotted = 0usize;

        for mut matched in block.matches {
            if self.matches.len() + accepted.len() >= self.requested {
                break;
            }
            if let Some(first) = matched.signer_index {
                let Some(claim) = order.claim(first, matched.extrinsic_hash, &self.filled) else {
                    unslotted += 1;
                    continue;
                };
                self.filled.insert(claim.position);
                matched.signer_index = Some(claim.position);
                if claim.pinned {
                    matched.ambiguous = false;
                }
            }
            accepted.push(matched);
        }

        if unslotted > 0 {
            tracing::warn!(
                height = block.block_height,
                unslotted,
                "Events name a signer whose slots are all filled; dropping them"
            );
        }
        if offered > accepted.len() + unslotted {
            tracing::warn!(
                height = block.block_height,
                offered,
                accepted = accepted.len(),
                "More matching events than outstanding; keeping the earliest"
            );
        }

        let ambiguous = accepted.iter().filter(|m| m.ambiguous).count();

        if tier == MatchTier::Fallback && !accepted.is_empty() {
            tracing::warn!(
                height = block.block_height,
                count = accepted.len(),
                "No event names a signer; accepting by pallet and method only"
            );
        }
        if ambiguous > 0 {
            tracing::warn!(
                height = block.block_height,
                ambiguous,
                "Several events name the same signer in one block"
            );
            metrics::record_ambiguous(ambiguous);
        }
        metrics::record_matches(tier.label(), accepted.len());

        let count = accepted.len();
        self.matches.extend(accepted);
        count
    }

    /// Matches collected so far.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Whether the requested count has been reached.
    pub fn is_complete(&self) -> bool {
        self.matches.len() >= self.requested
    }

    /// Number of matches still outstanding.
    pub fn outstanding(&self) -> usize {
        self.requested.saturating_sub(self.matches.len())
    }

    /// Signer of every slot with no strict match yet, in caller order.
    ///
    /// A signer listed more than once appears once per open slot.
    pub fn missing_signers(&self, order: &SignerOrder) -> Vec<Identity> {
        order
            .signers()
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.filled.contains(index))
            .map(|(_, signer)| signer.clone())
            .collect()
    }

    /// Finish, ordering matches by signer slot.
    ///
    /// Fallback matches come last in discovery order.
    pub fn into_result(mut self) -> CorrelationResult {
        self.matches
            .sort_by_key(|m| m.signer_index.map_or((1, 0), |pos| (0, pos)));
        CorrelationResult {
            events: self.matches,
        }
    }
}

/// The ordered events a session resolved with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationResult {
    /// Matched events in signer order.
    pub events: Vec<MatchedEvent>,
}

impl CorrelationResult {
    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the session resolved with nothing.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over matched events.
    pub fn iter(&self) -> std::slice::Iter<'_, MatchedEvent> {
        self.events.iter()
    }

    /// The bare chain events in result order.
    pub fn chain_events(&self) -> Vec<&ChainEvent> {
        self.events.iter().map(|m| &m.event).collect()
    }

    /// Whether any event was accepted without naming a signer.
    pub fn has_fallback(&self) -> bool {
        self.events.iter().any(|m| m.tier == MatchTier::Fallback)
    }

    /// Whether any event shares its signer with another in the same block.
    pub fn has_ambiguous(&self) -> bool {
        self.events.iter().any(|m| m.ambiguous)
    }
}

impl IntoIterator for CorrelationResult {
    type Item = MatchedEvent;
    type IntoIter = std::vec::IntoIter<MatchedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
