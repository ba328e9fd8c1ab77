//! Per-block event attribution.
//!
//! # Design Decisions
//! - Matching one block is a pure function of the block and the watch
//! - A violation anywhere in the block fails it before any match counts
//! - Strict attribution (payload names a signer) wins outright; only a block
//!   with no strict match falls back to every qualifying event

use serde::Serialize;
use std::collections::HashMap;

use crate::chain::types::{BlockHash, ChainEvent, TxHash};
use crate::matcher::filter::{EventWatch, UnexpectedEvent};
use crate::matcher::order::SignerOrder;
use crate::scanner::ScannedBlock;

/// How an event was tied to the session's signers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// The payload names one of the signers.
    Strict,
    /// The payload names none; accepted on pallet and method alone.
    Fallback,
}

impl MatchTier {
    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            MatchTier::Strict => "strict",
            MatchTier::Fallback => "fallback",
        }
    }
}

/// An event accepted as one of the session's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedEvent {
    /// The event itself.
    pub event: ChainEvent,
    /// Position of the attributed signer; `None` for fallback matches.
    ///
    /// Attribution reports a signer's first position. Accumulation moves it to
    /// the result slot the match claimed.
    pub signer_index: Option<usize>,
    /// Attribution tier.
    pub tier: MatchTier,
    /// Height of the containing block.
    pub block_height: u64,
    /// Hash of the containing block.
    pub block_hash: BlockHash,
    /// Extrinsic that emitted the event.
    pub extrinsic_index: u32,
    /// Hash of that extrinsic, when the block listed it.
    pub extrinsic_hash: Option<TxHash>,
    /// Another strict match in the same block names the same signer, and no
    /// recorded extrinsic hash tied this one to its submission.
    pub ambiguous: bool,
}

/// Everything one block contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMatches {
    /// Height of the block.
    pub block_height: u64,
    /// Tier shared by every match in this block.
    pub tier: Option<MatchTier>,
    /// Matches in canonical (extrinsic, emission) order.
    pub matches: Vec<MatchedEvent>,
}

impl BlockMatches {
    /// Number of matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether the block contributed nothing.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Number of matches flagged ambiguous.
    pub fn ambiguous_count(&self) -> usize {
        self.matches.iter().filter(|m| m.ambiguous).count()
    }
}

/// Applies a watch and a signer order to scanned blocks.
#[derive(Debug, Clone)]
pub struct EventMatcher {
    watch: EventWatch,
    order: SignerOrder,
}

impl EventMatcher {
    /// Create a matcher.
    pub fn new(watch: EventWatch, order: SignerOrder) -> Self {
        Self { watch, order }
    }

    /// The watched pallet and methods.
    pub fn watch(&self) -> &EventWatch {
        &self.watch
    }

    /// The signer ordering.
    pub fn order(&self) -> &SignerOrder {
        &self.order
    }

    /// Match one block.
    pub fn match_block(&self, block: &ScannedBlock) -> Result<BlockMatches, UnexpectedEvent> {
        let height = block.header.height;

        // Violations first: a block with one is never partially accepted.
        for event in &block.events {
            if self.watch.is_violation(event) {
                return Err(UnexpectedEvent {
                    section: event.section.clone(),
                    method: event.method.clone(),
                    block_height: height,
                    extrinsic_index: event.extrinsic_index().unwrap_or_default(),
                    expected: self.watch.to_string(),
                });
            }
        }

        let mut qualifying: Vec<(u32, &ChainEvent)> = block
            .events
            .iter()
            .filter(|event| self.watch.qualifies(event))
            .filter_map(|event| event.extrinsic_index().map(|index| (index, event)))
            .collect();
        // Stable: emission order is kept within one extrinsic.
        qualifying.sort_by_key(|(index, _)| *index);

        let strict: Vec<(u32, &ChainEvent, usize)> = qualifying
            .iter()
            .filter_map(|(index, event)| self.order.attribute(event).map(|pos| (*index, *event, pos)))
            .collect();

        let (tier, picked): (MatchTier, Vec<(u32, &ChainEvent, Option<usize>)>) = if !strict.is_empty() {
            (
                MatchTier::Strict,
                strict.into_iter().map(|(i, e, pos)| (i, e, Some(pos))).collect(),
            )
        } else if !qualifying.is_empty() {
            (
                MatchTier::Fallback,
                qualifying.into_iter().map(|(i, e)| (i, e, None)).collect(),
            )
        } else {
            return Ok(BlockMatches {
                block_height: height,
                tier: None,
                matches: Vec::new(),
            });
        };

        let mut per_signer: HashMap<usize, usize> = HashMap::new();
        for (_, _, pos) in &picked {
            if let Some(pos) = pos {
                *per_signer.entry(*pos).or_default() += 1;
            }
        }

        let matches = picked
            .into_iter()
            .map(|(extrinsic_index, event, signer_index)| MatchedEvent {
                event: event.clone(),
                signer_index,
                tier,
                block_height: height,
                block_hash: block.header.hash,
                extrinsic_index,
                extrinsic_hash: block.extrinsic_hash(extrinsic_index),
                ambiguous: signer_index.map_or(false, |pos| per_signer.get(&pos).copied().unwrap_or(0) > 1),
            })
            .collect();

        Ok(BlockMatches {
            block_height: height,
            tier: Some(tier),
            matches,
        })
    }
}
