//! Block scanning.
//!
//! # Responsibilities
//! - Turn each subscribed header into its extrinsic list and event snapshot
//! - Keep headers strictly height-ascending for the matcher
//!
//! # Design Decisions
//! - The two fetches for one block run concurrently; blocks never do
//! - A header at or below the last scanned height is skipped

use futures_util::future::try_join;

use crate::chain::client::ChainClient;
use crate::chain::types::{ChainEvent, ChainResult, Extrinsic, Header, TxHash};
use crate::observability::metrics;

/// One block's extrinsics and events, ready for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedBlock {
    /// Header the block was fetched for.
    pub header: Header,
    /// Extrinsics in canonical order.
    pub extrinsics: Vec<Extrinsic>,
    /// Event snapshot in emission order.
    pub events: Vec<ChainEvent>,
}

impl ScannedBlock {
    /// Hash of the extrinsic at an index.
    pub fn extrinsic_hash(&self, index: u32) -> Option<TxHash> {
        self.extrinsics
            .iter()
            .find(|ex| ex.index == index)
            .map(|ex| ex.hash)
    }
}

/// Fetches block contents for headers in arrival order.
pub struct BlockScanner<'a, C: ChainClient> {
    client: &'a C,
    last_height: Option<u64>,
}

impl<'a, C: ChainClient> BlockScanner<'a, C> {
    /// Create a scanner for one session.
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            last_height: None,
        }
    }

    /// Height of the last block scanned.
    pub fn last_height(&self) -> Option<u64> {
        self.last_height
    }

    /// Fetch a header's block contents.
    ///
    /// Returns `None` when the header does not advance past the last scanned height.
    pub async fn scan(&mut self, header: Header) -> ChainResult<Option<ScannedBlock>> {
        if let Some(last) = self.last_height {
            if header.height <= last {
                tracing::warn!(
                    height = header.height,
                    last_scanned = last,
                    "Skipping non-ascending header"
                );
                return Ok(None);
            }
        }

        let (extrinsics, events) = try_join(
            self.client.block_extrinsics(header.hash),
            self.client.events_at(header.hash),
        )
        .await?;

        tracing::debug!(
            height = header.height,
            hash = %header.hash,
            extrinsics = extrinsics.len(),
            events = events.len(),
            "Scanned block"
        );
        for (i, event) in events.iter().enumerate() {
            tracing::trace!(index = i, section = %event.section, method = %event.method, phase = ?event.phase, "Event");
        }

        self.last_height = Some(header.height);
        metrics::record_block_scanned();

        Ok(Some(ScannedBlock {
            header,
            extrinsics,
            events,
        }))
    }
}
