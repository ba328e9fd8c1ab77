//! Shared utilities for integration testing.
//!
//! `MockChain` is a scripted in-memory chain: headers are streamed from a
//! fixed list, block contents are looked up by hash, and every submission
//! replays the statuses carried by its transaction.

#![allow(dead_code)]

use alloy::primitives::{keccak256, B256};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tx_correlator::chain::{
    AccountSigner, BlockHash, ChainClient, ChainError, ChainEvent, ChainResult, DispatchError,
    ErrorMetadata, EventField, Extrinsic, Header, HeaderSubscription, Identity, ModuleError,
    Phase, StatusStream, TxHash, TxStatus,
};

pub const PALLET: &str = "identityManagement";

/// A signer identified by a 32-byte account id.
#[derive(Debug, Clone)]
pub struct MockSigner(pub Identity);

impl MockSigner {
    pub fn new(byte: u8) -> Self {
        Self(Identity::from([byte; 32]))
    }
}

impl AccountSigner for MockSigner {
    fn identity(&self) -> Identity {
        self.0.clone()
    }
}

/// A transaction whose pool journey is scripted up front.
#[derive(Debug, Clone, Default)]
pub struct MockTx {
    pub statuses: Vec<TxStatus>,
    pub fee_error: bool,
    /// Keep the status stream open after the scripted statuses.
    pub stalls: bool,
}

impl MockTx {
    /// Ready, then in block with no dispatch error.
    pub fn included(block_hash: BlockHash, tx_hash: TxHash) -> Self {
        Self::scripted(vec![
            TxStatus::Ready,
            TxStatus::InBlock {
                block_hash,
                tx_hash,
                dispatch_error: None,
            },
        ])
    }

    /// In block with a runtime failure.
    pub fn failing(block_hash: BlockHash, tx_hash: TxHash, error: DispatchError) -> Self {
        Self::scripted(vec![TxStatus::InBlock {
            block_hash,
            tx_hash,
            dispatch_error: Some(error),
        }])
    }

    /// Rejected by the pool.
    pub fn invalid(reason: &str) -> Self {
        Self::scripted(vec![TxStatus::Invalid(reason.into())])
    }

    pub fn scripted(statuses: Vec<TxStatus>) -> Self {
        Self {
            statuses,
            ..Self::default()
        }
    }
}

/// An event emitted during an extrinsic, naming the given identities.
pub fn event(method: &str, extrinsic: u32, who: &[&Identity]) -> ChainEvent {
    ChainEvent {
        section: PALLET.into(),
        method: method.into(),
        data: who.iter().map(|id| EventField::Value(id.0.clone())).collect(),
        phase: Phase::ApplyExtrinsic(extrinsic),
    }
}

/// Deterministic block hash for a height.
pub fn block_hash(height: u64) -> BlockHash {
    B256::left_padding_from(&height.to_be_bytes())
}

/// Deterministic extrinsic hash for a (height, index) pair.
pub fn extrinsic_hash(height: u64, index: u32) -> TxHash {
    keccak256(format!("{}:{}", height, index))
}

struct MockBlock {
    extrinsics: Vec<Extrinsic>,
    events: Vec<ChainEvent>,
}

pub struct MockChain {
    slot: Duration,
    headers: Vec<Header>,
    blocks: HashMap<BlockHash, MockBlock>,
    close_after_headers: bool,
    module_errors: HashMap<(u8, [u8; 4]), ErrorMetadata>,
    next_index: HashMap<Identity, u64>,
    subscriptions: AtomicUsize,
    unsubscribes: Arc<AtomicUsize>,
    sent: Mutex<Vec<(Identity, u64)>>,
}

impl MockChain {
    pub fn new(slot_ms: u64) -> Self {
        Self {
            slot: Duration::from_millis(slot_ms),
            headers: Vec::new(),
            blocks: HashMap::new(),
            close_after_headers: false,
            module_errors: HashMap::new(),
            next_index: HashMap::new(),
            subscriptions: AtomicUsize::new(0),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Append a block with 16 extrinsics and the given events.
    pub fn push_block(&mut self, height: u64, events: Vec<ChainEvent>) -> BlockHash {
        let hash = block_hash(height);
        let extrinsics = (0..16)
            .map(|index| Extrinsic {
                index,
                hash: extrinsic_hash(height, index),
            })
            .collect();
        self.headers.push(Header {
            height,
            hash,
            parent_hash: block_hash(height.saturating_sub(1)),
        });
        self.blocks.insert(hash, MockBlock { extrinsics, events });
        hash
    }

    /// Append `count` blocks with no events, starting at `from`.
    pub fn push_empty_blocks(&mut self, from: u64, count: u64) {
        for height in from..from + count {
            self.push_block(height, Vec::new());
        }
    }

    /// Re-send an already pushed header.
    pub fn repeat_header(&mut self, height: u64) {
        if let Some(header) = self.headers.iter().find(|h| h.height == height).cloned() {
            self.headers.push(header);
        }
    }

    /// End the header stream once scripted headers run out.
    pub fn close_after_headers(mut self) -> Self {
        self.close_after_headers = true;
        self
    }

    pub fn register_module_error(&mut self, index: u8, error: [u8; 4], meta: ErrorMetadata) {
        self.module_errors.insert((index, error), meta);
    }

    pub fn set_next_index(&mut self, who: Identity, nonce: u64) {
        self.next_index.insert(who, nonce);
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(Identity, u64)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    type Transaction = MockTx;
    type Signer = MockSigner;

    async fn subscribe_headers(&self) -> ChainResult<HeaderSubscription> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let scripted = stream::iter(self.headers.clone().into_iter().map(Ok::<Header, ChainError>));
        let headers = if self.close_after_headers {
            scripted.boxed()
        } else {
            scripted.chain(stream::pending()).boxed()
        };
        let unsubscribes = self.unsubscribes.clone();
        Ok(HeaderSubscription::new(headers, move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
        }))
    }

    async fn block_extrinsics(&self, hash: BlockHash) -> ChainResult<Vec<Extrinsic>> {
        self.blocks
            .get(&hash)
            .map(|b| b.extrinsics.clone())
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))
    }

    async fn events_at(&self, hash: BlockHash) -> ChainResult<Vec<ChainEvent>> {
        self.blocks
            .get(&hash)
            .map(|b| b.events.clone())
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))
    }

    async fn account_next_index(&self, who: &Identity) -> ChainResult<u64> {
        Ok(self.next_index.get(who).copied().unwrap_or(0))
    }

    async fn slot_duration(&self) -> ChainResult<Duration> {
        Ok(self.slot)
    }

    async fn estimate_fee(&self, _signer: &MockSigner, tx: &MockTx) -> ChainResult<u128> {
        if tx.fee_error {
            return Err(ChainError::Rpc("runtime api mismatch".into()));
        }
        Ok(1_000)
    }

    async fn sign_and_send(
        &self,
        signer: &MockSigner,
        tx: &MockTx,
        nonce: u64,
    ) -> ChainResult<StatusStream> {
        self.sent.lock().unwrap().push((signer.identity(), nonce));
        let statuses = stream::iter(tx.statuses.clone());
        if tx.stalls {
            Ok(statuses.chain(stream::pending()).boxed())
        } else {
            Ok(statuses.boxed())
        }
    }

    fn decode_module_error(&self, error: &ModuleError) -> Option<ErrorMetadata> {
        self.module_errors.get(&(error.index, error.error)).cloned()
    }
}
