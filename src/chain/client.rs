//! Chain client contract consumed by the correlator.
//!
//! # Responsibilities
//! - Deliver new block headers in ascending height order
//! - Fetch a block's extrinsics and its event snapshot
//! - Sign and send transactions with an explicit nonce, reporting pool status
//! - Report the slot duration used to size the listen budget

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::chain::types::{
    BlockHash, ChainEvent, ChainResult, ErrorMetadata, Extrinsic, Header, Identity, ModuleError,
    TxStatus,
};

/// Stream of pool statuses for one submitted transaction.
pub type StatusStream = BoxStream<'static, TxStatus>;

/// A credential able to sign transactions for one account.
pub trait AccountSigner: Send + Sync {
    /// Identity of the signing account as it appears in event payloads.
    fn identity(&self) -> Identity;
}

/// Contract for the chain the correlator observes and submits to.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Transaction payload type produced by the upstream builder.
    type Transaction: Send + Sync;
    /// Signing credential type.
    type Signer: AccountSigner;

    /// Subscribe to new block headers.
    async fn subscribe_headers(&self) -> ChainResult<HeaderSubscription>;

    /// Extrinsics of a block in canonical order.
    async fn block_extrinsics(&self, hash: BlockHash) -> ChainResult<Vec<Extrinsic>>;

    /// Event snapshot as of a block, in emission order.
    async fn events_at(&self, hash: BlockHash) -> ChainResult<Vec<ChainEvent>>;

    /// Next nonce the chain expects from an account.
    async fn account_next_index(&self, who: &Identity) -> ChainResult<u64>;

    /// Duration of one block production slot.
    async fn slot_duration(&self) -> ChainResult<Duration>;

    /// Estimate the fee for a transaction.
    async fn estimate_fee(&self, signer: &Self::Signer, tx: &Self::Transaction)
        -> ChainResult<u128>;

    /// Sign and send a transaction with the given nonce and watch its status.
    async fn sign_and_send(
        &self,
        signer: &Self::Signer,
        tx: &Self::Transaction,
        nonce: u64,
    ) -> ChainResult<StatusStream>;

    /// Resolve a module error through the chain's metadata registry.
    fn decode_module_error(&self, _error: &ModuleError) -> Option<ErrorMetadata> {
        None
    }
}

/// A live header subscription.
///
/// The teardown hook runs exactly once: on [`HeaderSubscription::unsubscribe`]
/// or, failing that, on drop.
pub struct HeaderSubscription {
    headers: BoxStream<'static, ChainResult<Header>>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl HeaderSubscription {
    /// Wrap a header stream with a teardown hook.
    pub fn new<S, F>(headers: S, teardown: F) -> Self
    where
        S: Stream<Item = ChainResult<Header>> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            headers: headers.boxed(),
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Tear the subscription down.
    pub fn unsubscribe(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
            tracing::debug!("Header subscription closed");
        }
    }
}

impl Stream for HeaderSubscription {
    type Item = ChainResult<Header>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.headers.as_mut().poll_next(cx)
    }
}

impl Drop for HeaderSubscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl fmt::Debug for HeaderSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderSubscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

/// Adapt an mpsc receiver into a boxed stream.
pub fn receiver_stream<T: Send + 'static>(rx: mpsc::Receiver<T>) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}
