//! EVM JSON-RPC chain client with timeout and failover handling.
//!
//! # Responsibilities
//! - Connect to a primary JSON-RPC endpoint plus failovers
//! - Poll for new headers and emit them in height order
//! - Expose contract logs as pallet events via the configured pallet mapping
//! - Sign and send transactions with caller-assigned nonces
//!
//! # Mapping
//! - section: configured pallet name of the emitting contract, else its address
//! - method: event name whose signature hashes to topic0, else topic0 in hex
//! - data: indexed topics followed by the 32-byte words of the log data
//! - phase: `ApplyExtrinsic(transaction_index)`

use alloy::eips::BlockNumberOrTag;
use alloy::hex;
use alloy::network::TransactionBuilder;
use alloy::primitives::{keccak256, Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Block, Filter, Log, TransactionRequest};
use alloy::transports::TransportResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use crate::chain::client::{receiver_stream, ChainClient, HeaderSubscription, StatusStream};
use crate::chain::types::{
    BlockHash, ChainConfig, ChainError, ChainEvent, ChainResult, DispatchError, EventField,
    Extrinsic, Header, Identity, Phase, TxStatus,
};
use crate::chain::wallet::Wallet;
use crate::config::PalletConfig;
use crate::resilience::retry_delay;

/// How long a sent transaction is watched for a receipt.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Resolves log emitters and topics to pallet and event names.
#[derive(Debug, Default)]
pub struct EventDirectory {
    sections: HashMap<Address, String>,
    methods: HashMap<B256, String>,
}

impl EventDirectory {
    /// Build the directory from pallet mappings.
    pub fn from_pallets(pallets: &[PalletConfig]) -> ChainResult<Self> {
        let mut directory = Self::default();
        for pallet in pallets {
            let address: Address = pallet.address.parse().map_err(|e| {
                ChainError::Config(format!("Invalid address for pallet '{}': {}", pallet.name, e))
            })?;
            directory.sections.insert(address, pallet.name.clone());

            for signature in &pallet.events {
                let name = signature.split('(').next().unwrap_or(signature);
                directory.methods.insert(keccak256(signature.as_bytes()), name.to_string());
            }
        }
        Ok(directory)
    }

    /// Convert an RPC log into a chain event.
    pub fn to_chain_event(&self, log: &Log) -> ChainEvent {
        let address = log.address();
        let section = self
            .sections
            .get(&address)
            .cloned()
            .unwrap_or_else(|| address.to_string());

        let topics = log.topics();
        let method = match topics.first() {
            Some(topic0) => self
                .methods
                .get(topic0)
                .cloned()
                .unwrap_or_else(|| hex::encode_prefixed(topic0)),
            None => "anonymous".to_string(),
        };

        let mut data: Vec<EventField> = topics
            .iter()
            .skip(1)
            .map(|topic| EventField::Value(Bytes::copy_from_slice(topic.as_slice())))
            .collect();
        data.extend(
            log.data()
                .data
                .chunks(32)
                .map(|word| EventField::Value(Bytes::copy_from_slice(word))),
        );

        let phase = match log.transaction_index {
            Some(index) => Phase::ApplyExtrinsic(index as u32),
            None => Phase::Finalization,
        };

        ChainEvent {
            section,
            method,
            data,
            phase,
        }
    }
}

/// JSON-RPC chain client with failover support.
#[derive(Clone)]
pub struct EvmChainClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Primary endpoint, used for signing providers.
    primary_url: url::Url,
    /// Configuration.
    config: ChainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
    /// Log to event resolution.
    directory: Arc<EventDirectory>,
}

impl EvmChainClient {
    /// Create a new chain client.
    ///
    /// A chain-id mismatch is logged but does not fail construction.
    pub async fn new(config: ChainConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url.clone()))
            as Arc<dyn Provider + Send + Sync>);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url))
                    as Arc<dyn Provider + Send + Sync>);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let directory = Arc::new(EventDirectory::from_pallets(&config.pallets)?);
        let client = Self {
            providers,
            primary_url,
            config: config.clone(),
            timeout_duration,
            directory,
        };

        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %config.rpc_url,
                chain_id = config.chain_id,
                "Chain client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Chain client initialized but chain verification failed"
            ),
        }

        Ok(client)
    }

    /// Run one RPC call against each provider in turn until one succeeds.
    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> ChainResult<T>
    where
        T: Send,
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut + Send + Sync,
        Fut: Future<Output = TransportResult<T>> + Send,
    {
        let mut timeouts = 0;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider")
                }
                Err(_) => {
                    timeouts += 1;
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider")
                }
            }
        }
        if timeouts == self.providers.len() {
            return Err(ChainError::Timeout(self.timeout_duration.as_secs()));
        }
        Err(ChainError::Rpc(format!("All RPC providers failed to {}", op)))
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let actual = self
            .call("get chain id", |p| async move { p.get_chain_id().await })
            .await?;
        if actual != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> ChainResult<u64> {
        self.call("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    async fn block_by_number(&self, number: u64) -> ChainResult<Block> {
        self.call("get block by number", move |p| async move {
            p.get_block_by_number(BlockNumberOrTag::Number(number)).await
        })
        .await?
        .ok_or_else(|| ChainError::BlockNotFound(format!("#{}", number)))
    }

    /// Get the header at a height.
    pub async fn header_at(&self, number: u64) -> ChainResult<Header> {
        let block = self.block_by_number(number).await?;
        Ok(Header {
            height: block.header.number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
        })
    }

    /// Emit every header from `next` up to the chain tip.
    ///
    /// Returns `false` once the subscriber has gone away.
    async fn emit_new_headers(
        &self,
        next: &mut Option<u64>,
        tx: &mpsc::Sender<ChainResult<Header>>,
    ) -> ChainResult<bool> {
        let latest = self.get_block_number().await?;
        let from = next.unwrap_or(latest);

        for height in from..=latest {
            let header = self.header_at(height).await?;
            if tx.send(Ok(header)).await.is_err() {
                return Ok(false);
            }
            *next = Some(height + 1);
        }
        Ok(true)
    }

    async fn poll_headers(self, start: u64, tx: mpsc::Sender<ChainResult<Header>>) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut next = Some(start);
        let mut failures = 0u32;

        loop {
            match self.emit_new_headers(&mut next, &tx).await {
                Ok(true) => failures = 0,
                Ok(false) => return,
                Err(e) => {
                    failures += 1;
                    tracing::warn!(attempt = failures, error = %e, "Header poll failed");
                    if failures > self.config.max_poll_retries {
                        let _ = tx
                            .send(Err(ChainError::Subscription(format!(
                                "giving up after {} failed polls: {}",
                                failures, e
                            ))))
                            .await;
                        return;
                    }
                }
            }

            let delay = if failures == 0 {
                interval
            } else {
                retry_delay(failures, interval, interval.saturating_mul(10))
            };
            sleep(delay).await;
        }
    }

    /// Get current gas price in wei.
    pub async fn get_gas_price(&self) -> ChainResult<u128> {
        self.call("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    type Transaction = TransactionRequest;
    type Signer = Wallet;

    async fn subscribe_headers(&self) -> ChainResult<HeaderSubscription> {
        // Anchor at the current head so nothing produced after this call is missed.
        let start = self.get_block_number().await?;
        let (tx, rx) = mpsc::channel(64);
        let poller = tokio::spawn(self.clone().poll_headers(start, tx));

        tracing::debug!(start, interval_ms = self.config.poll_interval_ms, "Header poller started");
        Ok(HeaderSubscription::new(receiver_stream(rx), move || poller.abort()))
    }

    async fn block_extrinsics(&self, hash: BlockHash) -> ChainResult<Vec<Extrinsic>> {
        let block = self
            .call("get block by hash", move |p| async move { p.get_block_by_hash(hash).await })
            .await?
            .ok_or_else(|| ChainError::BlockNotFound(hash.to_string()))?;

        Ok(block
            .transactions
            .hashes()
            .enumerate()
            .map(|(index, hash)| Extrinsic {
                index: index as u32,
                hash,
            })
            .collect())
    }

    async fn events_at(&self, hash: BlockHash) -> ChainResult<Vec<ChainEvent>> {
        let filter = Filter::new().at_block_hash(hash);
        let logs = self
            .call("get logs", move |p| {
                let filter = filter.clone();
                async move { p.get_logs(&filter).await }
            })
            .await?;

        Ok(logs.iter().map(|log| self.directory.to_chain_event(log)).collect())
    }

    async fn account_next_index(&self, who: &Identity) -> ChainResult<u64> {
        let address = identity_address(who)?;
        self.call("get transaction count", move |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn slot_duration(&self) -> ChainResult<Duration> {
        if let Some(ms) = self.config.slot_duration_ms {
            return Ok(Duration::from_millis(ms));
        }

        let latest = self.get_block_number().await?;
        if latest == 0 {
            return Err(ChainError::InvalidSlotDuration(
                "need at least two blocks to derive slot duration".into(),
            ));
        }
        let tip = self.block_by_number(latest).await?;
        let parent = self.block_by_number(latest - 1).await?;

        let secs = tip.header.timestamp.saturating_sub(parent.header.timestamp);
        if secs == 0 {
            return Err(ChainError::InvalidSlotDuration(format!(
                "blocks #{} and #{} share a timestamp",
                latest - 1,
                latest
            )));
        }
        Ok(Duration::from_secs(secs))
    }

    async fn estimate_fee(&self, signer: &Wallet, tx: &TransactionRequest) -> ChainResult<u128> {
        let gas_price = self.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;
        if gas_price_gwei > self.config.max_gas_price_gwei as u128 {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: self.config.max_gas_price_gwei,
            });
        }

        let request = tx.clone().with_from(signer.address());
        let gas = self
            .call("estimate gas", move |p| {
                let request = request.clone();
                async move { p.estimate_gas(request).await }
            })
            .await?;

        Ok(gas as u128 * gas_price)
    }

    async fn sign_and_send(
        &self,
        signer: &Wallet,
        tx: &TransactionRequest,
        nonce: u64,
    ) -> ChainResult<StatusStream> {
        let provider = ProviderBuilder::new()
            .wallet(signer.network_wallet())
            .connect_http(self.primary_url.clone());
        let request = tx
            .clone()
            .with_from(signer.address())
            .with_nonce(nonce)
            .with_chain_id(self.config.chain_id);

        let (status_tx, status_rx) = mpsc::channel(8);
        tokio::spawn(async move {
            let pending = match provider.send_transaction(request).await {
                Ok(pending) => pending,
                Err(e) => {
                    let _ = status_tx.send(TxStatus::Invalid(e.to_string())).await;
                    return;
                }
            };
            let tx_hash = *pending.tx_hash();
            let _ = status_tx.send(TxStatus::Broadcast).await;

            let status = match pending.with_timeout(Some(RECEIPT_TIMEOUT)).get_receipt().await {
                Ok(receipt) => TxStatus::InBlock {
                    block_hash: receipt.block_hash.unwrap_or_default(),
                    tx_hash,
                    dispatch_error: (!receipt.status())
                        .then(|| DispatchError::Other("execution reverted".to_string())),
                },
                Err(e) => TxStatus::Dropped(e.to_string()),
            };
            let _ = status_tx.send(status).await;
        });

        Ok(receiver_stream(status_rx))
    }
}

impl std::fmt::Debug for EvmChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

/// Account address behind an identity (raw 20 bytes or a padded word).
fn identity_address(who: &Identity) -> ChainResult<Address> {
    let bytes = who.as_bytes();
    match bytes.len() {
        20 => Ok(Address::from_slice(bytes)),
        32 => Ok(Address::from_word(B256::from_slice(bytes))),
        n => Err(ChainError::Wallet(format!(
            "identity of {} bytes is not an account address",
            n
        ))),
    }
}
