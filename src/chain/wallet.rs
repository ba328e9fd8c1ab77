//! Signing credentials for submitted transactions.
//!
//! # Security
//! - Private keys are loaded from hex strings or environment variables only
//! - Keys are never logged or serialized
//!
//! A wallet carries no nonce state: every submission brings its own nonce.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::chain::client::AccountSigner;
use crate::chain::types::{ChainError, ChainResult, Identity};

/// Environment variable prefix for indexed signer keys (`TX_CORRELATOR_SIGNER_0`, ...).
pub const SIGNER_KEY_ENV_PREFIX: &str = "TX_CORRELATOR_SIGNER_";

/// A local private-key signer.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> ChainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::debug!(address = %signer.address(), "Wallet loaded");
        Ok(Self { signer })
    }

    /// Load every consecutively indexed signer key from the environment.
    ///
    /// Reading stops at the first missing index; no keys at all is an error.
    pub fn all_from_env() -> ChainResult<Vec<Self>> {
        let mut wallets = Vec::new();
        while let Ok(key) = std::env::var(format!("{}{}", SIGNER_KEY_ENV_PREFIX, wallets.len())) {
            wallets.push(Self::from_private_key(&key)?);
        }

        if wallets.is_empty() {
            return Err(ChainError::Wallet(format!(
                "Environment variable {}0 not set",
                SIGNER_KEY_ENV_PREFIX
            )));
        }
        Ok(wallets)
    }

    /// The wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Network wallet used to fill signatures on outgoing transactions.
    pub fn network_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl AccountSigner for Wallet {
    fn identity(&self) -> Identity {
        Identity::from(self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY)).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_identity_is_padded_address() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let identity = wallet.identity();
        assert_eq!(&identity.as_bytes()[12..], wallet.address().as_slice());
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }
}
