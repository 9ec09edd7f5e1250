use anyhow::Result;
use tracing::info;

use crate::config::MAX_WALLETS;
use crate::error::BotError;

/// One configured trading identity. Keys live with the signer; only the address is held here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletCredential {
    pub index: usize,
    pub address: String,
}

impl WalletCredential {
    /// 1-based number used in logs, matching the `WALLET_ADDRESS_<n>` variable.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Immutable set of up to four wallets. The first one is canonical.
#[derive(Debug, Clone)]
pub struct WalletSet {
    wallets: Vec<WalletCredential>,
}

impl WalletSet {
    pub fn new(addresses: &[String]) -> Result<Self> {
        if addresses.is_empty() {
            return Err(BotError::ConfigError("No wallet addresses configured".to_string()).into());
        }
        if addresses.len() > MAX_WALLETS {
            return Err(BotError::ConfigError(format!(
                "At most {} wallets are supported, got {}",
                MAX_WALLETS,
                addresses.len()
            ))
            .into());
        }

        let wallets: Vec<WalletCredential> = addresses
            .iter()
            .enumerate()
            .map(|(index, address)| WalletCredential {
                index,
                address: address.clone(),
            })
            .collect();

        for wallet in &wallets {
            info!("Wallet {} loaded: {}", wallet.number(), wallet.address);
        }

        Ok(Self { wallets })
    }

    pub fn canonical(&self) -> &WalletCredential {
        // Non-empty by construction
        &self.wallets[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &WalletCredential> {
        self.wallets.iter()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
