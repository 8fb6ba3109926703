//! Wallet provider boundary
//!
//! Abstracts the wallet the operator signs with: account access, the active
//! network, change notifications, and signer-backed contract connections.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::vault::contract::VaultContract;

/// Notification emitted by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// Authorized account list changed; empty means disconnected
    AccountsChanged(Vec<String>),
    /// Active network changed, chain id as a base-16 string
    ChainChanged(String),
}

/// A wallet the vault client can connect through
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Request account access. Fails with `ConnectionRejected` if declined.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Current network chain id
    async fn chain_id(&self) -> Result<u64>;

    /// Subscribe to account/network change notifications
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;

    /// Build a contract connection signing as `account`
    fn connect_contract(&self, contract: Address, account: Address) -> Result<Arc<dyn VaultContract>>;
}
